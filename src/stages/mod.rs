//! Pipeline stages.
//!
//! Each stage reads the current [`PipelineState`](crate::models::PipelineState),
//! makes at most one provider call and returns a
//! [`StateUpdate`](crate::models::StateUpdate) holding only the fields it
//! changed. Failures are reported as a tagged `error` string on the update,
//! never as an `Err`.

pub mod collect;
pub mod evaluate;
pub mod outline;
pub mod slides;
pub mod toc;

pub use collect::*;
pub use evaluate::*;
pub use outline::*;
pub use slides::*;
pub use toc::*;
