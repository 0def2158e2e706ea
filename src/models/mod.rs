pub mod evaluation;
pub mod search;
pub mod state;

pub use evaluation::*;
pub use search::*;
pub use state::*;
