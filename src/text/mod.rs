pub mod helpers;
pub mod normalize;

pub use helpers::*;
pub use normalize::*;
