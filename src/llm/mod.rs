pub mod client;
pub mod mock;
pub mod prompts;

pub use client::*;
pub use mock::*;
pub use prompts::*;
