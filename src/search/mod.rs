pub mod aggregator;
pub mod mock;
pub mod provider;
pub mod tavily;

pub use aggregator::*;
pub use mock::*;
pub use provider::*;
pub use tavily::*;
