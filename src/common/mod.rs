pub mod error;
pub mod types;

pub use error::{SelectError, WeightError};
pub use types::{ConnectionGuard, Node};
