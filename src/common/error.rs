use thiserror::Error;

/// Failure of a single selection call.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SelectError {
    #[error("no nodes to which to balance traffic")]
    EmptyPool,
}

#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum WeightError {
    #[error("node weight must be positive and finite, got {0}")]
    InvalidWeight(f32),
    #[error("weight decrement must be positive and finite, got {0}")]
    InvalidDecrement(f32),
}
