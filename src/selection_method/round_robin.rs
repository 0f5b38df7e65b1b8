use std::sync::{Arc, Mutex};

use crate::common::types::lock;

use super::*;

/// Uniform round robin: walks the pool in order, one node per call,
/// independent of weight and load.
#[derive(Debug, Default)]
pub struct RoundRobin {
    current: Mutex<usize>,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index the next call will serve, before re-validation.
    pub fn cursor(&self) -> usize {
        *lock(&self.current)
    }
}

impl SelectionAlgorithm for RoundRobin {
    fn select(&self, nodes: &[Arc<Node>]) -> Result<Arc<Node>, SelectError> {
        if nodes.is_empty() {
            return Err(SelectError::EmptyPool);
        }

        let mut current = lock(&self.current);
        // the pool may have shrunk since the last call
        if *current >= nodes.len() {
            *current = 0;
        }

        let node = nodes[*current].clone();
        *current = (*current + 1) % nodes.len();

        Ok(node)
    }

    fn reset(&self) {
        *lock(&self.current) = 0;
    }
}
