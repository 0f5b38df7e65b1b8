use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::common::types::lock;

use super::*;

/// Uniform random pick. The generator is seeded once and shared by every call.
#[derive(Debug)]
pub struct Random {
    rng: Mutex<StdRng>,
}

impl Random {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic sequence, for reproducible runs.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Default for Random {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionAlgorithm for Random {
    fn select(&self, nodes: &[Arc<Node>]) -> Result<Arc<Node>, SelectError> {
        if nodes.is_empty() {
            return Err(SelectError::EmptyPool);
        }

        let index = lock(&self.rng).gen_range(0..nodes.len());
        Ok(nodes[index].clone())
    }
}
