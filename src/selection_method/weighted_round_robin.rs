use std::sync::{Arc, Mutex};

use crate::common::types::{is_valid_weight, lock};

use super::*;

/// Weighted round robin.
///
/// The node under the cursor keeps being served while its remaining budget
/// exceeds the decrement. Once the budget is at or below the decrement the
/// node is served one last time, its budget is refilled for its next turn and
/// the cursor moves on. A node of weight `W` is therefore picked about
/// `ceil(W / d)` times per cycle. The comparison allows a few ulps of slack
/// relative to the weight, so fractions like `0.3 / 0.1` that are not exact
/// in `f32` still land on the whole count.
#[derive(Debug)]
pub struct WeightedRoundRobin {
    current: Mutex<usize>,
    decrement: f32,
}

impl WeightedRoundRobin {
    pub fn new(decrement: f32) -> Result<Self, WeightError> {
        if !is_valid_weight(decrement) {
            return Err(WeightError::InvalidDecrement(decrement));
        }

        Ok(Self {
            current: Mutex::new(0),
            decrement,
        })
    }

    pub fn cursor(&self) -> usize {
        *lock(&self.current)
    }

    pub fn decrement(&self) -> f32 {
        self.decrement
    }
}

impl Default for WeightedRoundRobin {
    fn default() -> Self {
        Self {
            current: Mutex::new(0),
            decrement: DEFAULT_DECREMENT,
        }
    }
}

impl SelectionAlgorithm for WeightedRoundRobin {
    fn select(&self, nodes: &[Arc<Node>]) -> Result<Arc<Node>, SelectError> {
        if nodes.is_empty() {
            return Err(SelectError::EmptyPool);
        }

        let mut current = lock(&self.current);
        if *current >= nodes.len() {
            *current = 0;
        }

        let node = nodes[*current].clone();
        {
            let mut budget = node.budget();
            let slack = f32::EPSILON * node.original_weight();
            if *budget <= self.decrement + slack {
                *budget = node.original_weight();
                *current = (*current + 1) % nodes.len();
            } else {
                *budget -= self.decrement;
            }
        }

        Ok(node)
    }

    /// Rewinds the cursor only. Budgets live on the nodes and are refilled as
    /// each node exhausts its turn.
    fn reset(&self) {
        *lock(&self.current) = 0;
    }
}
