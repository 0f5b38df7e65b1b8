use std::fmt;
use std::sync::Arc;

use serde::Deserialize;

use crate::common::{Node, SelectError, WeightError};

pub mod least_connection;
pub mod random;
pub mod round_robin;
pub mod weighted_least_connection;
pub mod weighted_round_robin;

pub use least_connection::LeastConnection;
pub use random::Random;
pub use round_robin::RoundRobin;
pub use weighted_least_connection::WeightedLeastConnection;
pub use weighted_round_robin::WeightedRoundRobin;

/// Budget charged per weighted round robin pick unless configured otherwise.
pub const DEFAULT_DECREMENT: f32 = 1.0;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadBalancingAlgorithm {
    #[default]
    #[serde(rename = "round-robin")]
    RoundRobin,
    #[serde(rename = "weighted-round-robin")]
    WeightedRoundRobin,
    #[serde(rename = "least-connection")]
    LeastConnection,
    #[serde(rename = "weighted-least-connection")]
    WeightedLeastConnection,
    #[serde(rename = "random")]
    Random,
}

pub trait SelectionAlgorithm: fmt::Debug + Send + Sync {
    /// Pick exactly one node from `nodes`, applying the strategy's state
    /// change in the same critical section as the pick.
    fn select(&self, nodes: &[Arc<Node>]) -> Result<Arc<Node>, SelectError>;

    /// Rewind rotation state. Called whenever pool membership changes.
    fn reset(&self) {}
}

/// Dispatches every selection to the algorithm chosen at construction.
#[derive(Debug)]
pub struct Selector {
    algorithm: LoadBalancingAlgorithm,
    decrement: f32,
    method: Box<dyn SelectionAlgorithm>,
}

impl Selector {
    pub fn new(algorithm: LoadBalancingAlgorithm) -> Self {
        Self {
            algorithm,
            decrement: DEFAULT_DECREMENT,
            method: build(algorithm, WeightedRoundRobin::default()),
        }
    }

    /// Like [`Selector::new`], with a custom budget charge for weighted round
    /// robin. Other algorithms ignore the decrement.
    pub fn with_decrement(
        algorithm: LoadBalancingAlgorithm,
        decrement: f32,
    ) -> Result<Self, WeightError> {
        let weighted = WeightedRoundRobin::new(decrement)?;
        Ok(Self {
            algorithm,
            decrement,
            method: build(algorithm, weighted),
        })
    }

    pub fn select(&self, nodes: &[Arc<Node>]) -> Result<Arc<Node>, SelectError> {
        self.method.select(nodes)
    }

    pub fn reset(&self) {
        self.method.reset()
    }

    pub fn algorithm(&self) -> LoadBalancingAlgorithm {
        self.algorithm
    }

    pub fn decrement(&self) -> f32 {
        self.decrement
    }
}

fn build(
    algorithm: LoadBalancingAlgorithm,
    weighted: WeightedRoundRobin,
) -> Box<dyn SelectionAlgorithm> {
    match algorithm {
        LoadBalancingAlgorithm::RoundRobin => Box::new(RoundRobin::new()),
        LoadBalancingAlgorithm::WeightedRoundRobin => Box::new(weighted),
        LoadBalancingAlgorithm::LeastConnection => Box::new(LeastConnection),
        LoadBalancingAlgorithm::WeightedLeastConnection => Box::new(WeightedLeastConnection),
        LoadBalancingAlgorithm::Random => Box::new(Random::new()),
    }
}

#[cfg(test)]
pub(crate) fn test_pool(weights: &[f32]) -> Vec<Arc<Node>> {
    weights
        .iter()
        .enumerate()
        .map(|(i, &weight)| {
            let addr = format!("127.0.0.1:{}", 8000 + i).parse().unwrap();
            Arc::new(Node::new(format!("node-{i}"), addr, weight).unwrap())
        })
        .collect()
}
