use std::net::SocketAddr;
use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::error::WeightError;

/// One backend target together with the state the selection strategies read
/// and mutate.
///
/// Nodes are shared between the pool, the selector and in-flight connections,
/// so every mutable field synchronizes itself.
#[derive(Debug)]
pub struct Node {
    pub name: String,
    pub addr: SocketAddr,
    original_weight: f32,
    /// Remaining weighted round robin budget for the current cycle.
    current_weight: Mutex<f32>,
    current_connections: AtomicUsize,
}

impl Node {
    pub fn new(name: String, addr: SocketAddr, weight: f32) -> Result<Node, WeightError> {
        if !is_valid_weight(weight) {
            return Err(WeightError::InvalidWeight(weight));
        }

        Ok(Node {
            name,
            addr,
            original_weight: weight,
            current_weight: Mutex::new(weight),
            current_connections: AtomicUsize::new(0),
        })
    }

    pub fn original_weight(&self) -> f32 {
        self.original_weight
    }

    pub fn current_weight(&self) -> f32 {
        *lock(&self.current_weight)
    }

    /// Refill the weight budget to the configured weight.
    pub fn reset_weight(&self) {
        *lock(&self.current_weight) = self.original_weight;
    }

    pub(crate) fn budget(&self) -> MutexGuard<'_, f32> {
        lock(&self.current_weight)
    }

    pub fn connections(&self) -> usize {
        self.current_connections.load(Ordering::Relaxed)
    }

    /// Connections per unit of weight. Lower means more spare capacity.
    pub fn combined_weight(&self) -> f32 {
        self.connections() as f32 / self.original_weight
    }

    pub fn inc_connections(&self) {
        self.current_connections.fetch_add(1, Ordering::Relaxed);
    }

    /// Saturates at zero so an unbalanced release cannot wrap the counter.
    pub fn dec_connections(&self) {
        let _ = self
            .current_connections
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |count| {
                count.checked_sub(1)
            });
    }

    /// Count a connection against this node until the guard is dropped.
    pub fn acquire(self: &Arc<Self>) -> ConnectionGuard {
        self.inc_connections();
        ConnectionGuard { node: self.clone() }
    }
}

/// Holds one connection slot on a node; releases it on drop.
#[derive(Debug)]
pub struct ConnectionGuard {
    node: Arc<Node>,
}

impl ConnectionGuard {
    pub fn node(&self) -> &Arc<Node> {
        &self.node
    }
}

impl Deref for ConnectionGuard {
    type Target = Node;

    fn deref(&self) -> &Self::Target {
        &self.node
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.node.dec_connections();
    }
}

/// Weights and decrements must be positive and finite.
pub(crate) fn is_valid_weight(weight: f32) -> bool {
    weight.is_finite() && weight > 0.0
}

/// Lock a mutex, recovering the data if a previous holder panicked. Every
/// critical section in this crate leaves its data valid.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
