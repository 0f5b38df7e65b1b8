use std::sync::Arc;

use crate::common::{ConnectionGuard, Node, SelectError, WeightError};
use crate::configuration::{BackendSettings, Settings};
use crate::selection_method::Selector;

/// The eligible nodes of one listener and the selector that elects among
/// them.
#[derive(Debug)]
pub struct Pool {
    nodes: Vec<Arc<Node>>,
    selector: Selector,
}

impl Pool {
    pub fn new(settings: &Settings) -> Result<Self, WeightError> {
        let nodes = settings
            .backends
            .iter()
            .map(|backend| build_node(backend).map(Arc::new))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            nodes,
            selector: Selector::with_decrement(settings.algorithm, settings.weight_decrement)?,
        })
    }

    /// Elect a node and count the caller's connection against it until the
    /// returned guard is dropped.
    pub fn get_next(&self) -> Result<ConnectionGuard, SelectError> {
        let node = self.selector.select(&self.nodes)?;
        tracing::debug!(
            node = %node.name,
            addr = %node.addr,
            connections = node.connections(),
            "Selected backend"
        );
        Ok(node.acquire())
    }

    /// Apply new membership. Nodes with an unchanged name, address and weight
    /// are kept, so connections already counted against them stay counted.
    /// Each existing node is carried over at most once.
    pub fn update(&mut self, settings: &Settings) -> Result<(), WeightError> {
        let mut previous = self.nodes.clone();
        let nodes = settings
            .backends
            .iter()
            .map(|backend| {
                let found = previous.iter().position(|node| same_backend(node, backend));
                match found {
                    Some(index) => Ok(previous.swap_remove(index)),
                    None => build_node(backend).map(Arc::new),
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        if self.selector.algorithm() != settings.algorithm
            || self.selector.decrement() != settings.weight_decrement
        {
            self.selector = Selector::with_decrement(settings.algorithm, settings.weight_decrement)?;
        } else {
            self.selector.reset();
        }
        self.nodes = nodes;

        Ok(())
    }

    pub fn nodes(&self) -> &[Arc<Node>] {
        &self.nodes
    }

    pub fn selector(&self) -> &Selector {
        &self.selector
    }
}

fn same_backend(node: &Node, backend: &BackendSettings) -> bool {
    node.name == backend.name
        && node.addr == backend.addr
        && node.original_weight() == backend.weight
}

fn build_node(backend: &BackendSettings) -> Result<Node, WeightError> {
    Node::new(backend.name.clone(), backend.addr, backend.weight)
}
