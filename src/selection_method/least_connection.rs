use std::sync::Arc;

use super::*;

/// Picks the node with the fewest live connections. Ties go to the node that
/// comes first in the pool.
#[derive(Debug, Default, Clone, Copy)]
pub struct LeastConnection;

impl SelectionAlgorithm for LeastConnection {
    fn select(&self, nodes: &[Arc<Node>]) -> Result<Arc<Node>, SelectError> {
        nodes
            .iter()
            .min_by_key(|node| node.connections())
            .cloned()
            .ok_or(SelectError::EmptyPool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection_method::test_pool;

    fn with_connections(counts: &[usize]) -> Vec<Arc<Node>> {
        let nodes = test_pool(&vec![1.0; counts.len()]);
        for (node, &count) in nodes.iter().zip(counts) {
            for _ in 0..count {
                node.inc_connections();
            }
        }
        nodes
    }

    #[test]
    fn picks_fewest_connections() {
        let nodes = with_connections(&[5, 2, 8]);
        assert!(Arc::ptr_eq(&LeastConnection.select(&nodes).unwrap(), &nodes[1]));
    }

    #[test]
    fn tie_goes_to_earliest() {
        let nodes = with_connections(&[2, 2, 5]);
        assert!(Arc::ptr_eq(&LeastConnection.select(&nodes).unwrap(), &nodes[0]));
    }

    #[test]
    fn follows_connection_changes() {
        let nodes = with_connections(&[1, 0]);
        assert!(Arc::ptr_eq(&LeastConnection.select(&nodes).unwrap(), &nodes[1]));

        nodes[1].inc_connections();
        nodes[1].inc_connections();
        assert!(Arc::ptr_eq(&LeastConnection.select(&nodes).unwrap(), &nodes[0]));
    }

    #[test]
    fn does_not_touch_weight_budget() {
        let nodes = with_connections(&[0, 0]);
        LeastConnection.select(&nodes).unwrap();
        assert_eq!(nodes[0].current_weight(), 1.0);
        assert_eq!(nodes[0].connections(), 0);
    }
}
