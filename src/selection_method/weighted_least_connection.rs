use std::sync::Arc;

use super::*;

/// Picks the node with the lowest connections-per-weight score
/// ([`Node::combined_weight`]). Ties go to the node that comes first.
///
/// Each node's connection count is read once per call, so the pick is
/// consistent with the snapshot it scored.
#[derive(Debug, Default, Clone, Copy)]
pub struct WeightedLeastConnection;

impl SelectionAlgorithm for WeightedLeastConnection {
    fn select(&self, nodes: &[Arc<Node>]) -> Result<Arc<Node>, SelectError> {
        nodes
            .iter()
            .map(|node| (node, node.combined_weight()))
            .min_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(node, _)| node.clone())
            .ok_or(SelectError::EmptyPool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection_method::test_pool;

    fn connect(node: &Node, count: usize) {
        for _ in 0..count {
            node.inc_connections();
        }
    }

    #[test]
    fn scores_connections_against_weight() {
        let nodes = test_pool(&[2.0, 1.0]);
        connect(&nodes[0], 4);
        connect(&nodes[1], 3);

        assert_eq!(nodes[0].combined_weight(), 2.0);
        assert_eq!(nodes[1].combined_weight(), 3.0);
        assert!(Arc::ptr_eq(
            &WeightedLeastConnection.select(&nodes).unwrap(),
            &nodes[0]
        ));
    }

    #[test]
    fn heavier_node_absorbs_more_connections() {
        let nodes = test_pool(&[1.0, 4.0]);
        connect(&nodes[0], 1);
        connect(&nodes[1], 3);

        // 1.0 vs 0.75
        assert!(Arc::ptr_eq(
            &WeightedLeastConnection.select(&nodes).unwrap(),
            &nodes[1]
        ));
    }

    #[test]
    fn tie_goes_to_earliest() {
        let nodes = test_pool(&[1.0, 2.0, 1.0]);
        connect(&nodes[0], 1);
        connect(&nodes[1], 2);
        connect(&nodes[2], 4);

        assert!(Arc::ptr_eq(
            &WeightedLeastConnection.select(&nodes).unwrap(),
            &nodes[0]
        ));
    }
}
