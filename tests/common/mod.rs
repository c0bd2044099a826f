//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;
pub mod mock_helpers;

use flowgraph::pipeline::{Graph, NodeId};
use std::time::Duration;

/// Create a test timeout duration
pub fn test_timeout() -> Duration {
    Duration::from_millis(1000)
}

/// Assert that every link in `graph` runs producer-before-consumer in `order`
/// whenever both endpoints are listed.
pub fn assert_topological(graph: &Graph, order: &[NodeId]) {
    let position = |id: NodeId| order.iter().position(|&n| n == id);
    for link in graph.links() {
        if let (Some(from), Some(to)) = (position(link.from_node), position(link.to_node)) {
            assert!(
                from < to,
                "{} must execute before {} in {:?}",
                link.from_node,
                link.to_node,
                order
            );
        }
    }
}
