//! Execution-list construction.
//!
//! Starting from each tagged node in tag order, walk forward along the sorted
//! link list and append every reached consumer. A consumer that is already
//! listed is moved to the end, so it lands after every producer that reaches
//! it through a later path. On an acyclic graph the result is a topological
//! order over the tagged nodes and their descendants.
//!
//! The walk keeps the current path on a stack; reaching a node that is already
//! on the path means the graph has a cycle and the build fails.

use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::id::NodeId;
use crate::pipeline::link::Link;
use std::collections::HashSet;
use std::time::Instant;

/// Ordered list of nodes to execute in one pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionPlan {
    pub order: Vec<NodeId>,
    pub stats: PlanStats,
}

/// Statistics about the last list build.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlanStats {
    /// Tagged nodes that started a walk.
    pub roots: usize,
    /// Nodes in the final list.
    pub listed: usize,
    /// Times an already listed node was moved to the end.
    pub relocations: usize,
    /// Links followed during the walk.
    pub links_followed: usize,
    pub build_time_us: u64,
}

/// One level of the forward walk: the node and its remaining outgoing links.
struct Frame {
    node: NodeId,
    next: usize,
    end: usize,
}

impl Frame {
    /// All links leaving `node` form one contiguous run in the sorted list.
    fn new(node: NodeId, links: &[Link]) -> Self {
        let next = links.partition_point(|l| l.from_node < node);
        let end = next + links[next..].partition_point(|l| l.from_node == node);
        Self { node, next, end }
    }
}

impl ExecutionPlan {
    /// Build the list for `tagged`. `links` must be sorted.
    pub fn build(tagged: &[NodeId], links: &[Link]) -> PipelineResult<Self> {
        debug_assert!(links.windows(2).all(|w| w[0] <= w[1]));
        let start = Instant::now();

        let mut order: Vec<NodeId> = Vec::new();
        let mut stats = PlanStats::default();
        let mut stack: Vec<Frame> = Vec::new();
        let mut on_path: HashSet<NodeId> = HashSet::new();

        for &root in tagged {
            if order.contains(&root) {
                continue;
            }
            stats.roots += 1;
            order.push(root);
            on_path.insert(root);
            stack.push(Frame::new(root, links));

            while let Some(frame) = stack.last_mut() {
                if frame.next == frame.end {
                    on_path.remove(&frame.node);
                    stack.pop();
                    continue;
                }

                let to = links[frame.next].to_node;
                frame.next += 1;
                stats.links_followed += 1;

                if !on_path.insert(to) {
                    return Err(PipelineError::CycleDetected { node: to });
                }
                if let Some(pos) = order.iter().position(|&n| n == to) {
                    order.remove(pos);
                    stats.relocations += 1;
                }
                order.push(to);
                stack.push(Frame::new(to, links));
            }
        }

        stats.listed = order.len();
        stats.build_time_us = start.elapsed().as_micros() as u64;
        Ok(Self { order, stats })
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }
}
