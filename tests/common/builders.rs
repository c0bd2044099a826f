//! Test node types and graph builders
//!
//! `Recorder` nodes log the order in which they execute and pass a counter
//! downstream: each output holds one plus the sum of its inputs, so a chain
//! of three nodes ends with 3.

use flowgraph::pipeline::{
    Array, ExecutionStatus, FlowDataType, Graph, NodeConfig, NodeId, NodeType, NodeTypeId,
    NodeTypeRegistry, SocketAddress, SocketConfig, SocketId, SocketReader, SocketWriter,
};
use std::sync::{Arc, Mutex};

pub const SOURCE: &str = "Test/Source";
pub const FILTER: &str = "Test/Filter";
pub const MERGE: &str = "Test/Merge";
pub const SINK: &str = "Test/Sink";

static INPUTS: [SocketConfig; 2] = [
    SocketConfig::input("a", FlowDataType::Array),
    SocketConfig::input("b", FlowDataType::Array),
];
static OUTPUTS: [SocketConfig; 1] = [SocketConfig::output("out", FlowDataType::Array)];

/// Shared record of executed node ids, in execution order.
#[derive(Clone, Default)]
pub struct ExecLog(Arc<Mutex<Vec<NodeId>>>);

impl ExecLog {
    pub fn take(&self) -> Vec<NodeId> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }

    fn push(&self, id: NodeId) {
        self.0.lock().unwrap().push(id);
    }
}

pub struct Recorder {
    inputs: usize,
    outputs: usize,
    log: ExecLog,
}

impl NodeType for Recorder {
    fn configuration(&self) -> NodeConfig {
        NodeConfig::new("Records its execution")
            .with_inputs(&INPUTS[..self.inputs])
            .with_outputs(&OUTPUTS[..self.outputs])
    }

    fn execute(&mut self, reader: &SocketReader, writer: &mut SocketWriter) -> ExecutionStatus {
        self.log.push(reader.node());
        let mut total = 1.0;
        for socket in 0..self.inputs {
            match reader.read_array(SocketId(socket as u8)) {
                Ok(arr) => total += arr.data.first().copied().unwrap_or(0.0),
                Err(e) => return e.into(),
            }
        }
        if self.outputs > 0 {
            match writer.acquire_array(SocketId(0)) {
                Ok(out) => {
                    *out = Array {
                        rows: 1,
                        cols: 1,
                        data: vec![total],
                    }
                }
                Err(e) => return e.into(),
            }
        }
        ExecutionStatus::ok()
    }
}

/// Registry with the four `Recorder` shapes, all logging into `log`.
pub fn recording_registry(log: &ExecLog) -> NodeTypeRegistry {
    let mut registry = NodeTypeRegistry::empty();
    for (name, inputs, outputs) in [(SOURCE, 0, 1), (FILTER, 1, 1), (MERGE, 2, 1), (SINK, 1, 0)] {
        let log = log.clone();
        registry.register(name, move || -> Option<Box<dyn NodeType>> {
            Some(Box::new(Recorder {
                inputs,
                outputs,
                log: log.clone(),
            }))
        });
    }
    registry
}

/// Builder for graphs of `Recorder` nodes
pub struct GraphBuilder {
    graph: Graph,
    log: ExecLog,
}

impl GraphBuilder {
    pub fn new() -> Self {
        let log = ExecLog::default();
        let graph = Graph::new(Arc::new(recording_registry(&log)));
        Self { graph, log }
    }

    pub fn type_id(&self, type_name: &str) -> NodeTypeId {
        self.graph.registry().type_id(type_name)
    }

    pub fn node(&mut self, type_name: &str, name: &str) -> NodeId {
        self.graph
            .create_node_by_type_name(type_name, name)
            .unwrap()
    }

    pub fn link(&mut self, from: NodeId, to: NodeId, input: u8) -> &mut Self {
        self.graph
            .link_nodes(SocketAddress::output(from, 0), SocketAddress::input(to, input))
            .unwrap();
        self
    }

    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    pub fn build(self) -> (Graph, ExecLog) {
        (self.graph, self.log)
    }
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Value of the single output of a `Recorder` node.
pub fn counter(graph: &Graph, id: NodeId) -> f32 {
    graph
        .output_socket(id, SocketId(0))
        .unwrap()
        .as_array()
        .unwrap()
        .data[0]
}
