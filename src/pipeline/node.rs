//! A live node in the graph.
//!
//! A `Node` exclusively owns its `NodeType` instance and the output storage
//! for every declared output socket. Other nodes never hold references to it;
//! the graph resolves producers by id just before each execution.

use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::flow_data::FlowData;
use crate::pipeline::id::{NodeId, NodeTypeId, PropertyId, SocketId};
use crate::pipeline::node_type::{ExecutionStatus, NodeConfig, NodeFlags, NodeType};
use crate::pipeline::property::PropertyValue;
use crate::pipeline::socket_io::{SocketReader, SocketWriter};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Instant;

pub struct Node {
    type_id: NodeTypeId,
    name: String,
    node_type: Box<dyn NodeType>,
    config: NodeConfig,
    outputs: Vec<FlowData>,
    /// Empty payload per input socket, read when the input is unconnected.
    empty_inputs: Vec<FlowData>,
    needs_restart: bool,
    last_status: Option<ExecutionStatus>,
}

impl Node {
    pub fn new(type_id: NodeTypeId, name: impl Into<String>, node_type: Box<dyn NodeType>) -> Self {
        let config = node_type.configuration();
        let outputs = config
            .outputs
            .iter()
            .map(|s| FlowData::empty_of(s.flow_type))
            .collect();
        let empty_inputs = config
            .inputs
            .iter()
            .map(|s| FlowData::empty_of(s.flow_type))
            .collect();
        Self {
            type_id,
            name: name.into(),
            node_type,
            config,
            outputs,
            empty_inputs,
            needs_restart: true,
            last_status: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = name;
    }

    pub fn type_id(&self) -> NodeTypeId {
        self.type_id
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn flags(&self) -> NodeFlags {
        self.config.flags
    }

    pub fn num_input_sockets(&self) -> usize {
        self.config.inputs.len()
    }

    pub fn num_output_sockets(&self) -> usize {
        self.config.outputs.len()
    }

    pub fn output_socket(&self, socket: SocketId) -> Option<&FlowData> {
        self.outputs.get(socket.index())
    }

    pub(crate) fn empty_input(&self, socket: SocketId) -> Option<&FlowData> {
        self.empty_inputs.get(socket.index())
    }

    pub fn needs_restart(&self) -> bool {
        self.needs_restart
    }

    pub(crate) fn request_restart(&mut self) {
        self.needs_restart = true;
    }

    pub fn last_status(&self) -> Option<&ExecutionStatus> {
        self.last_status.as_ref()
    }

    pub(crate) fn record_status(&mut self, status: ExecutionStatus) {
        self.last_status = Some(status);
    }

    pub fn property(&self, id: PropertyId) -> PipelineResult<PropertyValue> {
        self.node_type
            .property(id)
            .ok_or(PipelineError::PropertyNotFound(id))
    }

    pub fn set_property(&mut self, id: PropertyId, value: PropertyValue) -> PipelineResult<()> {
        self.node_type.set_property(id, value)
    }

    /// Run `restart` and clear the pending flag when it succeeds.
    pub fn restart(&mut self) -> bool {
        let ok = self.node_type.restart();
        if ok {
            self.needs_restart = false;
        }
        ok
    }

    /// Execute the node against resolved producer storage.
    ///
    /// A panicking body is turned into an `Error` status when `catch_panics`
    /// is set. Elapsed time is measured here unless the node reports its own.
    pub fn execute(
        &mut self,
        id: NodeId,
        inputs: Vec<Option<&FlowData>>,
        catch_panics: bool,
    ) -> ExecutionStatus {
        let reader = SocketReader::new(id, inputs, &self.empty_inputs);
        let mut writer = SocketWriter::new(id, &mut self.outputs, &self.config.outputs);
        let node_type = &mut self.node_type;

        let start = Instant::now();
        let status = if catch_panics {
            catch_unwind(AssertUnwindSafe(|| node_type.execute(&reader, &mut writer)))
                .unwrap_or_else(|payload| {
                    let msg = payload
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| payload.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "node panicked".to_string());
                    ExecutionStatus::error(msg)
                })
        } else {
            node_type.execute(&reader, &mut writer)
        };
        let elapsed = start.elapsed();

        if self.config.flags.overrides_timing && status.elapsed.is_some() {
            status
        } else {
            status.with_elapsed(elapsed)
        }
    }

    pub fn finish(&mut self) {
        self.node_type.finish();
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("type_id", &self.type_id)
            .field("name", &self.name)
            .field("inputs", &self.config.inputs.len())
            .field("outputs", &self.config.outputs.len())
            .field("needs_restart", &self.needs_restart)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::flow_data::{Array, FlowDataType};
    use crate::pipeline::node_type::Status;
    use crate::pipeline::socket::SocketConfig;
    use std::time::Duration;

    /// Copies its input array and appends one column of ones.
    struct Widen;

    impl NodeType for Widen {
        fn configuration(&self) -> NodeConfig {
            NodeConfig::new("widen")
                .with_inputs(&[SocketConfig::input("in", FlowDataType::Array)])
                .with_outputs(&[SocketConfig::output("out", FlowDataType::Array)])
        }

        fn execute(&mut self, reader: &SocketReader, writer: &mut SocketWriter) -> ExecutionStatus {
            let input = match reader.read_array(SocketId(0)) {
                Ok(a) => a,
                Err(e) => return e.into(),
            };
            let mut out = Array::new(input.rows, input.cols + 1);
            for r in 0..input.rows {
                let (src, dst) = (input.row(r), out.row_mut(r));
                if let (Some(src), Some(dst)) = (src, dst) {
                    dst[..src.len()].copy_from_slice(src);
                    dst[src.len()] = 1.0;
                }
            }
            match writer.write_socket(SocketId(0), FlowData::Array(out)) {
                Ok(()) => ExecutionStatus::ok(),
                Err(e) => e.into(),
            }
        }
    }

    struct Panics;

    impl NodeType for Panics {
        fn configuration(&self) -> NodeConfig {
            NodeConfig::new("panics")
        }

        fn execute(&mut self, _: &SocketReader, _: &mut SocketWriter) -> ExecutionStatus {
            panic!("boom");
        }
    }

    struct SelfTimed;

    impl NodeType for SelfTimed {
        fn configuration(&self) -> NodeConfig {
            NodeConfig::new("timed").with_flags(NodeFlags {
                overrides_timing: true,
                ..Default::default()
            })
        }

        fn execute(&mut self, _: &SocketReader, _: &mut SocketWriter) -> ExecutionStatus {
            ExecutionStatus::ok().with_elapsed(Duration::from_secs(42))
        }
    }

    #[test]
    fn test_outputs_sized_from_configuration() {
        let node = Node::new(NodeTypeId(1), "widen", Box::new(Widen));
        assert_eq!(node.num_input_sockets(), 1);
        assert_eq!(node.num_output_sockets(), 1);
        assert_eq!(
            node.output_socket(SocketId(0)).map(FlowData::flow_type),
            Some(FlowDataType::Array)
        );
        assert!(node.output_socket(SocketId(1)).is_none());
        assert!(node.needs_restart());
    }

    #[test]
    fn test_execute_reads_and_writes() {
        let mut node = Node::new(NodeTypeId(1), "widen", Box::new(Widen));
        let upstream = FlowData::Array(Array::new(2, 2));
        let status = node.execute(NodeId(0), vec![Some(&upstream)], true);
        assert_eq!(status.status, Status::Ok);
        assert!(status.elapsed.is_some());
        let out = node.output_socket(SocketId(0)).unwrap().as_array().unwrap();
        assert_eq!((out.rows, out.cols), (2, 3));
        assert_eq!(out.row(1), Some(&[0.0, 0.0, 1.0][..]));
    }

    #[test]
    fn test_panic_becomes_error_status() {
        let mut node = Node::new(NodeTypeId(2), "panics", Box::new(Panics));
        let status = node.execute(NodeId(0), Vec::new(), true);
        assert!(status.is_error());
        assert_eq!(status.message, "boom");
    }

    #[test]
    fn test_overrides_timing_keeps_reported_elapsed() {
        let mut node = Node::new(NodeTypeId(3), "timed", Box::new(SelfTimed));
        let status = node.execute(NodeId(0), Vec::new(), false);
        assert_eq!(status.elapsed, Some(Duration::from_secs(42)));
    }

    #[test]
    fn test_restart_clears_pending_flag() {
        let mut node = Node::new(NodeTypeId(1), "widen", Box::new(Widen));
        assert!(node.restart());
        assert!(!node.needs_restart());
        node.request_restart();
        assert!(node.needs_restart());
    }
}
