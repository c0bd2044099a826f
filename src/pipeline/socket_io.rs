//! Socket access handed to a node while it executes.
//!
//! `SocketReader` is an immutable view onto the upstream producers' output
//! storage, resolved through the graph's links before the call. Unconnected
//! inputs read as an empty payload of their declared type. `SocketWriter`
//! borrows the executing node's own outputs and refuses payloads that do not
//! fit the declared flow type.

use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::flow_data::{
    Array, DeviceArray, DeviceImage, FlowData, FlowDataType, ImageBuffer, KeyPoints, Matches,
};
use crate::pipeline::id::{NodeId, SocketAddress, SocketId};
use crate::pipeline::socket::SocketConfig;

pub struct SocketReader<'a> {
    node: NodeId,
    /// Producer storage per input socket, `None` when unconnected.
    inputs: Vec<Option<&'a FlowData>>,
    /// Empty payloads for unconnected inputs.
    defaults: &'a [FlowData],
}

impl<'a> SocketReader<'a> {
    pub fn new(node: NodeId, inputs: Vec<Option<&'a FlowData>>, defaults: &'a [FlowData]) -> Self {
        Self {
            node,
            inputs,
            defaults,
        }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    pub fn read_socket(&self, id: SocketId) -> PipelineResult<&'a FlowData> {
        match self.inputs.get(id.index()) {
            Some(&Some(data)) => Ok(data),
            Some(&None) => self
                .defaults
                .get(id.index())
                .ok_or(PipelineError::SocketOutOfRange(SocketAddress::new(self.node, id, false))),
            None => Err(PipelineError::SocketOutOfRange(SocketAddress::new(
                self.node, id, false,
            ))),
        }
    }

    pub fn is_connected(&self, id: SocketId) -> bool {
        matches!(self.inputs.get(id.index()), Some(Some(_)))
    }

    pub fn all_inputs_connected(&self) -> bool {
        self.inputs.iter().all(Option::is_some)
    }

    /// Mono or color image.
    pub fn read_image(&self, id: SocketId) -> PipelineResult<&'a ImageBuffer> {
        self.read_socket(id)?.as_image()
    }

    pub fn read_image_mono(&self, id: SocketId) -> PipelineResult<&'a ImageBuffer> {
        self.read_socket(id)?.as_image_mono()
    }

    pub fn read_image_rgb(&self, id: SocketId) -> PipelineResult<&'a ImageBuffer> {
        self.read_socket(id)?.as_image_rgb()
    }

    pub fn read_array(&self, id: SocketId) -> PipelineResult<&'a Array> {
        self.read_socket(id)?.as_array()
    }

    pub fn read_keypoints(&self, id: SocketId) -> PipelineResult<&'a KeyPoints> {
        self.read_socket(id)?.as_keypoints()
    }

    pub fn read_matches(&self, id: SocketId) -> PipelineResult<&'a Matches> {
        self.read_socket(id)?.as_matches()
    }

    pub fn read_device_image(&self, id: SocketId) -> PipelineResult<&'a DeviceImage> {
        self.read_socket(id)?.as_device_image()
    }

    pub fn read_device_array(&self, id: SocketId) -> PipelineResult<&'a DeviceArray> {
        self.read_socket(id)?.as_device_array()
    }
}

pub struct SocketWriter<'a> {
    node: NodeId,
    outputs: &'a mut [FlowData],
    configs: &'a [SocketConfig],
}

impl<'a> SocketWriter<'a> {
    pub fn new(node: NodeId, outputs: &'a mut [FlowData], configs: &'a [SocketConfig]) -> Self {
        Self {
            node,
            outputs,
            configs,
        }
    }

    pub fn output_count(&self) -> usize {
        self.outputs.len()
    }

    fn declared(&self, id: SocketId) -> PipelineResult<FlowDataType> {
        self.configs
            .get(id.index())
            .map(|c| c.flow_type)
            .ok_or(PipelineError::SocketOutOfRange(SocketAddress::new(self.node, id, true)))
    }

    fn slot(&mut self, id: SocketId) -> PipelineResult<&mut FlowData> {
        let node = self.node;
        self.outputs
            .get_mut(id.index())
            .ok_or(PipelineError::SocketOutOfRange(SocketAddress::new(node, id, true)))
    }

    /// Replace the payload of an output socket.
    pub fn write_socket(&mut self, id: SocketId, data: FlowData) -> PipelineResult<()> {
        let declared = self.declared(id)?;
        if !declared.accepts(data.flow_type()) {
            return Err(PipelineError::FlowTypeMismatch {
                expected: declared,
                found: data.flow_type(),
            });
        }
        *self.slot(id)? = data;
        Ok(())
    }

    /// Switch the socket to `kind` if the declaration allows it.
    fn switch_to(&mut self, id: SocketId, kind: FlowDataType) -> PipelineResult<&mut FlowData> {
        let declared = self.declared(id)?;
        if !declared.accepts(kind) {
            return Err(PipelineError::FlowTypeMismatch {
                expected: declared,
                found: kind,
            });
        }
        let slot = self.slot(id)?;
        if slot.flow_type() != kind {
            *slot = FlowData::empty_of(kind);
        }
        Ok(slot)
    }

    pub fn acquire_image_mono(&mut self, id: SocketId) -> PipelineResult<&mut ImageBuffer> {
        self.switch_to(id, FlowDataType::ImageMono)?.as_image_mono_mut()
    }

    pub fn acquire_image_rgb(&mut self, id: SocketId) -> PipelineResult<&mut ImageBuffer> {
        self.switch_to(id, FlowDataType::ImageRgb)?.as_image_rgb_mut()
    }

    pub fn acquire_array(&mut self, id: SocketId) -> PipelineResult<&mut Array> {
        self.switch_to(id, FlowDataType::Array)?.as_array_mut()
    }

    pub fn acquire_keypoints(&mut self, id: SocketId) -> PipelineResult<&mut KeyPoints> {
        self.switch_to(id, FlowDataType::Keypoints)?.as_keypoints_mut()
    }

    pub fn acquire_matches(&mut self, id: SocketId) -> PipelineResult<&mut Matches> {
        self.switch_to(id, FlowDataType::Matches)?.as_matches_mut()
    }

    pub fn acquire_device_image(&mut self, id: SocketId) -> PipelineResult<&mut DeviceImage> {
        self.switch_to(id, FlowDataType::DeviceImage)?
            .as_device_image_mut()
    }

    pub fn acquire_device_array(&mut self, id: SocketId) -> PipelineResult<&mut DeviceArray> {
        self.switch_to(id, FlowDataType::DeviceArray)?
            .as_device_array_mut()
    }
}
