//! ThresholdNode: binary segmentation of a mono image.

use crate::pipeline::error::PipelineResult;
use crate::pipeline::flow_data::{FlowDataType, ImageBuffer};
use crate::pipeline::id::{PropertyId, SocketId};
use crate::pipeline::node_type::{ExecutionStatus, NodeConfig, NodeType};
use crate::pipeline::property::{InclusiveRange, PropertySet};
use crate::pipeline::registry::NodeTypeRegistry;
use crate::pipeline::socket::SocketConfig;
use crate::pipeline::socket_io::{SocketReader, SocketWriter};

pub const TYPE_NAME: &str = "Segmentation/Binary threshold";

static INPUTS: &[SocketConfig] =
    &[SocketConfig::input("source", FlowDataType::ImageMono).with_human_name("Source")];
static OUTPUTS: &[SocketConfig] = &[SocketConfig::output("output", FlowDataType::ImageMono)
    .with_human_name("Output")
    .with_description("255 where the source is above the threshold, 0 elsewhere")];

pub const THRESHOLD: PropertyId = PropertyId(0);
pub const INVERTED: PropertyId = PropertyId(1);

pub struct ThresholdNode {
    props: PropertySet,
}

impl ThresholdNode {
    pub fn new() -> Self {
        let mut props = PropertySet::new();
        props
            .add("Threshold", 128)
            .set_validator(InclusiveRange { min: 0, max: 255 })
            .set_ui_hints("min:0, max:255");
        props.add("Inverted", false);
        Self { props }
    }

    fn segment(&self, reader: &SocketReader, writer: &mut SocketWriter) -> PipelineResult<()> {
        let src = reader.read_image_mono(SocketId(0))?;
        let threshold = self.props.get_int(THRESHOLD).unwrap_or(128) as u8;
        let inverted = self.props.get_bool(INVERTED).unwrap_or(false);
        *writer.acquire_image_mono(SocketId(0))? = threshold_image(src, threshold, inverted);
        Ok(())
    }
}

impl Default for ThresholdNode {
    fn default() -> Self {
        Self::new()
    }
}

pub fn threshold_image(src: &ImageBuffer, threshold: u8, inverted: bool) -> ImageBuffer {
    let (high, low) = if inverted { (0, 255) } else { (255, 0) };
    let data = src
        .data
        .iter()
        .map(|&v| if v > threshold { high } else { low })
        .collect();
    ImageBuffer {
        width: src.width,
        height: src.height,
        channels: src.channels,
        data,
    }
}

impl NodeType for ThresholdNode {
    fn configuration(&self) -> NodeConfig {
        NodeConfig::new("Splits a mono image into foreground and background")
            .with_inputs(INPUTS)
            .with_outputs(OUTPUTS)
            .with_properties(&self.props)
    }

    fn execute(&mut self, reader: &SocketReader, writer: &mut SocketWriter) -> ExecutionStatus {
        self.segment(reader, writer).into()
    }

    fn properties(&self) -> Option<&PropertySet> {
        Some(&self.props)
    }

    fn properties_mut(&mut self) -> Option<&mut PropertySet> {
        Some(&mut self.props)
    }
}

pub fn register(registry: &mut NodeTypeRegistry) {
    registry.register_default::<ThresholdNode>(TYPE_NAME);
}
