//! TestPatternNode: synthetic image source.
//!
//! Produces a moving gradient or checkerboard. Stateful and auto-tagged, so
//! every pass renders the next frame; `restart` rewinds to frame zero.

use crate::pipeline::error::PipelineResult;
use crate::pipeline::flow_data::{FlowDataType, ImageBuffer};
use crate::pipeline::id::{PropertyId, SocketId};
use crate::pipeline::node_type::{ExecutionStatus, NodeConfig, NodeFlags, NodeType};
use crate::pipeline::property::{EnumValue, InclusiveRange, PropertySet};
use crate::pipeline::registry::NodeTypeRegistry;
use crate::pipeline::socket::SocketConfig;
use crate::pipeline::socket_io::{SocketReader, SocketWriter};

pub const TYPE_NAME: &str = "Source/Test pattern";

static OUTPUTS: &[SocketConfig] =
    &[SocketConfig::output("output", FlowDataType::ImageMono).with_human_name("Output")];

pub const WIDTH: PropertyId = PropertyId(0);
pub const HEIGHT: PropertyId = PropertyId(1);
pub const PATTERN: PropertyId = PropertyId(2);

/// Values of the `PATTERN` enum property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern {
    Gradient = 0,
    Checkerboard = 1,
}

impl Pattern {
    fn from_enum(value: EnumValue) -> Self {
        match value.0 {
            1 => Pattern::Checkerboard,
            _ => Pattern::Gradient,
        }
    }
}

const CELL: u32 = 8;

pub struct TestPatternNode {
    props: PropertySet,
    frame: u32,
}

impl TestPatternNode {
    pub fn new() -> Self {
        let mut props = PropertySet::new();
        props
            .add("Width", 320)
            .set_validator(InclusiveRange { min: 1, max: 8192 });
        props
            .add("Height", 240)
            .set_validator(InclusiveRange { min: 1, max: 8192 });
        props
            .add("Pattern", EnumValue(Pattern::Gradient as i32))
            .set_enum_options(["Gradient", "Checkerboard"]);
        Self { props, frame: 0 }
    }

    pub fn frame(&self) -> u32 {
        self.frame
    }

    fn render(&self, img: &mut ImageBuffer) {
        let pattern = self
            .props
            .get_enum(PATTERN)
            .map(Pattern::from_enum)
            .unwrap_or(Pattern::Gradient);
        let shift = self.frame;
        for y in 0..img.height {
            for x in 0..img.width {
                let v = match pattern {
                    Pattern::Gradient => (((x + shift) % img.width) * 255 / img.width) as u8,
                    Pattern::Checkerboard => {
                        if ((x + shift) / CELL + y / CELL) % 2 == 0 {
                            255
                        } else {
                            0
                        }
                    }
                };
                img.set(x, y, v);
            }
        }
    }

    fn produce(&mut self, writer: &mut SocketWriter) -> PipelineResult<()> {
        let width = self.props.get_int(WIDTH).unwrap_or(1) as u32;
        let height = self.props.get_int(HEIGHT).unwrap_or(1) as u32;
        let mut img = ImageBuffer::new(width, height, 1);
        self.render(&mut img);
        *writer.acquire_image_mono(SocketId(0))? = img;
        self.frame = (self.frame + 1) % width;
        Ok(())
    }
}

impl Default for TestPatternNode {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeType for TestPatternNode {
    fn configuration(&self) -> NodeConfig {
        NodeConfig::new("Generates a moving gradient or checkerboard image")
            .with_outputs(OUTPUTS)
            .with_properties(&self.props)
            .with_flags(NodeFlags {
                has_state: true,
                auto_tag: true,
                ..Default::default()
            })
    }

    fn execute(&mut self, _reader: &SocketReader, writer: &mut SocketWriter) -> ExecutionStatus {
        self.produce(writer).into()
    }

    fn properties(&self) -> Option<&PropertySet> {
        Some(&self.props)
    }

    fn properties_mut(&mut self) -> Option<&mut PropertySet> {
        Some(&mut self.props)
    }

    fn restart(&mut self) -> bool {
        self.frame = 0;
        true
    }
}

pub fn register(registry: &mut NodeTypeRegistry) {
    registry.register_default::<TestPatternNode>(TYPE_NAME);
}
