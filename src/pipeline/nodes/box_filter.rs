//! BoxFilterNode: mean filter over a square window.
//!
//! Uses a summed-area table so the cost does not depend on the radius.
//! Borders are handled by shrinking the window to the image.

use crate::pipeline::error::PipelineResult;
use crate::pipeline::flow_data::{FlowDataType, ImageBuffer};
use crate::pipeline::id::{PropertyId, SocketId};
use crate::pipeline::node_type::{ExecutionStatus, NodeConfig, NodeType};
use crate::pipeline::property::{InclusiveRange, PropertySet};
use crate::pipeline::registry::NodeTypeRegistry;
use crate::pipeline::socket::SocketConfig;
use crate::pipeline::socket_io::{SocketReader, SocketWriter};

pub const TYPE_NAME: &str = "Filters/Box filter";

static INPUTS: &[SocketConfig] =
    &[SocketConfig::input("source", FlowDataType::ImageMono).with_human_name("Source")];
static OUTPUTS: &[SocketConfig] =
    &[SocketConfig::output("output", FlowDataType::ImageMono).with_human_name("Output")];

pub const RADIUS: PropertyId = PropertyId(0);

pub struct BoxFilterNode {
    props: PropertySet,
}

impl BoxFilterNode {
    pub fn new() -> Self {
        let mut props = PropertySet::new();
        props
            .add("Radius", 1)
            .set_validator(InclusiveRange { min: 0, max: 15 })
            .set_ui_hints("min:0, max:15");
        Self { props }
    }

    fn filter(&self, reader: &SocketReader, writer: &mut SocketWriter) -> PipelineResult<()> {
        let src = reader.read_image_mono(SocketId(0))?;
        let radius = self.props.get_int(RADIUS).unwrap_or(0) as u32;
        *writer.acquire_image_mono(SocketId(0))? = box_filter(src, radius);
        Ok(())
    }
}

impl Default for BoxFilterNode {
    fn default() -> Self {
        Self::new()
    }
}

/// Mean of the `(2r+1)^2` window around each pixel, clipped to the image.
pub fn box_filter(src: &ImageBuffer, radius: u32) -> ImageBuffer {
    if radius == 0 || src.is_empty() {
        return src.clone();
    }
    let (w, h) = (src.width as usize, src.height as usize);

    // integral[(y+1)*(w+1) + (x+1)] = sum of src[0..=y][0..=x]
    let stride = w + 1;
    let mut integral = vec![0u64; stride * (h + 1)];
    for y in 0..h {
        let mut row_sum = 0u64;
        for x in 0..w {
            row_sum += src.data[y * w + x] as u64;
            integral[(y + 1) * stride + x + 1] = integral[y * stride + x + 1] + row_sum;
        }
    }

    let r = radius as usize;
    let mut out = ImageBuffer::new(src.width, src.height, 1);
    for y in 0..h {
        let (y0, y1) = (y.saturating_sub(r), (y + r + 1).min(h));
        for x in 0..w {
            let (x0, x1) = (x.saturating_sub(r), (x + r + 1).min(w));
            let sum = integral[y1 * stride + x1] + integral[y0 * stride + x0]
                - integral[y0 * stride + x1]
                - integral[y1 * stride + x0];
            let area = ((y1 - y0) * (x1 - x0)) as u64;
            out.data[y * w + x] = ((sum + area / 2) / area) as u8;
        }
    }
    out
}

impl NodeType for BoxFilterNode {
    fn configuration(&self) -> NodeConfig {
        NodeConfig::new("Blurs an image with a box kernel")
            .with_inputs(INPUTS)
            .with_outputs(OUTPUTS)
            .with_properties(&self.props)
    }

    fn execute(&mut self, reader: &SocketReader, writer: &mut SocketWriter) -> ExecutionStatus {
        self.filter(reader, writer).into()
    }

    fn properties(&self) -> Option<&PropertySet> {
        Some(&self.props)
    }

    fn properties_mut(&mut self) -> Option<&mut PropertySet> {
        Some(&mut self.props)
    }
}

pub fn register(registry: &mut NodeTypeRegistry) {
    registry.register_default::<BoxFilterNode>(TYPE_NAME);
}
