//! ImageStatisticsNode: terminal node reporting intensity statistics.

use crate::pipeline::error::PipelineResult;
use crate::pipeline::flow_data::{FlowDataType, ImageBuffer};
use crate::pipeline::id::SocketId;
use crate::pipeline::node_type::{ExecutionStatus, NodeConfig, NodeType};
use crate::pipeline::registry::NodeTypeRegistry;
use crate::pipeline::socket::SocketConfig;
use crate::pipeline::socket_io::{SocketReader, SocketWriter};

pub const TYPE_NAME: &str = "Sink/Image statistics";

static INPUTS: &[SocketConfig] =
    &[SocketConfig::input("source", FlowDataType::Image).with_human_name("Source")];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageStatistics {
    pub mean: f64,
    pub min: u8,
    pub max: u8,
}

impl ImageStatistics {
    /// Statistics of the first channel, `None` for an empty image.
    pub fn of(image: &ImageBuffer) -> Option<Self> {
        if image.is_empty() {
            return None;
        }
        let step = image.channels.max(1) as usize;
        let (mut sum, mut min, mut max, mut count) = (0u64, u8::MAX, u8::MIN, 0u64);
        for &v in image.data.iter().step_by(step) {
            sum += v as u64;
            min = min.min(v);
            max = max.max(v);
            count += 1;
        }
        Some(Self {
            mean: sum as f64 / count.max(1) as f64,
            min,
            max,
        })
    }
}

#[derive(Default)]
pub struct ImageStatisticsNode {
    last: Option<ImageStatistics>,
}

impl ImageStatisticsNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<ImageStatistics> {
        self.last
    }

    fn measure(&mut self, reader: &SocketReader) -> PipelineResult<Option<ImageStatistics>> {
        let image = reader.read_image(SocketId(0))?;
        self.last = ImageStatistics::of(image);
        Ok(self.last)
    }
}

impl NodeType for ImageStatisticsNode {
    fn configuration(&self) -> NodeConfig {
        NodeConfig::new("Reports mean, minimum and maximum intensity").with_inputs(INPUTS)
    }

    fn execute(&mut self, reader: &SocketReader, _writer: &mut SocketWriter) -> ExecutionStatus {
        match self.measure(reader) {
            Ok(Some(stats)) => ExecutionStatus::info(format!(
                "mean {:.2}, min {}, max {}",
                stats.mean, stats.min, stats.max
            )),
            Ok(None) => ExecutionStatus::info("empty image"),
            Err(e) => e.into(),
        }
    }
}

pub fn register(registry: &mut NodeTypeRegistry) {
    registry.register_default::<ImageStatisticsNode>(TYPE_NAME);
}
