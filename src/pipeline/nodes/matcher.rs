//! MatcherNode: brute-force nearest neighbour matching of descriptors.

use crate::pipeline::error::PipelineResult;
use crate::pipeline::flow_data::{Array, FlowDataType, KeyPoints, Matches};
use crate::pipeline::id::{PropertyId, SocketId};
use crate::pipeline::node_type::{ExecutionStatus, NodeConfig, NodeType};
use crate::pipeline::property::{InclusiveRange, MinValue, PropertySet};
use crate::pipeline::registry::NodeTypeRegistry;
use crate::pipeline::socket::SocketConfig;
use crate::pipeline::socket_io::{SocketReader, SocketWriter};

pub const TYPE_NAME: &str = "Features/Nearest neighbour matcher";

static INPUTS: &[SocketConfig] = &[
    SocketConfig::input("query_keypoints", FlowDataType::Keypoints).with_human_name("Query keypoints"),
    SocketConfig::input("query_descriptors", FlowDataType::Array).with_human_name("Query descriptors"),
    SocketConfig::input("train_keypoints", FlowDataType::Keypoints).with_human_name("Train keypoints"),
    SocketConfig::input("train_descriptors", FlowDataType::Array).with_human_name("Train descriptors"),
];
static OUTPUTS: &[SocketConfig] =
    &[SocketConfig::output("matches", FlowDataType::Matches).with_human_name("Matches")];

pub const MAX_DISTANCE: PropertyId = PropertyId(0);
pub const RATIO: PropertyId = PropertyId(1);

pub struct MatcherNode {
    props: PropertySet,
}

/// `(query_row, train_row)` pairs that pass the distance and ratio tests.
///
/// A ratio of 1.0 disables the ratio test.
pub fn match_descriptors(query: &Array, train: &Array, max_distance: f64, ratio: f64) -> Vec<(usize, usize)> {
    if query.cols != train.cols {
        return Vec::new();
    }
    let mut pairs = Vec::new();
    for q in 0..query.rows {
        let Some(q_row) = query.row(q) else { continue };
        let mut best: Option<(usize, f64)> = None;
        let mut second = f64::INFINITY;
        for t in 0..train.rows {
            let Some(t_row) = train.row(t) else { continue };
            let dist = q_row
                .iter()
                .zip(t_row)
                .map(|(a, b)| ((a - b) as f64).powi(2))
                .sum::<f64>()
                .sqrt();
            match best {
                Some((_, d)) if dist >= d => second = second.min(dist),
                Some((_, d)) => {
                    second = d;
                    best = Some((t, dist));
                }
                None => best = Some((t, dist)),
            }
        }
        if let Some((t, d)) = best {
            let distinct = ratio >= 1.0 || d < ratio * second;
            if d <= max_distance && distinct {
                pairs.push((q, t));
            }
        }
    }
    pairs
}

impl MatcherNode {
    pub fn new() -> Self {
        let mut props = PropertySet::new();
        props.add("Max distance", 200.0).set_validator(MinValue(0.0));
        props
            .add("Ratio", 0.8)
            .set_validator(InclusiveRange { min: 0.0, max: 1.0 })
            .set_ui_hints("1.0 disables the ratio test");
        Self { props }
    }

    fn run(&self, reader: &SocketReader, writer: &mut SocketWriter) -> PipelineResult<usize> {
        let query_kp = reader.read_keypoints(SocketId(0))?;
        let query_desc = reader.read_array(SocketId(1))?;
        let train_kp = reader.read_keypoints(SocketId(2))?;
        let train_desc = reader.read_array(SocketId(3))?;
        let max_distance = self.props.get_double(MAX_DISTANCE).unwrap_or(f64::INFINITY);
        let ratio = self.props.get_double(RATIO).unwrap_or(1.0);

        let out = writer.acquire_matches(SocketId(0))?;
        *out = build_matches(query_kp, train_kp, match_descriptors(query_desc, train_desc, max_distance, ratio));
        Ok(out.len())
    }
}

fn build_matches(query: &KeyPoints, train: &KeyPoints, pairs: Vec<(usize, usize)>) -> Matches {
    let mut matches = Matches {
        query_image: query.image.clone(),
        train_image: train.image.clone(),
        ..Default::default()
    };
    for (q, t) in pairs {
        if let (Some(qp), Some(tp)) = (query.points.get(q), train.points.get(t)) {
            matches.query_points.push((qp.x, qp.y));
            matches.train_points.push((tp.x, tp.y));
        }
    }
    matches
}

impl Default for MatcherNode {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeType for MatcherNode {
    fn configuration(&self) -> NodeConfig {
        NodeConfig::new("Pairs keypoints of two images by descriptor distance")
            .with_inputs(INPUTS)
            .with_outputs(OUTPUTS)
            .with_properties(&self.props)
    }

    fn execute(&mut self, reader: &SocketReader, writer: &mut SocketWriter) -> ExecutionStatus {
        match self.run(reader, writer) {
            Ok(count) => ExecutionStatus::info(format!("Matches found: {}", count)),
            Err(e) => e.into(),
        }
    }

    fn properties(&self) -> Option<&PropertySet> {
        Some(&self.props)
    }

    fn properties_mut(&mut self) -> Option<&mut PropertySet> {
        Some(&mut self.props)
    }
}

pub fn register(registry: &mut NodeTypeRegistry) {
    registry.register_default::<MatcherNode>(TYPE_NAME);
}
