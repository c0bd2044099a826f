//! Keypoint detection.
//!
//! `LocalMaxima` is a plain detector that finds strict local intensity
//! maxima above a threshold. Two node types wrap it: one that only detects,
//! and one that also computes a small patch descriptor per keypoint so the
//! result can be fed to a matcher.

use crate::pipeline::error::PipelineResult;
use crate::pipeline::flow_data::{Array, FlowDataType, ImageBuffer, KeyPoint};
use crate::pipeline::id::{PropertyId, SocketId};
use crate::pipeline::node_type::{ExecutionStatus, NodeConfig, NodeType};
use crate::pipeline::property::{InclusiveRange, MinValue, PropertySet};
use crate::pipeline::registry::NodeTypeRegistry;
use crate::pipeline::socket::SocketConfig;
use crate::pipeline::socket_io::{SocketReader, SocketWriter};

pub const DETECTOR_TYPE_NAME: &str = "Features/Local maxima detector";
pub const DESCRIBER_TYPE_NAME: &str = "Features/Detect and describe";

static INPUTS: &[SocketConfig] =
    &[SocketConfig::input("source", FlowDataType::Image).with_human_name("Source")];
static DETECTOR_OUTPUTS: &[SocketConfig] =
    &[SocketConfig::output("keypoints", FlowDataType::Keypoints).with_human_name("Keypoints")];
static DESCRIBER_OUTPUTS: &[SocketConfig] = &[
    SocketConfig::output("keypoints", FlowDataType::Keypoints).with_human_name("Keypoints"),
    SocketConfig::output("descriptors", FlowDataType::Array)
        .with_human_name("Descriptors")
        .with_description("One row of 9 values per keypoint"),
];

pub const THRESHOLD: PropertyId = PropertyId(0);
pub const RADIUS: PropertyId = PropertyId(1);
pub const MAX_POINTS: PropertyId = PropertyId(2);

/// Length of one patch descriptor row.
pub const DESCRIPTOR_LEN: usize = 9;

// ── Detector ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalMaxima {
    /// Minimum intensity of a keypoint.
    pub threshold: u8,
    /// Half-size of the neighbourhood a maximum must dominate.
    pub radius: u32,
    /// Strongest points kept, 0 for all.
    pub max_points: usize,
}

impl Default for LocalMaxima {
    fn default() -> Self {
        Self {
            threshold: 64,
            radius: 2,
            max_points: 500,
        }
    }
}

impl LocalMaxima {
    /// Keypoints of `image` ordered by decreasing response.
    ///
    /// On a plateau only the first pixel in raster order is reported: a pixel
    /// must be strictly above neighbours that precede it and at least equal to
    /// those that follow.
    pub fn detect(&self, image: &ImageBuffer) -> Vec<KeyPoint> {
        let mono = image.to_mono();
        let (w, h) = (mono.width as i64, mono.height as i64);
        let r = self.radius as i64;
        let mut points = Vec::new();

        for y in 0..h {
            for x in 0..w {
                let v = mono.data[(y * w + x) as usize];
                if v < self.threshold {
                    continue;
                }
                let mut is_max = true;
                'window: for ny in (y - r).max(0)..=(y + r).min(h - 1) {
                    for nx in (x - r).max(0)..=(x + r).min(w - 1) {
                        if (nx, ny) == (x, y) {
                            continue;
                        }
                        let n = mono.data[(ny * w + nx) as usize];
                        let earlier = (ny, nx) < (y, x);
                        if n > v || (earlier && n == v) {
                            is_max = false;
                            break 'window;
                        }
                    }
                }
                if is_max {
                    points.push(KeyPoint {
                        x: x as f32,
                        y: y as f32,
                        size: (2 * r + 1) as f32,
                        angle: -1.0,
                        response: v as f32,
                        octave: 0,
                    });
                }
            }
        }

        points.sort_by(|a, b| b.response.total_cmp(&a.response));
        if self.max_points > 0 {
            points.truncate(self.max_points);
        }
        points
    }

    fn from_properties(props: &PropertySet) -> Self {
        let defaults = Self::default();
        Self {
            threshold: props
                .get_int(THRESHOLD)
                .map_or(defaults.threshold, |v| v as u8),
            radius: props.get_int(RADIUS).map_or(defaults.radius, |v| v as u32),
            max_points: props
                .get_int(MAX_POINTS)
                .map_or(defaults.max_points, |v| v as usize),
        }
    }
}

/// Mean-subtracted 3x3 intensity patch around `point`, edges clamped.
pub fn describe(image: &ImageBuffer, point: &KeyPoint) -> [f32; DESCRIPTOR_LEN] {
    let mut patch = [0f32; DESCRIPTOR_LEN];
    if image.is_empty() {
        return patch;
    }
    let (cx, cy) = (point.x.round() as i64, point.y.round() as i64);
    let (max_x, max_y) = (image.width as i64 - 1, image.height as i64 - 1);
    for (i, value) in patch.iter_mut().enumerate() {
        let dx = (i % 3) as i64 - 1;
        let dy = (i / 3) as i64 - 1;
        let x = (cx + dx).clamp(0, max_x) as u32;
        let y = (cy + dy).clamp(0, max_y) as u32;
        *value = image.get(x, y).unwrap_or(0) as f32;
    }
    let mean = patch.iter().sum::<f32>() / DESCRIPTOR_LEN as f32;
    patch.iter_mut().for_each(|v| *v -= mean);
    patch
}

fn detector_properties() -> PropertySet {
    let defaults = LocalMaxima::default();
    let mut props = PropertySet::new();
    props
        .add("Threshold", defaults.threshold as i32)
        .set_validator(InclusiveRange { min: 0, max: 255 });
    props
        .add("Radius", defaults.radius as i32)
        .set_validator(InclusiveRange { min: 1, max: 10 });
    props
        .add("Max points", defaults.max_points as i32)
        .set_validator(MinValue(0))
        .set_ui_hints("0 keeps every point");
    props
}

// ── Nodes ─────────────────────────────────────────────────────────────

pub struct LocalMaximaNode {
    props: PropertySet,
    detector: LocalMaxima,
}

impl LocalMaximaNode {
    pub fn new() -> Self {
        Self {
            props: detector_properties(),
            detector: LocalMaxima::default(),
        }
    }

    pub fn detector(&self) -> &LocalMaxima {
        &self.detector
    }

    fn detect(&self, reader: &SocketReader, writer: &mut SocketWriter) -> PipelineResult<usize> {
        let image = reader.read_image(SocketId(0))?;
        let out = writer.acquire_keypoints(SocketId(0))?;
        out.points = self.detector.detect(image);
        out.image = image.clone();
        Ok(out.points.len())
    }
}

impl Default for LocalMaximaNode {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeType for LocalMaximaNode {
    fn configuration(&self) -> NodeConfig {
        NodeConfig::new("Finds local intensity maxima")
            .with_inputs(INPUTS)
            .with_outputs(DETECTOR_OUTPUTS)
            .with_properties(&self.props)
    }

    fn execute(&mut self, reader: &SocketReader, writer: &mut SocketWriter) -> ExecutionStatus {
        match self.detect(reader, writer) {
            Ok(count) => ExecutionStatus::info(format!("Keypoints detected: {}", count)),
            Err(e) => e.into(),
        }
    }

    fn properties(&self) -> Option<&PropertySet> {
        Some(&self.props)
    }

    fn properties_mut(&mut self) -> Option<&mut PropertySet> {
        Some(&mut self.props)
    }

    fn on_property_changed(&mut self, _id: PropertyId) {
        self.detector = LocalMaxima::from_properties(&self.props);
    }
}

/// Detector plus patch descriptors, sharing the detector's properties.
pub struct DetectDescribeNode {
    inner: LocalMaximaNode,
}

impl DetectDescribeNode {
    pub fn new() -> Self {
        Self {
            inner: LocalMaximaNode::new(),
        }
    }

    fn run(&self, reader: &SocketReader, writer: &mut SocketWriter) -> PipelineResult<usize> {
        let image = reader.read_image(SocketId(0))?;
        let points = self.inner.detector.detect(image);

        let descriptors = writer.acquire_array(SocketId(1))?;
        *descriptors = Array::new(points.len(), DESCRIPTOR_LEN);
        for (i, point) in points.iter().enumerate() {
            if let Some(row) = descriptors.row_mut(i) {
                row.copy_from_slice(&describe(image, point));
            }
        }

        let out = writer.acquire_keypoints(SocketId(0))?;
        out.points = points;
        out.image = image.clone();
        Ok(out.points.len())
    }
}

impl Default for DetectDescribeNode {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeType for DetectDescribeNode {
    fn configuration(&self) -> NodeConfig {
        NodeConfig::new("Finds local intensity maxima and describes their neighbourhood")
            .with_inputs(INPUTS)
            .with_outputs(DESCRIBER_OUTPUTS)
            .with_properties(&self.inner.props)
    }

    fn execute(&mut self, reader: &SocketReader, writer: &mut SocketWriter) -> ExecutionStatus {
        match self.run(reader, writer) {
            Ok(count) => ExecutionStatus::info(format!("Keypoints described: {}", count)),
            Err(e) => e.into(),
        }
    }

    fn properties(&self) -> Option<&PropertySet> {
        self.inner.properties()
    }

    fn properties_mut(&mut self) -> Option<&mut PropertySet> {
        self.inner.properties_mut()
    }

    fn on_property_changed(&mut self, id: PropertyId) {
        self.inner.on_property_changed(id);
    }
}

pub fn register(registry: &mut NodeTypeRegistry) {
    registry.register_default::<LocalMaximaNode>(DETECTOR_TYPE_NAME);
    registry.register_default::<DetectDescribeNode>(DESCRIBER_TYPE_NAME);
}
