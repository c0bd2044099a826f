//! Typed payloads carried by sockets.
//!
//! Each socket declares one `FlowDataType` in its node's configuration, and
//! its storage always holds the matching `FlowData` variant. Accessors are
//! explicit and fallible: asking for the wrong variant returns
//! `PipelineError::FlowTypeMismatch` instead of silently re-allocating.

use crate::pipeline::error::{PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};

/// The kind of data flowing through a socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlowDataType {
    Invalid,
    /// Either a mono or a color image.
    Image,
    ImageMono,
    ImageRgb,
    Array,
    Keypoints,
    Matches,
    DeviceImage,
    DeviceArray,
}

impl FlowDataType {
    /// Whether a socket declared as `self` can carry data of kind `found`.
    pub fn accepts(self, found: FlowDataType) -> bool {
        match self {
            FlowDataType::Invalid => false,
            FlowDataType::Image => {
                matches!(found, FlowDataType::ImageMono | FlowDataType::ImageRgb)
            }
            other => other == found,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            FlowDataType::Invalid => "Invalid",
            FlowDataType::Image => "Image",
            FlowDataType::ImageMono => "Mono image",
            FlowDataType::ImageRgb => "Color image",
            FlowDataType::Array => "Array",
            FlowDataType::Keypoints => "Keypoints",
            FlowDataType::Matches => "Matches",
            FlowDataType::DeviceImage => "Device image",
            FlowDataType::DeviceArray => "Device array",
        }
    }
}

impl std::fmt::Display for FlowDataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Interleaved 8-bit image. `channels` is 1 for mono and 3 for RGB.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageBuffer {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub data: Vec<u8>,
}

impl ImageBuffer {
    /// Zero-filled image.
    pub fn new(width: u32, height: u32, channels: u8) -> Self {
        let len = width as usize * height as usize * channels as usize;
        Self {
            width,
            height,
            channels,
            data: vec![0; len],
        }
    }

    pub fn from_vec(width: u32, height: u32, channels: u8, data: Vec<u8>) -> Option<Self> {
        if data.len() != width as usize * height as usize * channels as usize {
            return None;
        }
        Some(Self {
            width,
            height,
            channels,
            data,
        })
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    #[inline]
    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * self.channels as usize
    }

    /// First channel of the pixel at `(x, y)`.
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data.get(self.offset(x, y)).copied()
    }

    /// All channels of the pixel at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> Option<&[u8]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let start = self.offset(x, y);
        self.data.get(start..start + self.channels as usize)
    }

    pub fn set(&mut self, x: u32, y: u32, value: u8) {
        if x < self.width && y < self.height {
            let start = self.offset(x, y);
            for c in 0..self.channels as usize {
                self.data[start + c] = value;
            }
        }
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, value: &[u8]) {
        if x < self.width && y < self.height && value.len() == self.channels as usize {
            let start = self.offset(x, y);
            self.data[start..start + value.len()].copy_from_slice(value);
        }
    }

    /// Luma conversion for color images, plain copy for mono ones.
    pub fn to_mono(&self) -> ImageBuffer {
        if self.channels == 1 {
            return self.clone();
        }
        let mut out = ImageBuffer::new(self.width, self.height, 1);
        for (dst, px) in out.data.iter_mut().zip(self.data.chunks(self.channels as usize)) {
            let (r, g, b) = (px[0] as u32, px[1] as u32, px[2] as u32);
            *dst = ((299 * r + 587 * g + 114 * b) / 1000) as u8;
        }
        out
    }
}

/// Dense row-major `f32` matrix.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Array {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<f32>,
}

impl Array {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows == 0 || self.cols == 0
    }

    pub fn row(&self, index: usize) -> Option<&[f32]> {
        if index >= self.rows {
            return None;
        }
        let start = index * self.cols;
        self.data.get(start..start + self.cols)
    }

    pub fn row_mut(&mut self, index: usize) -> Option<&mut [f32]> {
        if index >= self.rows {
            return None;
        }
        let start = index * self.cols;
        self.data.get_mut(start..start + self.cols)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct KeyPoint {
    pub x: f32,
    pub y: f32,
    pub size: f32,
    pub angle: f32,
    pub response: f32,
    pub octave: i32,
}

/// Detected keypoints together with the image they were found in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyPoints {
    pub points: Vec<KeyPoint>,
    pub image: ImageBuffer,
}

/// Point correspondences between a query and a train image.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Matches {
    pub query_image: ImageBuffer,
    pub train_image: ImageBuffer,
    pub query_points: Vec<(f32, f32)>,
    pub train_points: Vec<(f32, f32)>,
}

impl Matches {
    pub fn len(&self) -> usize {
        self.query_points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.query_points.is_empty()
    }
}

/// Opaque handle to memory owned by the device collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceHandle(pub u64);

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceImage {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub handle: Option<DeviceHandle>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceArray {
    pub len: usize,
    pub element_size: usize,
    pub handle: Option<DeviceHandle>,
}

/// Payload stored in one socket.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum FlowData {
    #[default]
    Empty,
    ImageMono(ImageBuffer),
    ImageRgb(ImageBuffer),
    Array(Array),
    Keypoints(KeyPoints),
    Matches(Matches),
    DeviceImage(DeviceImage),
    DeviceArray(DeviceArray),
}

fn mismatch<T>(expected: FlowDataType, found: FlowDataType) -> PipelineResult<T> {
    Err(PipelineError::FlowTypeMismatch { expected, found })
}

impl FlowData {
    /// Empty storage for a socket declared as `flow_type`.
    ///
    /// A generic `Image` socket starts out as an empty mono image.
    pub fn empty_of(flow_type: FlowDataType) -> Self {
        match flow_type {
            FlowDataType::Invalid => FlowData::Empty,
            FlowDataType::Image | FlowDataType::ImageMono => {
                FlowData::ImageMono(ImageBuffer::default())
            }
            FlowDataType::ImageRgb => FlowData::ImageRgb(ImageBuffer::default()),
            FlowDataType::Array => FlowData::Array(Array::default()),
            FlowDataType::Keypoints => FlowData::Keypoints(KeyPoints::default()),
            FlowDataType::Matches => FlowData::Matches(Matches::default()),
            FlowDataType::DeviceImage => FlowData::DeviceImage(DeviceImage::default()),
            FlowDataType::DeviceArray => FlowData::DeviceArray(DeviceArray::default()),
        }
    }

    pub fn flow_type(&self) -> FlowDataType {
        match self {
            FlowData::Empty => FlowDataType::Invalid,
            FlowData::ImageMono(_) => FlowDataType::ImageMono,
            FlowData::ImageRgb(_) => FlowDataType::ImageRgb,
            FlowData::Array(_) => FlowDataType::Array,
            FlowData::Keypoints(_) => FlowDataType::Keypoints,
            FlowData::Matches(_) => FlowDataType::Matches,
            FlowData::DeviceImage(_) => FlowDataType::DeviceImage,
            FlowData::DeviceArray(_) => FlowDataType::DeviceArray,
        }
    }

    /// Whether the active payload holds no data.
    pub fn is_empty(&self) -> bool {
        match self {
            FlowData::Empty => true,
            FlowData::ImageMono(img) | FlowData::ImageRgb(img) => img.is_empty(),
            FlowData::Array(arr) => arr.is_empty(),
            FlowData::Keypoints(kp) => kp.points.is_empty() && kp.image.is_empty(),
            FlowData::Matches(m) => m.is_empty(),
            FlowData::DeviceImage(img) => img.handle.is_none(),
            FlowData::DeviceArray(arr) => arr.handle.is_none(),
        }
    }

    /// Approximate host memory held by the payload, in bytes.
    pub fn memory_consumption(&self) -> usize {
        match self {
            FlowData::Empty | FlowData::DeviceImage(_) | FlowData::DeviceArray(_) => 0,
            FlowData::ImageMono(img) | FlowData::ImageRgb(img) => img.data.len(),
            FlowData::Array(arr) => arr.data.len() * std::mem::size_of::<f32>(),
            FlowData::Keypoints(kp) => {
                kp.points.len() * std::mem::size_of::<KeyPoint>() + kp.image.data.len()
            }
            FlowData::Matches(m) => {
                (m.query_points.len() + m.train_points.len()) * std::mem::size_of::<(f32, f32)>()
                    + m.query_image.data.len()
                    + m.train_image.data.len()
            }
        }
    }

    /// Mono or color image.
    pub fn as_image(&self) -> PipelineResult<&ImageBuffer> {
        match self {
            FlowData::ImageMono(img) | FlowData::ImageRgb(img) => Ok(img),
            other => mismatch(FlowDataType::Image, other.flow_type()),
        }
    }

    pub fn as_image_mono(&self) -> PipelineResult<&ImageBuffer> {
        match self {
            FlowData::ImageMono(img) => Ok(img),
            other => mismatch(FlowDataType::ImageMono, other.flow_type()),
        }
    }

    pub fn as_image_mono_mut(&mut self) -> PipelineResult<&mut ImageBuffer> {
        match self {
            FlowData::ImageMono(img) => Ok(img),
            other => mismatch(FlowDataType::ImageMono, other.flow_type()),
        }
    }

    pub fn as_image_rgb(&self) -> PipelineResult<&ImageBuffer> {
        match self {
            FlowData::ImageRgb(img) => Ok(img),
            other => mismatch(FlowDataType::ImageRgb, other.flow_type()),
        }
    }

    pub fn as_image_rgb_mut(&mut self) -> PipelineResult<&mut ImageBuffer> {
        match self {
            FlowData::ImageRgb(img) => Ok(img),
            other => mismatch(FlowDataType::ImageRgb, other.flow_type()),
        }
    }

    pub fn as_array(&self) -> PipelineResult<&Array> {
        match self {
            FlowData::Array(arr) => Ok(arr),
            other => mismatch(FlowDataType::Array, other.flow_type()),
        }
    }

    pub fn as_array_mut(&mut self) -> PipelineResult<&mut Array> {
        match self {
            FlowData::Array(arr) => Ok(arr),
            other => mismatch(FlowDataType::Array, other.flow_type()),
        }
    }

    pub fn as_keypoints(&self) -> PipelineResult<&KeyPoints> {
        match self {
            FlowData::Keypoints(kp) => Ok(kp),
            other => mismatch(FlowDataType::Keypoints, other.flow_type()),
        }
    }

    pub fn as_keypoints_mut(&mut self) -> PipelineResult<&mut KeyPoints> {
        match self {
            FlowData::Keypoints(kp) => Ok(kp),
            other => mismatch(FlowDataType::Keypoints, other.flow_type()),
        }
    }

    pub fn as_matches(&self) -> PipelineResult<&Matches> {
        match self {
            FlowData::Matches(m) => Ok(m),
            other => mismatch(FlowDataType::Matches, other.flow_type()),
        }
    }

    pub fn as_matches_mut(&mut self) -> PipelineResult<&mut Matches> {
        match self {
            FlowData::Matches(m) => Ok(m),
            other => mismatch(FlowDataType::Matches, other.flow_type()),
        }
    }

    pub fn as_device_image(&self) -> PipelineResult<&DeviceImage> {
        match self {
            FlowData::DeviceImage(img) => Ok(img),
            other => mismatch(FlowDataType::DeviceImage, other.flow_type()),
        }
    }

    pub fn as_device_image_mut(&mut self) -> PipelineResult<&mut DeviceImage> {
        match self {
            FlowData::DeviceImage(img) => Ok(img),
            other => mismatch(FlowDataType::DeviceImage, other.flow_type()),
        }
    }

    pub fn as_device_array(&self) -> PipelineResult<&DeviceArray> {
        match self {
            FlowData::DeviceArray(arr) => Ok(arr),
            other => mismatch(FlowDataType::DeviceArray, other.flow_type()),
        }
    }

    pub fn as_device_array_mut(&mut self) -> PipelineResult<&mut DeviceArray> {
        match self {
            FlowData::DeviceArray(arr) => Ok(arr),
            other => mismatch(FlowDataType::DeviceArray, other.flow_type()),
        }
    }
}
