//! Built-in node types.
//!
//! Each module exposes a `register` function; `register_builtin_types` runs
//! all of them against a registry.

pub mod box_filter;
pub mod keypoints;
pub mod matcher;
pub mod statistics;
pub mod test_pattern;
pub mod threshold;

pub use box_filter::BoxFilterNode;
pub use keypoints::{DetectDescribeNode, LocalMaxima, LocalMaximaNode};
pub use matcher::MatcherNode;
pub use statistics::ImageStatisticsNode;
pub use test_pattern::TestPatternNode;
pub use threshold::ThresholdNode;

use crate::pipeline::registry::{NodeTypeRegistry, RegistrationFn};

pub const BUILTIN_REGISTRATIONS: &[RegistrationFn] = &[
    test_pattern::register,
    box_filter::register,
    threshold::register,
    keypoints::register,
    matcher::register,
    statistics::register,
];

pub fn register_builtin_types(registry: &mut NodeTypeRegistry) {
    registry.register_all(BUILTIN_REGISTRATIONS);
}
