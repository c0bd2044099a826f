//! Socket descriptors for the node system.
//!
//! Each node type declares its sockets (inputs/outputs) in its `NodeConfig`.
//! The graph uses these to range-check link endpoints and to size a node's
//! output storage.

use crate::pipeline::flow_data::FlowDataType;
use serde::Serialize;

/// Whether a socket is an input or output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SocketDirection {
    Input,
    Output,
}

/// Static descriptor for one socket of a node type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SocketConfig {
    pub name: &'static str,
    pub human_name: &'static str,
    pub description: &'static str,
    pub direction: SocketDirection,
    pub flow_type: FlowDataType,
}

impl SocketConfig {
    pub const fn input(name: &'static str, flow_type: FlowDataType) -> Self {
        Self {
            name,
            human_name: name,
            description: "",
            direction: SocketDirection::Input,
            flow_type,
        }
    }

    pub const fn output(name: &'static str, flow_type: FlowDataType) -> Self {
        Self {
            name,
            human_name: name,
            description: "",
            direction: SocketDirection::Output,
            flow_type,
        }
    }

    pub const fn with_human_name(mut self, human_name: &'static str) -> Self {
        self.human_name = human_name;
        self
    }

    pub const fn with_description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }
}
