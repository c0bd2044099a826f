//! The node-authoring contract.
//!
//! Every processing step implements `NodeType`. The graph only ever talks to a
//! node through this trait: it reads the declared schema from
//! `configuration()`, routes property edits through `set_property`, and calls
//! `restart`/`execute`/`finish` over the node's lifetime:
//!
//! ```text
//! Created ──► (Restart ──►)* Executing* ──► Finished
//! ```

use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::id::PropertyId;
use crate::pipeline::property::{PropertyConfig, PropertySet, PropertyValue};
use crate::pipeline::registry::NodeModule;
use crate::pipeline::socket::SocketConfig;
use crate::pipeline::socket_io::{SocketReader, SocketWriter};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Behavioral flags declared by a node type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NodeFlags {
    /// Keeps state between executions (capture devices, frame counters).
    pub has_state: bool,
    /// Re-tagged after every pass.
    pub auto_tag: bool,
    /// Reports its own elapsed time in `ExecutionStatus::elapsed`.
    pub overrides_timing: bool,
}

/// Most sockets per direction, and most properties, one node type may declare.
/// Ids are `u8` with `u8::MAX` reserved as the invalid sentinel.
pub const MAX_SCHEMA_ENTRIES: usize = u8::MAX as usize;

/// Schema of a node type: sockets, properties, description and flags.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NodeConfig {
    pub inputs: Vec<SocketConfig>,
    pub outputs: Vec<SocketConfig>,
    pub properties: Vec<PropertyConfig>,
    pub description: String,
    /// Name of the `NodeModule` this type needs, if any.
    pub module: Option<String>,
    pub flags: NodeFlags,
}

impl NodeConfig {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Default::default()
        }
    }

    pub fn with_inputs(mut self, inputs: &[SocketConfig]) -> Self {
        self.inputs = inputs.to_vec();
        self
    }

    pub fn with_outputs(mut self, outputs: &[SocketConfig]) -> Self {
        self.outputs = outputs.to_vec();
        self
    }

    pub fn with_properties(mut self, props: &PropertySet) -> Self {
        self.properties = props.configs();
        self
    }

    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    pub fn with_flags(mut self, flags: NodeFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Whether every socket and property can be addressed by an id.
    pub fn fits_ids(&self) -> bool {
        [self.inputs.len(), self.outputs.len(), self.properties.len()]
            .iter()
            .all(|&n| n <= MAX_SCHEMA_ENTRIES)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Status {
    Ok,
    /// Succeeded and asks to be tagged again for the next pass.
    Tag,
    Error,
}

/// Outcome of one `execute` call.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionStatus {
    pub status: Status,
    /// Info text for `Ok`, error text for `Error`.
    pub message: String,
    pub elapsed: Option<Duration>,
}

impl ExecutionStatus {
    pub fn ok() -> Self {
        Self {
            status: Status::Ok,
            message: String::new(),
            elapsed: None,
        }
    }

    /// `Ok` with an informational message.
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            status: Status::Ok,
            message: message.into(),
            elapsed: None,
        }
    }

    pub fn tag() -> Self {
        Self {
            status: Status::Tag,
            message: String::new(),
            elapsed: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            message: message.into(),
            elapsed: None,
        }
    }

    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = Some(elapsed);
        self
    }

    #[inline]
    pub fn is_error(&self) -> bool {
        self.status == Status::Error
    }
}

impl From<PipelineError> for ExecutionStatus {
    fn from(err: PipelineError) -> Self {
        ExecutionStatus::error(err.to_string())
    }
}

impl From<PipelineResult<()>> for ExecutionStatus {
    fn from(result: PipelineResult<()>) -> Self {
        match result {
            Ok(()) => ExecutionStatus::ok(),
            Err(e) => e.into(),
        }
    }
}

/// Polymorphic behavior of a node.
///
/// Only `configuration` and `execute` are mandatory. Types with properties
/// expose their `PropertySet` and get validated get/set for free.
pub trait NodeType: Send {
    fn configuration(&self) -> NodeConfig;

    fn execute(&mut self, reader: &SocketReader, writer: &mut SocketWriter) -> ExecutionStatus;

    fn properties(&self) -> Option<&PropertySet> {
        None
    }

    fn properties_mut(&mut self) -> Option<&mut PropertySet> {
        None
    }

    /// Validated write. On error the stored value is unchanged.
    fn set_property(&mut self, id: PropertyId, value: PropertyValue) -> PipelineResult<()> {
        self.properties_mut()
            .ok_or(PipelineError::PropertyNotFound(id))?
            .set(id, value)?;
        self.on_property_changed(id);
        Ok(())
    }

    fn property(&self, id: PropertyId) -> Option<PropertyValue> {
        self.properties()?.get(id).cloned()
    }

    /// Called after a property has been accepted and stored.
    fn on_property_changed(&mut self, _id: PropertyId) {}

    /// Reinitialize per-run state. Returning false skips the node this pass.
    fn restart(&mut self) -> bool {
        true
    }

    /// Release external resources. Called once before the node is dropped.
    fn finish(&mut self) {}

    /// Receive the module declared in `NodeConfig::module`.
    fn attach_module(&mut self, _module: Arc<dyn NodeModule>) {}
}
