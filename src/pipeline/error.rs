//! Pipeline-specific error types.

use crate::pipeline::flow_data::FlowDataType;
use crate::pipeline::id::{NodeId, NodeTypeId, PropertyId, SocketAddress};
use thiserror::Error;

/// Errors that can occur within the pipeline system.
///
/// Graph mutations that fail with one of these leave the graph untouched.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("Invalid node: {0:?}")]
    InvalidNode(NodeId),

    #[error("Node name '{0}' is already in use")]
    DuplicateName(String),

    #[error("Unknown node name '{0}'")]
    UnknownName(String),

    #[error("Unknown node type: {0:?}")]
    UnknownNodeType(NodeTypeId),

    #[error("Factory for node type {0:?} produced no node")]
    FactoryFailed(NodeTypeId),

    #[error("Node type {0:?} declares more sockets or properties than ids can address")]
    SchemaTooLarge(NodeTypeId),

    #[error("Socket out of range: {0:?}")]
    SocketOutOfRange(SocketAddress),

    #[error("Link must join exactly one output to one input ({from:?} -> {to:?})")]
    LinkDirection { from: SocketAddress, to: SocketAddress },

    #[error("Input socket {0:?} already has a producer")]
    InputAlreadyConnected(SocketAddress),

    #[error("No link between {from:?} and {to:?}")]
    LinkNotFound { from: SocketAddress, to: SocketAddress },

    #[error("Cycle detected in pipeline graph at node {node:?}")]
    CycleDetected { node: NodeId },

    #[error("Flow data mismatch: expected {expected:?}, found {found:?}")]
    FlowTypeMismatch {
        expected: FlowDataType,
        found: FlowDataType,
    },

    #[error("Node has no property {0:?}")]
    PropertyNotFound(PropertyId),

    #[error("Value rejected by validator of property {0:?}")]
    PropertyRejected(PropertyId),

    #[error("Value type does not match property {0:?}")]
    PropertyTypeMismatch(PropertyId),

    #[error("Node module '{0}' is not available")]
    ModuleUnavailable(String),

    #[error("Graph worker disconnected")]
    WorkerDisconnected,
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
