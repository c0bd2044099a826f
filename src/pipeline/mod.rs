//! Node-based dataflow pipeline engine.
//!
//! A `Graph` holds nodes created from a `NodeTypeRegistry` and the links
//! between their sockets. Editing the graph tags the affected nodes; `step()`
//! turns the tagged set into an execution list containing every tagged node
//! and everything downstream of it, in dependency order, and runs each node
//! once.
//!
//! # Architecture
//!
//! ```text
//! [Test pattern] ──► [Box filter] ──► [Threshold] ──► [Detector] ──► [Matcher]
//!                                                └──► [Statistics]
//! ```
//!
//! # Design
//!
//! - **Trait objects for node bodies**: `Box<dyn NodeType>` created by factories.
//! - **Typed sockets**: `FlowData` enum, accessors fail on the wrong variant.
//! - **Move-to-end ordering**: `ExecutionPlan` relocates a node each time it is
//!   reached again, so it always lands after all of its producers.
//! - **Dedicated thread**: `GraphWorker` serializes mutation from other threads.

pub mod error;
pub mod flow_data;
pub mod graph;
pub mod id;
pub mod link;
pub mod node;
pub mod node_type;
pub mod nodes;
pub mod property;
pub mod registry;
pub mod scheduler;
pub mod socket;
pub mod socket_io;
pub mod worker;

pub use error::{PipelineError, PipelineResult};
pub use flow_data::{
    Array, DeviceArray, DeviceHandle, DeviceImage, FlowData, FlowDataType, ImageBuffer, KeyPoint,
    KeyPoints, Matches,
};
pub use graph::{Graph, StepReport, TagReason};
pub use id::{NodeId, NodeTypeId, PropertyId, SocketAddress, SocketId};
pub use link::Link;
pub use node::Node;
pub use node_type::{ExecutionStatus, NodeConfig, NodeFlags, NodeType, Status};
pub use property::{
    EnumValue, ExclusiveRange, FnValidator, InclusiveRange, Matrix3x3, MaxValue, MinValue,
    NodeProperty, PropertyConfig, PropertySet, PropertyType, PropertyValidator, PropertyValue,
};
pub use registry::{NodeFactory, NodeModule, NodeTypeInfo, NodeTypeRegistry, RegistrationFn};
pub use scheduler::{ExecutionPlan, PlanStats};
pub use socket::{SocketConfig, SocketDirection};
pub use socket_io::{SocketReader, SocketWriter};
pub use worker::{GraphWorker, WorkerBridge, WorkerCommand, WorkerEvent};
