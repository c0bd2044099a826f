//! # flowgraph: Node-based dataflow pipeline engine
//!
//! Image-processing style pipelines built from typed nodes joined by links.
//! Editing the graph tags the nodes whose output is stale; each `step()`
//! re-executes exactly the tagged nodes and everything downstream of them,
//! producers before consumers.
//!
//! ## Architecture
//!
//! - **Registry**: `NodeTypeRegistry` maps type names to node factories
//! - **Graph**: owns nodes, links, tags and the cached execution list
//! - **Scheduler**: builds the execution list with move-to-end relocation
//! - **Worker**: `GraphWorker` hosts a graph on its own thread behind
//!   crossbeam channels
//!
//! ## Example
//!
//! ```ignore
//! use flowgraph::pipeline::{Graph, NodeTypeRegistry, SocketAddress};
//! use std::sync::Arc;
//!
//! let mut graph = Graph::new(Arc::new(NodeTypeRegistry::new()));
//! let source = graph.create_node_by_type_name("Source/Test pattern", "Source")?;
//! let blur = graph.create_node_by_type_name("Filters/Box filter", "Blur")?;
//! graph.link_nodes(SocketAddress::output(source, 0), SocketAddress::input(blur, 0))?;
//! let report = graph.step()?;
//! assert_eq!(report.executed, vec![source, blur]);
//! ```

pub mod config;
pub mod error;
pub mod pipeline;

// Re-export commonly used types
pub use config::EngineConfig;
pub use error::{FlowError, Result, ResultExt};
pub use pipeline::{Graph, NodeId, NodeTypeRegistry, PipelineError, PipelineResult};
