//! Thread boundary between a host (UI, CLI) and a graph.
//!
//! The graph is not safe for concurrent mutation, so `GraphWorker` owns it on
//! a dedicated thread and applies commands one at a time from a bounded
//! crossbeam channel. `WorkerBridge` is the caller-side handle: it sends
//! `WorkerCommand`s and drains `WorkerEvent`s.

use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::graph::{Graph, TagReason};
use crate::pipeline::id::{NodeId, PropertyId, SocketAddress};
use crate::pipeline::node_type::ExecutionStatus;
use crate::pipeline::property::PropertyValue;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::Duration;

/// Commands sent from the host to the graph thread.
#[derive(Debug, Clone)]
pub enum WorkerCommand {
    CreateNode { type_name: String, name: String },
    RemoveNode(NodeId),
    LinkNodes { from: SocketAddress, to: SocketAddress },
    UnlinkNodes { from: SocketAddress, to: SocketAddress },
    TagNode(NodeId),
    SetProperty {
        node: NodeId,
        property: PropertyId,
        value: PropertyValue,
    },
    /// Run one pass.
    Step,
    RestartNodes,
    /// Report the current execution list.
    RequestExecutionList,
    Shutdown,
}

/// Messages sent from the graph thread back to the host.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    NodeCreated { id: NodeId, name: String },
    NodeRemoved(NodeId),
    Linked { from: SocketAddress, to: SocketAddress },
    Unlinked { from: SocketAddress, to: SocketAddress },
    PropertyChanged { node: NodeId, property: PropertyId },
    StepFinished {
        executed: Vec<NodeId>,
        errors: usize,
        elapsed: Duration,
    },
    /// A node returned an `Error` status during a pass.
    NodeError { node: NodeId, status: ExecutionStatus },
    ExecutionList(Vec<NodeId>),
    /// A command was rejected; the graph is unchanged.
    CommandFailed { command: &'static str, error: PipelineError },
    Shutdown,
}

/// Channel capacity for commands (host → graph).
const CMD_CHANNEL_CAPACITY: usize = 256;
/// Channel capacity for events (graph → host).
const EVENT_CHANNEL_CAPACITY: usize = 4_096;

/// Host-side handle for communicating with the graph thread.
pub struct WorkerBridge {
    pub cmd_tx: Sender<WorkerCommand>,
    pub event_rx: Receiver<WorkerEvent>,
}

impl WorkerBridge {
    /// Create a bridge pair: `(bridge_for_host, cmd_rx, event_tx)`.
    pub fn new() -> (Self, Receiver<WorkerCommand>, Sender<WorkerEvent>) {
        let (cmd_tx, cmd_rx) = bounded(CMD_CHANNEL_CAPACITY);
        let (event_tx, event_rx) = bounded(EVENT_CHANNEL_CAPACITY);
        (Self { cmd_tx, event_rx }, cmd_rx, event_tx)
    }

    /// Drain all pending events.
    pub fn drain(&self) -> Vec<WorkerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.event_rx.try_recv() {
            events.push(event);
        }
        events
    }

    pub fn try_recv(&self) -> Option<WorkerEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Block until the next event or the timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> PipelineResult<Option<WorkerEvent>> {
        match self.event_rx.recv_timeout(timeout) {
            Ok(event) => Ok(Some(event)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(PipelineError::WorkerDisconnected),
        }
    }

    pub fn send_command(&self, cmd: WorkerCommand) -> PipelineResult<()> {
        self.cmd_tx
            .send(cmd)
            .map_err(|_| PipelineError::WorkerDisconnected)
    }

    pub fn create_node(&self, type_name: &str, name: &str) -> PipelineResult<()> {
        self.send_command(WorkerCommand::CreateNode {
            type_name: type_name.to_string(),
            name: name.to_string(),
        })
    }

    pub fn link_nodes(&self, from: SocketAddress, to: SocketAddress) -> PipelineResult<()> {
        self.send_command(WorkerCommand::LinkNodes { from, to })
    }

    pub fn tag_node(&self, node: NodeId) -> PipelineResult<()> {
        self.send_command(WorkerCommand::TagNode(node))
    }

    pub fn step(&self) -> PipelineResult<()> {
        self.send_command(WorkerCommand::Step)
    }

    pub fn shutdown(&self) {
        let _ = self.cmd_tx.send(WorkerCommand::Shutdown);
    }
}

/// Owns a `Graph` and applies commands to it on its own thread.
pub struct GraphWorker {
    graph: Graph,
    cmd_rx: Receiver<WorkerCommand>,
    event_tx: Sender<WorkerEvent>,
}

impl GraphWorker {
    pub fn new(graph: Graph, cmd_rx: Receiver<WorkerCommand>, event_tx: Sender<WorkerEvent>) -> Self {
        Self {
            graph,
            cmd_rx,
            event_tx,
        }
    }

    /// Move `graph` onto a new thread and return the host-side bridge.
    pub fn spawn(graph: Graph) -> std::io::Result<(WorkerBridge, JoinHandle<()>)> {
        let (bridge, cmd_rx, event_tx) = WorkerBridge::new();
        let worker = GraphWorker::new(graph, cmd_rx, event_tx);
        let handle = std::thread::Builder::new()
            .name("flowgraph-worker".to_string())
            .spawn(move || worker.run())?;
        Ok((bridge, handle))
    }

    /// Process commands until `Shutdown` or until every bridge is dropped.
    pub fn run(mut self) {
        tracing::info!("Graph worker started");
        while let Ok(cmd) = self.cmd_rx.recv() {
            if matches!(cmd, WorkerCommand::Shutdown) {
                break;
            }
            self.handle(cmd);
        }
        self.graph.clear();
        let _ = self.event_tx.send(WorkerEvent::Shutdown);
        tracing::info!("Graph worker exiting");
    }

    fn emit(&self, event: WorkerEvent) {
        let _ = self.event_tx.send(event);
    }

    fn report<T>(&self, command: &'static str, result: PipelineResult<T>, on_ok: impl FnOnce(T) -> WorkerEvent) {
        match result {
            Ok(value) => self.emit(on_ok(value)),
            Err(error) => {
                tracing::warn!("{} failed: {}", command, error);
                self.emit(WorkerEvent::CommandFailed { command, error });
            }
        }
    }

    fn handle(&mut self, cmd: WorkerCommand) {
        match cmd {
            WorkerCommand::CreateNode { type_name, name } => {
                let result = self.graph.create_node_by_type_name(&type_name, &name);
                self.report("create_node", result, |id| WorkerEvent::NodeCreated { id, name });
            }
            WorkerCommand::RemoveNode(id) => {
                let result = self.graph.remove_node(id);
                self.report("remove_node", result, |_| WorkerEvent::NodeRemoved(id));
            }
            WorkerCommand::LinkNodes { from, to } => {
                let result = self.graph.link_nodes(from, to);
                self.report("link_nodes", result, |_| WorkerEvent::Linked { from, to });
            }
            WorkerCommand::UnlinkNodes { from, to } => {
                let result = self.graph.unlink_nodes(from, to);
                self.report("unlink_nodes", result, |_| WorkerEvent::Unlinked { from, to });
            }
            WorkerCommand::TagNode(id) => {
                if let Err(error) = self.graph.tag_node(id, TagReason::User) {
                    self.emit(WorkerEvent::CommandFailed {
                        command: "tag_node",
                        error,
                    });
                }
            }
            WorkerCommand::SetProperty {
                node,
                property,
                value,
            } => {
                let result = self.graph.set_node_property(node, property, value);
                self.report("set_property", result, |_| WorkerEvent::PropertyChanged {
                    node,
                    property,
                });
            }
            WorkerCommand::Step => self.handle_step(),
            WorkerCommand::RestartNodes => self.graph.restart_nodes(),
            WorkerCommand::RequestExecutionList => {
                let result = self.graph.prepare_list().map(|list| list.to_vec());
                self.report("prepare_list", result, WorkerEvent::ExecutionList);
            }
            WorkerCommand::Shutdown => {}
        }
    }

    fn handle_step(&mut self) {
        let report = match self.graph.step() {
            Ok(report) => report,
            Err(error) => {
                tracing::warn!("step failed: {}", error);
                self.emit(WorkerEvent::CommandFailed {
                    command: "step",
                    error,
                });
                return;
            }
        };

        for &node in &report.executed {
            if let Some(status) = self.graph.last_status(node).filter(|s| s.is_error()) {
                self.emit(WorkerEvent::NodeError {
                    node,
                    status: status.clone(),
                });
            }
        }
        self.emit(WorkerEvent::StepFinished {
            executed: report.executed,
            errors: report.errors,
            elapsed: report.elapsed,
        });
    }
}
