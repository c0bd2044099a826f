//! The node graph and its incremental scheduler.
//!
//! `Graph` owns every node (in an arena indexed by `NodeId`, with a free list
//! for recycling), the link list, and the list of tagged (dirty) nodes. Each
//! `step()`:
//! 1. Sorts the links so that links sharing a producer socket are contiguous.
//! 2. Builds the execution list from the tagged nodes (see `scheduler`).
//! 3. Executes the listed nodes one at a time, in order.
//! 4. Clears the tags, then re-tags nodes that asked for it.
//!
//! Mutations that fail return an error and leave the graph unchanged.

use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::flow_data::FlowData;
use crate::pipeline::id::{NodeId, NodeTypeId, PropertyId, SocketAddress, SocketId};
use crate::pipeline::link::Link;
use crate::pipeline::node::Node;
use crate::pipeline::node_type::{ExecutionStatus, NodeConfig, Status};
use crate::pipeline::property::PropertyValue;
use crate::pipeline::registry::NodeTypeRegistry;
use crate::pipeline::scheduler::{ExecutionPlan, PlanStats};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Why a node was tagged. Only used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagReason {
    Created,
    Linked,
    Unlinked,
    UpstreamRemoved,
    PropertyChanged,
    SelfTagged,
    AutoTag,
    Restarted,
    User,
}

/// Summary of one `step()`.
#[derive(Debug, Clone, Default)]
pub struct StepReport {
    /// Nodes in execution order, including ones skipped by a failed restart.
    pub executed: Vec<NodeId>,
    pub errors: usize,
    pub elapsed: Duration,
    pub plan: PlanStats,
}

pub struct Graph {
    registry: Arc<NodeTypeRegistry>,
    slots: Vec<Option<Node>>,
    recycled: Vec<NodeId>,
    links: Vec<Link>,
    tagged: Vec<NodeId>,
    execute_list: Vec<NodeId>,
    /// True when `execute_list` no longer matches (tags, links).
    list_dirty: bool,
    plan_stats: PlanStats,
    names: HashMap<String, NodeId>,
    state_nodes: Vec<NodeId>,
    auto_tag_nodes: Vec<NodeId>,
    catch_panics: bool,
}

impl Graph {
    pub fn new(registry: Arc<NodeTypeRegistry>) -> Self {
        Self {
            registry,
            slots: Vec::new(),
            recycled: Vec::new(),
            links: Vec::new(),
            tagged: Vec::new(),
            execute_list: Vec::new(),
            list_dirty: false,
            plan_stats: PlanStats::default(),
            names: HashMap::new(),
            state_nodes: Vec::new(),
            auto_tag_nodes: Vec::new(),
            catch_panics: true,
        }
    }

    pub fn registry(&self) -> &Arc<NodeTypeRegistry> {
        &self.registry
    }

    /// Whether a panicking node body is recorded as an error instead of unwinding.
    pub fn set_catch_panics(&mut self, catch: bool) {
        self.catch_panics = catch;
    }

    // ── Node lifecycle ──

    pub fn create_node(&mut self, type_id: NodeTypeId, name: &str) -> PipelineResult<NodeId> {
        if self.names.contains_key(name) {
            return Err(PipelineError::DuplicateName(name.to_string()));
        }

        let mut node_type = self.registry.create(type_id)?;
        let config = node_type.configuration();
        if !config.fits_ids() {
            return Err(PipelineError::SchemaTooLarge(type_id));
        }
        if let Some(module_name) = &config.module {
            let module = self
                .registry
                .module(module_name)
                .filter(|m| m.ensure_initialized())
                .ok_or_else(|| PipelineError::ModuleUnavailable(module_name.clone()))?;
            node_type.attach_module(module);
        }

        let node = Node::new(type_id, name, node_type);
        let flags = node.flags();
        let id = self.allocate(node);
        self.names.insert(name.to_string(), id);
        if flags.has_state {
            self.state_nodes.push(id);
        }
        if flags.auto_tag {
            self.auto_tag_nodes.push(id);
        }
        self.tag(id, TagReason::Created);

        tracing::info!(
            "Created node '{}' ({}) as {}",
            name,
            self.registry.type_name(type_id).unwrap_or("?"),
            id
        );
        Ok(id)
    }

    /// Create a node by registered type name.
    pub fn create_node_by_type_name(&mut self, type_name: &str, name: &str) -> PipelineResult<NodeId> {
        let type_id = self.registry.type_id(type_name);
        if !type_id.is_valid() {
            return Err(PipelineError::UnknownNodeType(type_id));
        }
        self.create_node(type_id, name)
    }

    fn allocate(&mut self, node: Node) -> NodeId {
        match self.recycled.pop() {
            Some(id) => {
                self.slots[id.index()] = Some(node);
                id
            }
            None => {
                self.slots.push(Some(node));
                NodeId((self.slots.len() - 1) as u32)
            }
        }
    }

    /// Remove a node and every link touching it.
    ///
    /// Direct consumers of the node are tagged, since their inputs just
    /// became unconnected.
    pub fn remove_node(&mut self, id: NodeId) -> PipelineResult<()> {
        self.node(id)?;

        let consumers: Vec<NodeId> = self
            .links
            .iter()
            .filter(|l| l.from_node == id && l.to_node != id)
            .map(|l| l.to_node)
            .collect();
        for consumer in consumers {
            self.tag(consumer, TagReason::UpstreamRemoved);
        }

        let before = self.links.len();
        self.links.retain(|l| !l.touches(id));
        if self.links.len() != before {
            self.list_dirty = true;
        }

        if let Some(mut node) = self.slots[id.index()].take() {
            node.finish();
            self.names.remove(node.name());
            tracing::info!("Removed node '{}' ({})", node.name(), id);
        }
        self.recycled.push(id);
        self.untag_node(id);
        self.state_nodes.retain(|&n| n != id);
        self.auto_tag_nodes.retain(|&n| n != id);
        Ok(())
    }

    pub fn remove_node_by_name(&mut self, name: &str) -> PipelineResult<()> {
        let id = self.resolve_node(name);
        if !id.is_valid() {
            return Err(PipelineError::UnknownName(name.to_string()));
        }
        self.remove_node(id)
    }

    /// Remove every node and link, finishing each node.
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            if let Some(node) = slot.as_mut() {
                node.finish();
            }
        }
        self.slots.clear();
        self.recycled.clear();
        self.links.clear();
        self.tagged.clear();
        self.execute_list.clear();
        self.names.clear();
        self.state_nodes.clear();
        self.auto_tag_nodes.clear();
        self.list_dirty = false;
    }

    // ── Links ──

    /// Check both endpoints and return them as (output, input).
    fn validate_link(&self, from: SocketAddress, to: SocketAddress) -> PipelineResult<(SocketAddress, SocketAddress)> {
        if from.is_output == to.is_output {
            return Err(PipelineError::LinkDirection { from, to });
        }
        let (from, to) = if from.is_output { (from, to) } else { (to, from) };

        let producer = self.node(from.node)?;
        if from.socket.index() >= producer.num_output_sockets() {
            return Err(PipelineError::SocketOutOfRange(from));
        }
        let consumer = self.node(to.node)?;
        if to.socket.index() >= consumer.num_input_sockets() {
            return Err(PipelineError::SocketOutOfRange(to));
        }
        Ok((from, to))
    }

    /// Link an output socket to an input socket.
    ///
    /// The pair may be given in either order. An input accepts at most one
    /// producer.
    pub fn link_nodes(&mut self, from: SocketAddress, to: SocketAddress) -> PipelineResult<()> {
        let (from, to) = self.validate_link(from, to)?;
        if self.producer_of(to.node, to.socket).is_some() {
            return Err(PipelineError::InputAlreadyConnected(to));
        }

        self.links.push(Link::from_addresses(from, to));
        self.list_dirty = true;
        tracing::debug!(
            "Linked {}:{:?} -> {}:{:?}",
            from.node,
            from.socket,
            to.node,
            to.socket
        );
        self.tag(to.node, TagReason::Linked);
        Ok(())
    }

    pub fn unlink_nodes(&mut self, from: SocketAddress, to: SocketAddress) -> PipelineResult<()> {
        let (from, to) = self.validate_link(from, to)?;
        let link = Link::from_addresses(from, to);

        self.links.sort();
        let pos = self
            .links
            .binary_search(&link)
            .map_err(|_| PipelineError::LinkNotFound { from, to })?;
        self.links.remove(pos);
        self.list_dirty = true;
        tracing::debug!(
            "Unlinked {}:{:?} -> {}:{:?}",
            from.node,
            from.socket,
            to.node,
            to.socket
        );
        self.tag(to.node, TagReason::Unlinked);
        Ok(())
    }

    /// Link feeding `(node, socket)`, found by linear scan.
    fn producer_of(&self, node: NodeId, socket: SocketId) -> Option<&Link> {
        self.links
            .iter()
            .find(|l| l.to_node == node && l.to_socket == socket)
    }

    /// Producer address feeding an input socket. `None` for output addresses,
    /// invalid nodes and unconnected inputs.
    pub fn connected_from(&self, input: SocketAddress) -> Option<SocketAddress> {
        if input.is_output || self.node(input.node).is_err() {
            return None;
        }
        self.producer_of(input.node, input.socket)
            .map(Link::from_address)
    }

    pub fn is_input_connected(&self, input: SocketAddress) -> bool {
        self.connected_from(input).is_some()
    }

    pub fn is_output_connected(&self, output: SocketAddress) -> bool {
        output.is_output
            && self
                .links
                .iter()
                .any(|l| l.from_node == output.node && l.from_socket == output.socket)
    }

    // ── Tagging ──

    fn tag(&mut self, id: NodeId, reason: TagReason) {
        if !self.tagged.contains(&id) {
            tracing::debug!("Tagged {} ({:?})", id, reason);
            self.tagged.push(id);
            self.list_dirty = true;
        }
    }

    /// Mark a node for execution in the next `step()`. Re-tagging is a no-op.
    pub fn tag_node(&mut self, id: NodeId, reason: TagReason) -> PipelineResult<()> {
        self.node(id)?;
        self.tag(id, reason);
        Ok(())
    }

    pub fn untag_node(&mut self, id: NodeId) {
        let before = self.tagged.len();
        self.tagged.retain(|&n| n != id);
        if self.tagged.len() != before {
            self.list_dirty = true;
        }
    }

    pub fn tagged(&self) -> &[NodeId] {
        &self.tagged
    }

    pub fn is_tagged(&self, id: NodeId) -> bool {
        self.tagged.contains(&id)
    }

    fn tag_auto_nodes(&mut self) {
        let auto = self.auto_tag_nodes.clone();
        for id in auto {
            self.tag(id, TagReason::AutoTag);
        }
    }

    // ── Scheduling ──

    /// Rebuild the execution list if the tags or links changed since the
    /// last build.
    pub fn prepare_list(&mut self) -> PipelineResult<&[NodeId]> {
        if self.list_dirty {
            self.links.sort();
            let plan = ExecutionPlan::build(&self.tagged, &self.links).inspect_err(|e| {
                tracing::warn!("Execution list rejected: {}", e);
            })?;
            tracing::debug!(
                "Execution list built: {} nodes from {} roots ({} relocations)",
                plan.stats.listed,
                plan.stats.roots,
                plan.stats.relocations
            );
            self.execute_list = plan.order;
            self.plan_stats = plan.stats;
            self.list_dirty = false;
        }
        Ok(&self.execute_list)
    }

    /// The list produced by the last `prepare_list`/`step`.
    pub fn execution_list(&self) -> &[NodeId] {
        &self.execute_list
    }

    /// Run one pass over the tagged nodes and their descendants.
    ///
    /// A node returning `Error` does not stop the pass. On a cyclic graph
    /// nothing executes and the tags are kept.
    pub fn step(&mut self) -> PipelineResult<StepReport> {
        let start = Instant::now();
        let list = self.prepare_list()?.to_vec();

        let mut report = StepReport {
            plan: self.plan_stats.clone(),
            ..Default::default()
        };
        let mut self_tagged = Vec::new();

        for id in list {
            let Some(mut node) = self.slots[id.index()].take() else {
                continue;
            };
            let status = self.run_node(id, &mut node);
            match status.status {
                Status::Error => report.errors += 1,
                Status::Tag => self_tagged.push(id),
                Status::Ok => {}
            }
            node.record_status(status);
            self.slots[id.index()] = Some(node);
            report.executed.push(id);
        }

        self.tagged.clear();
        self.list_dirty = true;
        for id in self_tagged {
            self.tag(id, TagReason::SelfTagged);
        }
        self.tag_auto_nodes();

        report.elapsed = start.elapsed();
        Ok(report)
    }

    /// Restart (if pending) and execute one node taken out of its slot.
    fn run_node(&self, id: NodeId, node: &mut Node) -> ExecutionStatus {
        if node.needs_restart() && !node.restart() {
            tracing::warn!("Node '{}' ({}) failed to restart", node.name(), id);
            return ExecutionStatus::error("restart failed");
        }

        let inputs: Vec<Option<&FlowData>> = (0..node.num_input_sockets())
            .map(|socket| {
                let link = self.producer_of(id, SocketId::from_index(socket)?)?;
                self.slots
                    .get(link.from_node.index())?
                    .as_ref()?
                    .output_socket(link.from_socket)
            })
            .collect();

        let status = node.execute(id, inputs, self.catch_panics);
        match status.status {
            Status::Error => tracing::warn!(
                "Node '{}' ({}) failed: {}",
                node.name(),
                id,
                status.message
            ),
            _ => tracing::trace!(
                "Node '{}' ({}) executed in {:?}",
                node.name(),
                id,
                status.elapsed.unwrap_or_default()
            ),
        }
        status
    }

    /// Ask every live node to restart before its next execution, and tag
    /// the stateful ones.
    pub fn restart_nodes(&mut self) {
        for node in self.slots.iter_mut().flatten() {
            node.request_restart();
        }
        let state = self.state_nodes.clone();
        for id in state {
            self.tag(id, TagReason::Restarted);
        }
    }

    /// True if no live node keeps state between executions.
    pub fn is_stateless(&self) -> bool {
        self.state_nodes.is_empty()
    }

    // ── Queries ──

    fn node(&self, id: NodeId) -> PipelineResult<&Node> {
        self.slots
            .get(id.index())
            .and_then(Option::as_ref)
            .ok_or(PipelineError::InvalidNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> PipelineResult<&mut Node> {
        self.slots
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(PipelineError::InvalidNode(id))
    }

    pub fn get_node(&self, id: NodeId) -> Option<&Node> {
        self.node(id).ok()
    }

    pub fn node_count(&self) -> usize {
        self.slots.len() - self.recycled.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// `NodeId::INVALID` when no node has that name.
    pub fn resolve_node(&self, name: &str) -> NodeId {
        self.names.get(name).copied().unwrap_or(NodeId::INVALID)
    }

    pub fn node_name(&self, id: NodeId) -> Option<&str> {
        self.node(id).ok().map(Node::name)
    }

    pub fn set_node_name(&mut self, id: NodeId, name: &str) -> PipelineResult<()> {
        match self.names.get(name) {
            Some(&owner) if owner == id => return Ok(()),
            Some(_) => return Err(PipelineError::DuplicateName(name.to_string())),
            None => {}
        }
        let node = self.node_mut(id)?;
        let old = node.name().to_string();
        node.set_name(name.to_string());
        self.names.remove(&old);
        self.names.insert(name.to_string(), id);
        Ok(())
    }

    /// `NodeTypeId::INVALID` for an invalid node.
    pub fn node_type_id(&self, id: NodeId) -> NodeTypeId {
        self.node(id).map(Node::type_id).unwrap_or(NodeTypeId::INVALID)
    }

    pub fn node_type_name(&self, id: NodeId) -> Option<&str> {
        self.registry.type_name(self.node(id).ok()?.type_id())
    }

    pub fn node_config(&self, id: NodeId) -> PipelineResult<&NodeConfig> {
        self.node(id).map(Node::config)
    }

    pub fn node_property(&self, id: NodeId, property: PropertyId) -> PipelineResult<PropertyValue> {
        self.node(id)?.property(property)
    }

    /// Validated property write. Tags the node on success.
    pub fn set_node_property(
        &mut self,
        id: NodeId,
        property: PropertyId,
        value: PropertyValue,
    ) -> PipelineResult<()> {
        self.node_mut(id)?.set_property(property, value)?;
        self.tag(id, TagReason::PropertyChanged);
        Ok(())
    }

    pub fn last_status(&self, id: NodeId) -> Option<&ExecutionStatus> {
        self.node(id).ok()?.last_status()
    }

    /// Storage of an output socket.
    pub fn output_socket(&self, id: NodeId, socket: SocketId) -> PipelineResult<&FlowData> {
        self.node(id)?
            .output_socket(socket)
            .ok_or(PipelineError::SocketOutOfRange(SocketAddress::new(id, socket, true)))
    }

    /// What an input socket currently reads: the producer's output, or an
    /// empty payload of the declared type when unconnected.
    pub fn input_socket(&self, id: NodeId, socket: SocketId) -> PipelineResult<&FlowData> {
        let node = self.node(id)?;
        let address = SocketAddress::new(id, socket, false);
        match self.producer_of(id, socket) {
            Some(link) => self.output_socket(link.from_node, link.from_socket),
            None => node
                .empty_input(socket)
                .ok_or(PipelineError::SocketOutOfRange(address)),
        }
    }

    /// Live nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|n| (NodeId(i as u32), n)))
    }

    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.links.iter()
    }
}

impl Drop for Graph {
    fn drop(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::flow_data::{Array, FlowDataType};
    use crate::pipeline::node_type::{NodeFlags, NodeType};
    use crate::pipeline::property::{InclusiveRange, PropertySet};
    use crate::pipeline::registry::{MockNodeModule, NodeModule};
    use crate::pipeline::socket::SocketConfig;
    use crate::pipeline::socket_io::{SocketReader, SocketWriter};

    /// Emits a 1x1 array holding its "Value" property.
    struct Constant {
        props: PropertySet,
    }

    impl Default for Constant {
        fn default() -> Self {
            let mut props = PropertySet::new();
            props
                .add("Value", 1.0)
                .set_validator(InclusiveRange { min: 0.0, max: 100.0 });
            Self { props }
        }
    }

    impl NodeType for Constant {
        fn configuration(&self) -> NodeConfig {
            NodeConfig::new("Constant")
                .with_outputs(&[SocketConfig::output("value", FlowDataType::Array)])
                .with_properties(&self.props)
        }

        fn execute(&mut self, _: &SocketReader, writer: &mut SocketWriter) -> ExecutionStatus {
            let value = self.props.get_double(PropertyId(0)).unwrap_or_default();
            let mut out = Array::new(1, 1);
            out.data[0] = value as f32;
            writer.write_socket(SocketId(0), FlowData::Array(out)).into()
        }

        fn properties(&self) -> Option<&PropertySet> {
            Some(&self.props)
        }

        fn properties_mut(&mut self) -> Option<&mut PropertySet> {
            Some(&mut self.props)
        }
    }

    /// Adds one to every element of its input.
    #[derive(Default)]
    struct Increment;

    impl NodeType for Increment {
        fn configuration(&self) -> NodeConfig {
            NodeConfig::new("Increment")
                .with_inputs(&[SocketConfig::input("in", FlowDataType::Array)])
                .with_outputs(&[SocketConfig::output("out", FlowDataType::Array)])
        }

        fn execute(&mut self, reader: &SocketReader, writer: &mut SocketWriter) -> ExecutionStatus {
            let mut out = match reader.read_array(SocketId(0)) {
                Ok(a) => a.clone(),
                Err(e) => return e.into(),
            };
            out.data.iter_mut().for_each(|v| *v += 1.0);
            writer.write_socket(SocketId(0), FlowData::Array(out)).into()
        }
    }

    /// Two inputs, no outputs.
    #[derive(Default)]
    struct Sink;

    impl NodeType for Sink {
        fn configuration(&self) -> NodeConfig {
            NodeConfig::new("Sink").with_inputs(&[
                SocketConfig::input("a", FlowDataType::Array),
                SocketConfig::input("b", FlowDataType::Array),
            ])
        }

        fn execute(&mut self, reader: &SocketReader, _: &mut SocketWriter) -> ExecutionStatus {
            if reader.all_inputs_connected() {
                ExecutionStatus::ok()
            } else {
                ExecutionStatus::error("missing input")
            }
        }
    }

    #[derive(Default)]
    struct Ticker;

    impl NodeType for Ticker {
        fn configuration(&self) -> NodeConfig {
            NodeConfig::new("Ticker")
                .with_outputs(&[SocketConfig::output("out", FlowDataType::Array)])
                .with_flags(NodeFlags {
                    has_state: true,
                    auto_tag: true,
                    ..Default::default()
                })
        }

        fn execute(&mut self, _: &SocketReader, _: &mut SocketWriter) -> ExecutionStatus {
            ExecutionStatus::ok()
        }
    }

    #[derive(Default)]
    struct AsksAgain;

    impl NodeType for AsksAgain {
        fn configuration(&self) -> NodeConfig {
            NodeConfig::new("AsksAgain")
        }

        fn execute(&mut self, _: &SocketReader, _: &mut SocketWriter) -> ExecutionStatus {
            ExecutionStatus::tag()
        }
    }

    #[derive(Default)]
    struct NoRestart;

    impl NodeType for NoRestart {
        fn configuration(&self) -> NodeConfig {
            NodeConfig::new("NoRestart")
        }

        fn execute(&mut self, _: &SocketReader, _: &mut SocketWriter) -> ExecutionStatus {
            ExecutionStatus::ok()
        }

        fn restart(&mut self) -> bool {
            false
        }
    }

    /// `N` array inputs and nothing else.
    #[derive(Default)]
    struct Wide<const N: usize>;

    impl<const N: usize> NodeType for Wide<N> {
        fn configuration(&self) -> NodeConfig {
            NodeConfig::new("Wide")
                .with_inputs(&vec![SocketConfig::input("in", FlowDataType::Array); N])
        }

        fn execute(&mut self, _: &SocketReader, _: &mut SocketWriter) -> ExecutionStatus {
            ExecutionStatus::ok()
        }
    }

    #[derive(Default)]
    struct NeedsDevice;

    impl NodeType for NeedsDevice {
        fn configuration(&self) -> NodeConfig {
            NodeConfig::new("NeedsDevice").with_module("device")
        }

        fn execute(&mut self, _: &SocketReader, _: &mut SocketWriter) -> ExecutionStatus {
            ExecutionStatus::ok()
        }
    }

    fn registry() -> NodeTypeRegistry {
        let mut r = NodeTypeRegistry::empty();
        r.register_default::<Constant>("Test/Constant");
        r.register_default::<Increment>("Test/Increment");
        r.register_default::<Sink>("Test/Sink");
        r.register_default::<Ticker>("Test/Ticker");
        r.register_default::<AsksAgain>("Test/AsksAgain");
        r.register_default::<NoRestart>("Test/NoRestart");
        r.register_default::<NeedsDevice>("Test/NeedsDevice");
        r.register_default::<Wide<255>>("Test/Wide255");
        r.register_default::<Wide<256>>("Test/Wide256");
        r
    }

    fn graph() -> Graph {
        Graph::new(Arc::new(registry()))
    }

    fn out(node: NodeId, socket: u8) -> SocketAddress {
        SocketAddress::output(node, socket)
    }

    fn inp(node: NodeId, socket: u8) -> SocketAddress {
        SocketAddress::input(node, socket)
    }

    fn value(g: &Graph, node: NodeId) -> f32 {
        g.output_socket(node, SocketId(0)).unwrap().as_array().unwrap().data[0]
    }

    #[test]
    fn test_chain_executes_in_order() {
        let mut g = graph();
        let a = g.create_node_by_type_name("Test/Constant", "A").unwrap();
        let b = g.create_node_by_type_name("Test/Increment", "B").unwrap();
        let c = g.create_node_by_type_name("Test/Increment", "C").unwrap();
        g.link_nodes(out(a, 0), inp(b, 0)).unwrap();
        g.link_nodes(out(b, 0), inp(c, 0)).unwrap();
        g.step().unwrap();
        assert!(g.tagged().is_empty());

        g.tag_node(a, TagReason::User).unwrap();
        let report = g.step().unwrap();
        assert_eq!(report.executed, vec![a, b, c]);
        assert_eq!(report.errors, 0);
        assert_eq!(value(&g, c), 3.0);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut g = graph();
        g.create_node_by_type_name("Test/Constant", "A").unwrap();
        let err = g.create_node_by_type_name("Test/Increment", "A").unwrap_err();
        assert_eq!(err, PipelineError::DuplicateName("A".to_string()));
        assert_eq!(g.node_count(), 1);
    }

    #[test]
    fn test_unknown_type_rejected() {
        let mut g = graph();
        assert!(g.create_node(NodeTypeId(200), "X").is_err());
        assert!(g.create_node(NodeTypeId::INVALID, "X").is_err());
        assert!(g.create_node_by_type_name("Nope", "X").is_err());
        assert_eq!(g.node_count(), 0);
    }

    #[test]
    fn test_remove_strips_links_and_recycles_id() {
        let mut g = graph();
        let a = g.create_node_by_type_name("Test/Constant", "A").unwrap();
        let b = g.create_node_by_type_name("Test/Increment", "B").unwrap();
        g.link_nodes(out(a, 0), inp(b, 0)).unwrap();
        g.step().unwrap();

        g.remove_node(a).unwrap();
        assert_eq!(g.link_count(), 0);
        assert_eq!(g.node_count(), 1);
        assert!(g.is_tagged(b));
        assert_eq!(g.resolve_node("A"), NodeId::INVALID);
        assert!(g.remove_node(a).is_err());

        let c = g.create_node_by_type_name("Test/Constant", "C").unwrap();
        assert_eq!(c, a);
        assert!(!g.is_input_connected(inp(b, 0)));
    }

    #[test]
    fn test_link_validation() {
        let mut g = graph();
        let a = g.create_node_by_type_name("Test/Constant", "A").unwrap();
        let b = g.create_node_by_type_name("Test/Increment", "B").unwrap();

        assert!(matches!(
            g.link_nodes(out(a, 0), out(b, 0)),
            Err(PipelineError::LinkDirection { .. })
        ));
        assert_eq!(
            g.link_nodes(out(a, 1), inp(b, 0)),
            Err(PipelineError::SocketOutOfRange(out(a, 1)))
        );
        assert_eq!(
            g.link_nodes(out(a, 0), inp(NodeId(9), 0)),
            Err(PipelineError::InvalidNode(NodeId(9)))
        );
        assert_eq!(g.link_count(), 0);

        // Reversed pair is corrected.
        g.link_nodes(inp(b, 0), out(a, 0)).unwrap();
        assert_eq!(g.connected_from(inp(b, 0)), Some(out(a, 0)));
        assert!(g.is_output_connected(out(a, 0)));
        assert_eq!(g.connected_from(out(a, 0)), None);

        // One producer per input.
        assert_eq!(
            g.link_nodes(out(a, 0), inp(b, 0)),
            Err(PipelineError::InputAlreadyConnected(inp(b, 0)))
        );
        assert_eq!(g.link_count(), 1);
    }

    #[test]
    fn test_unlink_then_link_restores_links() {
        let mut g = graph();
        let a = g.create_node_by_type_name("Test/Constant", "A").unwrap();
        let b = g.create_node_by_type_name("Test/Constant", "B").unwrap();
        let s = g.create_node_by_type_name("Test/Sink", "S").unwrap();
        g.link_nodes(out(a, 0), inp(s, 0)).unwrap();
        g.link_nodes(out(b, 0), inp(s, 1)).unwrap();
        let before: Vec<Link> = g.links().copied().collect();

        g.unlink_nodes(out(b, 0), inp(s, 1)).unwrap();
        assert_eq!(g.link_count(), 1);
        assert!(matches!(
            g.unlink_nodes(out(b, 0), inp(s, 1)),
            Err(PipelineError::LinkNotFound { .. })
        ));
        g.link_nodes(out(b, 0), inp(s, 1)).unwrap();

        let mut after: Vec<Link> = g.links().copied().collect();
        let mut before = before;
        before.sort();
        after.sort();
        assert_eq!(before, after);
    }

    #[test]
    fn test_error_status_does_not_abort_pass() {
        let mut g = graph();
        let a = g.create_node_by_type_name("Test/Constant", "A").unwrap();
        let s = g.create_node_by_type_name("Test/Sink", "S").unwrap();
        let c = g.create_node_by_type_name("Test/Constant", "C").unwrap();
        g.link_nodes(out(a, 0), inp(s, 0)).unwrap();

        let report = g.step().unwrap();
        assert_eq!(report.errors, 1);
        assert_eq!(report.executed.len(), 3);
        assert!(g.last_status(s).unwrap().is_error());
        assert_eq!(g.last_status(c).unwrap().status, Status::Ok);
    }

    #[test]
    fn test_property_edit_tags_node() {
        let mut g = graph();
        let a = g.create_node_by_type_name("Test/Constant", "A").unwrap();
        g.step().unwrap();

        assert!(g
            .set_node_property(a, PropertyId(0), PropertyValue::Double(500.0))
            .is_err());
        assert!(!g.is_tagged(a));
        assert_eq!(g.node_property(a, PropertyId(0)), Ok(PropertyValue::Double(1.0)));

        g.set_node_property(a, PropertyId(0), PropertyValue::Double(7.0)).unwrap();
        assert!(g.is_tagged(a));
        g.step().unwrap();
        assert_eq!(value(&g, a), 7.0);
    }

    #[test]
    fn test_self_tag_and_auto_tag() {
        let mut g = graph();
        let t = g.create_node_by_type_name("Test/Ticker", "T").unwrap();
        let q = g.create_node_by_type_name("Test/AsksAgain", "Q").unwrap();
        assert!(!g.is_stateless());

        g.step().unwrap();
        assert!(g.is_tagged(t));
        assert!(g.is_tagged(q));
        // Self-tagged nodes are re-tagged before auto-tag nodes.
        let report = g.step().unwrap();
        assert_eq!(report.executed, vec![q, t]);
    }

    #[test]
    fn test_failed_restart_skips_node() {
        let mut g = graph();
        let n = g.create_node_by_type_name("Test/NoRestart", "N").unwrap();
        let report = g.step().unwrap();
        assert_eq!(report.errors, 1);
        assert_eq!(g.last_status(n).unwrap().message, "restart failed");
        assert!(g.get_node(n).unwrap().needs_restart());
    }

    #[test]
    fn test_restart_nodes_marks_pending() {
        let mut g = graph();
        let t = g.create_node_by_type_name("Test/Ticker", "T").unwrap();
        let a = g.create_node_by_type_name("Test/Constant", "A").unwrap();
        g.step().unwrap();
        assert!(!g.get_node(a).unwrap().needs_restart());

        g.restart_nodes();
        assert!(g.get_node(a).unwrap().needs_restart());
        assert!(g.is_tagged(t));
    }

    #[test]
    fn test_cycle_rejected_and_tags_kept() {
        let mut g = graph();
        let a = g.create_node_by_type_name("Test/Increment", "A").unwrap();
        let b = g.create_node_by_type_name("Test/Increment", "B").unwrap();
        g.link_nodes(out(a, 0), inp(b, 0)).unwrap();
        g.link_nodes(out(b, 0), inp(a, 0)).unwrap();

        assert!(matches!(g.step(), Err(PipelineError::CycleDetected { .. })));
        assert!(g.is_tagged(a));
        assert!(g.last_status(a).is_none());

        g.unlink_nodes(out(b, 0), inp(a, 0)).unwrap();
        let report = g.step().unwrap();
        assert_eq!(report.executed, vec![a, b]);
    }

    #[test]
    fn test_prepare_list_is_stable() {
        let mut g = graph();
        let a = g.create_node_by_type_name("Test/Constant", "A").unwrap();
        let b = g.create_node_by_type_name("Test/Increment", "B").unwrap();
        g.link_nodes(out(a, 0), inp(b, 0)).unwrap();

        let first = g.prepare_list().unwrap().to_vec();
        let second = g.prepare_list().unwrap().to_vec();
        assert_eq!(first, second);
        assert_eq!(first, vec![a, b]);
    }

    #[test]
    fn test_socket_queries() {
        let mut g = graph();
        let a = g.create_node_by_type_name("Test/Constant", "A").unwrap();
        let b = g.create_node_by_type_name("Test/Increment", "B").unwrap();

        // Unconnected input reads an empty payload of its declared type.
        let empty = g.input_socket(b, SocketId(0)).unwrap();
        assert!(empty.is_empty());
        assert!(g.input_socket(b, SocketId(3)).is_err());
        assert!(g.output_socket(a, SocketId(1)).is_err());

        g.link_nodes(out(a, 0), inp(b, 0)).unwrap();
        g.step().unwrap();
        let seen = g.input_socket(b, SocketId(0)).unwrap().as_array().unwrap();
        assert_eq!(seen.data, vec![1.0]);
    }

    #[test]
    fn test_names_and_types() {
        let mut g = graph();
        let a = g.create_node_by_type_name("Test/Constant", "A").unwrap();
        let b = g.create_node_by_type_name("Test/Constant", "B").unwrap();

        assert_eq!(g.set_node_name(a, "B"), Err(PipelineError::DuplicateName("B".into())));
        g.set_node_name(a, "First").unwrap();
        assert_eq!(g.node_name(a), Some("First"));
        assert_eq!(g.resolve_node("First"), a);
        assert_eq!(g.resolve_node("A"), NodeId::INVALID);

        assert_eq!(g.node_type_name(b), Some("Test/Constant"));
        assert_eq!(g.node_type_id(NodeId(50)), NodeTypeId::INVALID);
        assert_eq!(g.node_config(b).unwrap().outputs.len(), 1);

        g.remove_node_by_name("First").unwrap();
        assert_eq!(
            g.remove_node_by_name("First"),
            Err(PipelineError::UnknownName("First".into()))
        );
        let live: Vec<NodeId> = g.nodes().map(|(id, _)| id).collect();
        assert_eq!(live, vec![b]);
    }

    #[test]
    fn test_socket_count_limited_by_id_width() {
        let mut g = graph();
        let too_wide = g.registry().type_id("Test/Wide256");
        assert_eq!(
            g.create_node(too_wide, "W"),
            Err(PipelineError::SchemaTooLarge(too_wide))
        );
        assert_eq!(g.node_count(), 0);

        let a = g.create_node_by_type_name("Test/Constant", "A").unwrap();
        let w = g.create_node_by_type_name("Test/Wide255", "W").unwrap();
        g.link_nodes(out(a, 0), inp(w, 254)).unwrap();
        assert_eq!(
            g.link_nodes(out(a, 0), SocketAddress::new(w, SocketId::INVALID, false)),
            Err(PipelineError::SocketOutOfRange(SocketAddress::new(
                w,
                SocketId::INVALID,
                false
            )))
        );
        let report = g.step().unwrap();
        assert_eq!(report.executed, vec![a, w]);
        assert!(!g.is_input_connected(inp(w, 0)));
    }

    #[test]
    fn test_module_gating() {
        let mut reg = registry();
        let mut g = Graph::new(Arc::new(registry()));
        assert_eq!(
            g.create_node_by_type_name("Test/NeedsDevice", "D"),
            Err(PipelineError::ModuleUnavailable("device".into()))
        );

        let mut module = MockNodeModule::new();
        module.expect_module_name().return_const("device".to_string());
        module.expect_ensure_initialized().times(1).return_const(true);
        let module: Arc<dyn NodeModule> = Arc::new(module);
        assert!(reg.register_module(module));

        g = Graph::new(Arc::new(reg));
        g.create_node_by_type_name("Test/NeedsDevice", "D").unwrap();
    }

    #[test]
    fn test_module_that_fails_to_initialize() {
        let mut reg = registry();
        let mut module = MockNodeModule::new();
        module.expect_module_name().return_const("device".to_string());
        module.expect_ensure_initialized().return_const(false);
        reg.register_module(Arc::new(module));

        let mut g = Graph::new(Arc::new(reg));
        assert!(g.create_node_by_type_name("Test/NeedsDevice", "D").is_err());
        assert_eq!(g.node_count(), 0);
    }

    #[test]
    fn test_clear() {
        let mut g = graph();
        let a = g.create_node_by_type_name("Test/Constant", "A").unwrap();
        let b = g.create_node_by_type_name("Test/Increment", "B").unwrap();
        g.link_nodes(out(a, 0), inp(b, 0)).unwrap();
        g.clear();
        assert_eq!(g.node_count(), 0);
        assert_eq!(g.link_count(), 0);
        assert!(g.tagged().is_empty());
        assert!(g.step().unwrap().executed.is_empty());
    }
}
