//! Node type registry: name <-> `NodeTypeId` table with one factory per type.
//!
//! Id 0 is reserved for the invalid type and never has a factory. Built-in
//! types are merged in by an explicit startup function (see
//! `nodes::register_builtin_types`) rather than by static initializers, so the
//! table contents never depend on link order.

use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::id::NodeTypeId;
use crate::pipeline::node_type::NodeType;
use serde::Serialize;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

/// Name of the reserved type at id 0.
pub const INVALID_TYPE_NAME: &str = "InvalidType";

/// Produces fresh `NodeType` instances.
pub trait NodeFactory: Send + Sync {
    fn create(&self) -> Option<Box<dyn NodeType>>;
}

impl<F> NodeFactory for F
where
    F: Fn() -> Option<Box<dyn NodeType>> + Send + Sync,
{
    fn create(&self) -> Option<Box<dyn NodeType>> {
        self()
    }
}

/// Factory for node types constructible through `Default`.
pub struct DefaultNodeFactory<T>(PhantomData<fn() -> T>);

impl<T> DefaultNodeFactory<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for DefaultNodeFactory<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: NodeType + Default + 'static> NodeFactory for DefaultNodeFactory<T> {
    fn create(&self) -> Option<Box<dyn NodeType>> {
        Some(Box::new(T::default()))
    }
}

/// External resource provider that some node types depend on (e.g. a GPU
/// context with a kernel cache). Looked up by the name in `NodeConfig::module`.
#[cfg_attr(test, mockall::automock)]
pub trait NodeModule: Send + Sync {
    fn module_name(&self) -> String;

    /// Lazily bring the module up. Returns false if it cannot be used.
    fn ensure_initialized(&self) -> bool;
}

/// Entry point that registers one group of node types.
pub type RegistrationFn = fn(&mut NodeTypeRegistry);

struct RegistryEntry {
    name: String,
    factory: Option<Box<dyn NodeFactory>>,
}

/// One row of the registry catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeTypeInfo {
    pub type_id: NodeTypeId,
    pub type_name: String,
}

pub struct NodeTypeRegistry {
    entries: Vec<RegistryEntry>,
    by_name: HashMap<String, NodeTypeId>,
    modules: HashMap<String, Arc<dyn NodeModule>>,
}

impl NodeTypeRegistry {
    /// Registry with the reserved invalid type only.
    pub fn empty() -> Self {
        let mut by_name = HashMap::new();
        by_name.insert(INVALID_TYPE_NAME.to_string(), NodeTypeId::INVALID);
        Self {
            entries: vec![RegistryEntry {
                name: INVALID_TYPE_NAME.to_string(),
                factory: None,
            }],
            by_name,
            modules: HashMap::new(),
        }
    }

    /// Registry with every built-in node type.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        crate::pipeline::nodes::register_builtin_types(&mut registry);
        registry
    }

    /// Run each registration entry point in order.
    pub fn register_all(&mut self, entries: &[RegistrationFn]) {
        for register in entries {
            register(self);
        }
    }

    /// Register `factory` under `name`.
    ///
    /// A name that is already present keeps its id and has its factory
    /// replaced.
    pub fn register(&mut self, name: &str, factory: impl NodeFactory + 'static) -> NodeTypeId {
        if let Some(&id) = self.by_name.get(name) {
            if id.is_valid() {
                tracing::warn!("Node type '{}' re-registered, overriding factory", name);
                self.entries[id.index()].factory = Some(Box::new(factory));
                return id;
            }
            tracing::warn!("Refusing to register over reserved type '{}'", name);
            return NodeTypeId::INVALID;
        }

        let id = NodeTypeId(self.entries.len() as u16);
        self.entries.push(RegistryEntry {
            name: name.to_string(),
            factory: Some(Box::new(factory)),
        });
        self.by_name.insert(name.to_string(), id);
        tracing::info!("Registered node type '{}' as {:?}", name, id);
        id
    }

    /// Shorthand for types constructible through `Default`.
    pub fn register_default<T: NodeType + Default + 'static>(&mut self, name: &str) -> NodeTypeId {
        self.register(name, DefaultNodeFactory::<T>::new())
    }

    pub fn create(&self, type_id: NodeTypeId) -> PipelineResult<Box<dyn NodeType>> {
        let entry = self
            .entries
            .get(type_id.index())
            .ok_or(PipelineError::UnknownNodeType(type_id))?;
        let factory = entry
            .factory
            .as_ref()
            .ok_or(PipelineError::UnknownNodeType(type_id))?;
        factory.create().ok_or(PipelineError::FactoryFailed(type_id))
    }

    pub fn type_name(&self, type_id: NodeTypeId) -> Option<&str> {
        self.entries.get(type_id.index()).map(|e| e.name.as_str())
    }

    /// `NodeTypeId::INVALID` when the name is unknown.
    pub fn type_id(&self, name: &str) -> NodeTypeId {
        self.by_name.get(name).copied().unwrap_or(NodeTypeId::INVALID)
    }

    /// Number of registered types, excluding the reserved one.
    pub fn len(&self) -> usize {
        self.entries.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered types in id order, skipping the reserved id.
    pub fn iter(&self) -> impl Iterator<Item = NodeTypeInfo> + '_ {
        self.entries
            .iter()
            .enumerate()
            .skip(1)
            .map(|(i, e)| NodeTypeInfo {
                type_id: NodeTypeId(i as u16),
                type_name: e.name.clone(),
            })
    }

    /// Description taken from a throwaway instance's configuration.
    pub fn description(&self, type_id: NodeTypeId) -> Option<String> {
        self.create(type_id)
            .ok()
            .map(|node| node.configuration().description)
    }

    /// Last path component of the type name, e.g. `"Box filter"` for
    /// `"Filters/Box filter"`.
    pub fn default_node_name(&self, type_id: NodeTypeId) -> Option<&str> {
        self.type_name(type_id)
            .map(|name| name.rsplit('/').next().unwrap_or(name))
    }

    /// Make a module available to node types that declare it.
    ///
    /// Returns false if a module with the same name is already registered.
    pub fn register_module(&mut self, module: Arc<dyn NodeModule>) -> bool {
        let name = module.module_name();
        if self.modules.contains_key(&name) {
            tracing::warn!("Node module '{}' already registered", name);
            return false;
        }
        tracing::info!("Registered node module '{}'", name);
        self.modules.insert(name, module);
        true
    }

    pub fn module(&self, name: &str) -> Option<Arc<dyn NodeModule>> {
        self.modules.get(name).cloned()
    }
}

impl Default for NodeTypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
