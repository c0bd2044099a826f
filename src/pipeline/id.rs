//! Identity types for the pipeline graph.
//!
//! All IDs are small integer newtypes. `NodeId` is a direct index into the
//! graph's node arena, `NodeTypeId` an index into the registry table, and
//! `SocketId`/`PropertyId` are positions within a single node's schema.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Index into `Graph::slots`. Recycled after the node is removed.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    pub const INVALID: NodeId = NodeId(u32::MAX);

    #[inline]
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "NodeId(INVALID)")
        } else {
            write!(f, "NodeId({})", self.0)
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Position of a socket within a node's input or output list.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SocketId(pub u8);

impl SocketId {
    pub const INVALID: SocketId = SocketId(u8::MAX);

    /// `None` when `index` does not fit below the sentinel.
    pub fn from_index(index: usize) -> Option<Self> {
        u8::try_from(index).ok().map(SocketId).filter(|id| id.is_valid())
    }

    #[inline]
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for SocketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "SocketId(INVALID)")
        } else {
            write!(f, "SocketId({})", self.0)
        }
    }
}

/// Index into the `NodeTypeRegistry` table. Id 0 is the reserved invalid type.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeTypeId(pub u16);

impl NodeTypeId {
    pub const INVALID: NodeTypeId = NodeTypeId(0);

    #[inline]
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl Default for NodeTypeId {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Debug for NodeTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "NodeTypeId(INVALID)")
        } else {
            write!(f, "NodeTypeId({})", self.0)
        }
    }
}

/// Position of a property within a node's property list.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PropertyId(pub u8);

impl PropertyId {
    pub const INVALID: PropertyId = PropertyId(u8::MAX);

    pub fn from_index(index: usize) -> Option<Self> {
        u8::try_from(index)
            .ok()
            .map(PropertyId)
            .filter(|&id| id != Self::INVALID)
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PropertyId({})", self.0)
    }
}

/// Address of one socket on one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SocketAddress {
    pub node: NodeId,
    pub socket: SocketId,
    pub is_output: bool,
}

impl SocketAddress {
    pub const INVALID: SocketAddress = SocketAddress {
        node: NodeId::INVALID,
        socket: SocketId::INVALID,
        is_output: false,
    };

    pub const fn new(node: NodeId, socket: SocketId, is_output: bool) -> Self {
        Self {
            node,
            socket,
            is_output,
        }
    }

    pub const fn output(node: NodeId, socket: u8) -> Self {
        Self::new(node, SocketId(socket), true)
    }

    pub const fn input(node: NodeId, socket: u8) -> Self {
        Self::new(node, SocketId(socket), false)
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.node.is_valid() && self.socket.is_valid()
    }
}
