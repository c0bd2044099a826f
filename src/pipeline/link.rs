//! Directed links between an output socket and an input socket.

use crate::pipeline::id::{NodeId, SocketAddress, SocketId};
use serde::{Deserialize, Serialize};

/// A link from one node's output socket to another node's input socket.
///
/// Ordering is lexicographic over `(from_node, from_socket, to_node, to_socket)`,
/// which keeps every link leaving the same output socket contiguous once the
/// link list is sorted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Link {
    pub from_node: NodeId,
    pub from_socket: SocketId,
    pub to_node: NodeId,
    pub to_socket: SocketId,
}

impl Link {
    pub fn new(from_node: NodeId, from_socket: SocketId, to_node: NodeId, to_socket: SocketId) -> Self {
        Self {
            from_node,
            from_socket,
            to_node,
            to_socket,
        }
    }

    /// Build a link from an (output, input) address pair.
    pub fn from_addresses(from: SocketAddress, to: SocketAddress) -> Self {
        Self::new(from.node, from.socket, to.node, to.socket)
    }

    pub fn from_address(&self) -> SocketAddress {
        SocketAddress::new(self.from_node, self.from_socket, true)
    }

    pub fn to_address(&self) -> SocketAddress {
        SocketAddress::new(self.to_node, self.to_socket, false)
    }

    /// Whether either endpoint is `node`.
    #[inline]
    pub fn touches(&self, node: NodeId) -> bool {
        self.from_node == node || self.to_node == node
    }
}
