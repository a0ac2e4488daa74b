use crate::node::protocol::Handle;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Instant;

/// Offset between a member's gossip port and its default HTTP port.
pub const HTTP_PORT_OFFSET: u16 = 1000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum NodeState {
    Alive,
    Suspect,
    Dead,
}

/// A single member of the cluster.
///
/// `gossip_addr` is where membership traffic goes; `http_addr` is the address data
/// nodes use as their ring identity. `incarnation` orders conflicting state claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub gossip_addr: SocketAddr,
    pub http_addr: SocketAddr,
    pub state: NodeState,
    pub incarnation: u64,

    #[serde(skip)]
    pub last_seen: Option<Instant>,
}

impl Node {
    /// The data node handle this member serves under.
    pub fn handle(&self) -> Handle {
        Handle::node(self.http_addr.to_string())
    }
}

/// HTTP address a node binds when none is given: same host, gossip port + 1000.
pub fn default_http_addr(gossip_addr: SocketAddr) -> SocketAddr {
    let mut http_addr = gossip_addr;
    http_addr.set_port(gossip_addr.port().wrapping_add(HTTP_PORT_OFFSET));
    http_addr
}

/// Gossip wire protocol (bincode over UDP).
///
/// - `Ping/Ack`: liveness checks; the sender describes itself so the receiver can
///   learn its HTTP address, and acks carry the full member list.
/// - `Join`: sent by new nodes to seed nodes.
/// - `Suspect/Alive`: disseminate changes in member health.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum GossipMessage {
    Ping {
        from: Node,
    },

    Ack {
        from: Node,
        members: Vec<Node>,
    },

    Join {
        node: Node,
    },

    Suspect {
        node_id: NodeId,
        incarnation: u64,
    },

    Alive {
        node_id: NodeId,
        incarnation: u64,
    },
}
