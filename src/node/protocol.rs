//! Node Message Protocol
//!
//! Every message a data node can receive, as one closed sum type. Client requests,
//! internal routing messages, answers, membership events and timer ticks all arrive
//! through the same inbox and are handled one at a time.
//!
//! Messages are serde-serializable so the HTTP substrate can carry them as JSON.

use crate::ring::NodeInfo;
use crate::storage::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Node-local correlation id for an in-flight operation.
///
/// Only ever matched against the issuing node's own pending table.
pub type Ticket = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Mailbox {
    /// A data node's inbox.
    Node,
    /// A one-shot reply slot owned by the node at the same address.
    Client(u64),
}

/// Opaque address of something that can receive a [`Command`].
///
/// Two handles for data nodes are equal iff their `address:port` identities match.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Handle {
    pub addr: String,
    pub mailbox: Mailbox,
}

impl Handle {
    pub fn node(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            mailbox: Mailbox::Node,
        }
    }

    pub fn client(addr: impl Into<String>, slot: u64) -> Self {
        Self {
            addr: addr.into(),
            mailbox: Mailbox::Client(slot),
        }
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mailbox {
            Mailbox::Node => write!(f, "{}", self.addr),
            Mailbox::Client(slot) => write!(f, "{}#{}", self.addr, slot),
        }
    }
}

/// Client read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetRequest {
    pub key: String,
    pub reply_to: Handle,
}

/// Internal read addressed to the owner (`successor_index == replicas`) or to one successor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Get {
    pub key: String,
    pub reply_to: Handle,
    pub ticket: Ticket,
    pub successor_index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetAnswer {
    pub key: String,
    pub value: Option<String>,
    pub found: bool,
    pub ticket: Ticket,
}

/// Client write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PutRequest {
    pub key: String,
    pub value: Value,
    pub reply_to: Handle,
}

/// Internal write: either an owner commit (`is_replica == false`) or a replica copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Put {
    pub key: String,
    pub value: Value,
    pub reply_to: Handle,
    pub is_replica: bool,
    pub ticket: Ticket,
    pub successor_index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PutAnswer {
    pub success: bool,
    pub ticket: Ticket,
}

/// The full set of live peers reported by the membership feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodesUpdate {
    pub nodes: Vec<Handle>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetAllLocalRequest {
    pub reply_to: Handle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetAllLocalAnswer {
    pub values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetNodesRequest {
    pub reply_to: Handle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetNodesAnswer {
    pub nodes: Vec<NodeInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    GetRequest(GetRequest),
    Get(Get),
    GetAnswer(GetAnswer),
    PutRequest(PutRequest),
    Put(Put),
    PutAnswer(PutAnswer),
    NodesUpdate(NodesUpdate),
    /// Throttle refill tick.
    Timeout,
    GetAllLocalRequest(GetAllLocalRequest),
    GetAllLocalAnswer(GetAllLocalAnswer),
    GetNodesRequest(GetNodesRequest),
    GetNodesAnswer(GetNodesAnswer),
}

impl Command {
    pub fn kind(&self) -> &'static str {
        match self {
            Command::GetRequest(_) => "GetRequest",
            Command::Get(_) => "Get",
            Command::GetAnswer(_) => "GetAnswer",
            Command::PutRequest(_) => "PutRequest",
            Command::Put(_) => "Put",
            Command::PutAnswer(_) => "PutAnswer",
            Command::NodesUpdate(_) => "NodesUpdate",
            Command::Timeout => "Timeout",
            Command::GetAllLocalRequest(_) => "GetAllLocalRequest",
            Command::GetAllLocalAnswer(_) => "GetAllLocalAnswer",
            Command::GetNodesRequest(_) => "GetNodesRequest",
            Command::GetNodesAnswer(_) => "GetNodesAnswer",
        }
    }
}
