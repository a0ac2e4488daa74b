//! HTTP Protocol
//!
//! Endpoints and Data Transfer Objects (DTOs) for the HTTP substrate: the internal
//! envelope nodes exchange, and the small JSON surface clients use.

use crate::node::protocol::{Command, Handle};
use crate::ring::NodeInfo;
use serde::{Deserialize, Serialize};

// --- API Endpoints ---

/// Inter-node delivery of a single [`Command`].
pub const ENDPOINT_MESSAGE: &str = "/internal/message";
/// Public endpoint for client writes.
pub const ENDPOINT_PUT: &str = "/put";
/// Public endpoint for client reads (`/get/:key`).
pub const ENDPOINT_GET: &str = "/get";
/// Everything this node stores, primary copies first.
pub const ENDPOINT_DEBUG_LOCAL: &str = "/debug/local";
/// This node's ring view.
pub const ENDPOINT_DEBUG_NODES: &str = "/debug/nodes";

// --- Data Transfer Objects ---

/// A command in transit, addressed to a node inbox or a client slot at `to.addr`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub to: Handle,
    pub command: Command,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClientPutRequest {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClientPutResponse {
    /// True once every replica acknowledged, or the write was already superseded.
    pub success: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClientGetResponse {
    pub key: String,
    pub value: Option<String>,
    pub found: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LocalDataResponse {
    pub values: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NodesResponse {
    pub nodes: Vec<NodeInfo>,
}
