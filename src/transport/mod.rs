//! Message Transport Module
//!
//! The substrate nodes use to reach each other. Delivery is fire-and-forget:
//! asynchronous, unordered and at-most-once, with no confirmation. Everything
//! above it (redirects, version checks, deferral) lives in the node.
//!
//! ## Implementations
//! - **`local`**: an in-process directory of tokio mailboxes, for clusters running inside
//!   one runtime.
//! - **`http`**: JSON envelopes POSTed between nodes, plus the client-facing endpoints.

pub mod handlers;
pub mod http;
pub mod local;
pub mod protocol;

use crate::node::protocol::{Command, Handle};

/// Capability to enqueue a [`Command`] at a [`Handle`].
pub trait Postman: Send + Sync {
    fn deliver(&self, to: &Handle, command: Command);
}

#[cfg(test)]
mod tests;
