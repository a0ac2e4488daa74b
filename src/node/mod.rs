//! Data Node Module
//!
//! The replicated store itself: one sequential message processor per node.
//!
//! ## Components
//! - **`protocol`**: handles and the closed `Command` sum type every node speaks.
//! - **`pending`**: node-local tickets and the table of operations awaiting answers.
//! - **`data_node`**: node state, dispatch, the run loop and the refill ticker.
//! - **`get`** / **`put`**: leader/replica request routing with redirection and
//!   version-based conflict resolution.
//! - **`rebalance`**: reaction to membership changes.
//!
//! ## Known limitations
//! Pending entries never time out, replays are not deduplicated, and reads are not
//! linearizable. Nothing is persisted.

pub mod data_node;
mod get;
pub mod pending;
pub mod protocol;
mod put;
mod rebalance;

pub use data_node::DataNode;
pub use protocol::{Command, Handle, Mailbox, Ticket};
