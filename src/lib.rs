//! Replicated Key-Value Store Library
//!
//! Every node runs one sequential data node that places keys on a hash ring, forwards
//! requests it does not own, and keeps `r` replica copies on the owner's successors.
//! The binary (`main.rs`) wires a node to the HTTP substrate and the gossip feed.
//!
//! ## Architecture Modules
//! - **`ring`**: Ring keys, the sorted node view, key positions and successor walks.
//! - **`storage`**: Versioned maps holding primary and replica copies.
//! - **`postoffice`**: The outbound throttle; a per-interval send budget plus the deferred archive.
//! - **`node`**: The command protocol and the data node state machine (GET, PUT, rebalance).
//! - **`transport`**: The `Postman` seam with an in-process and an HTTP implementation.
//! - **`membership`**: UDP gossip (SWIM-like) producing the live node set.
//! - **`config`**: Node tunables.

pub mod config;
pub mod membership;
pub mod node;
pub mod postoffice;
pub mod ring;
pub mod storage;
pub mod transport;
