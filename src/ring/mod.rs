//! Ring Topology Module
//!
//! Positions every known node on a hash ring and answers the two questions the
//! rest of the node asks about a key: who owns it, and who holds its replicas.
//!
//! ## Core Concepts
//! - **Ring key**: hex digest of a node's `address:port`. Sorting by ring key gives each
//!   node its ordinal position.
//! - **Owner**: the node at `hash(key) mod |nodes|`.
//! - **Successors**: the next `r` distinct nodes after the owner, wrapping around.
//!   Fewer than `r + 1` known nodes is reported as [`RingError::InsufficientClusterSize`].

pub mod topology;

pub use topology::{NodeInfo, Placement, Ring, RingError, RingKey, key_position};

#[cfg(test)]
mod tests;
