//! Value Storage Module
//!
//! In-memory key -> versioned value maps.
//!
//! ## Core Concepts
//! - **Versioning**: the owner of a key assigns `existing + 1` (or `0`) to a value the first
//!   time it commits it; replicas keep whatever version the owner chose.
//! - **Stale writes**: a write whose version does not exceed the stored one is reported as
//!   [`WriteOutcome::Stale`] and leaves the map untouched. Ties keep the existing value.
//! - **No persistence**: everything lives in memory and is rebuilt from replication traffic.

pub mod versioned;

pub use versioned::{Value, VersionedStore, WriteOutcome};

#[cfg(test)]
mod tests;
