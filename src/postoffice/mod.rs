//! Outbound Throttle Module
//!
//! A leaky-bucket valve in front of the transport. A periodic tick resets the send
//! budget and drains queued letters; anything sent while the budget is exhausted
//! waits in FIFO order.
//!
//! The same component keeps the operations a node had to set aside because the
//! cluster was too small to replicate, until a membership update lets them be replayed.

pub mod throttle;

pub use throttle::{Letter, PostOffice};
