//! Membership & Discovery Module
//!
//! Gossip-based membership protocol (inspired by SWIM) that tells each data node who
//! else is in the cluster. Members advertise the HTTP address their data node serves
//! on; the service turns the alive member set into data node handles and publishes it
//! on a watch channel, which the binary forwards to the node as `NodesUpdate`.
//!
//! ## Core Mechanisms
//! - **Gossip Protocol**: Nodes periodically ping a random peer over UDP; acks carry the member list.
//! - **Failure Detection**: "Suspect" after 5 s of silence, "Dead" after 10 s.
//! - **Incarnation Numbers**: Order conflicting Alive/Suspect claims; a suspected node refutes by bumping its own.

pub mod service;
pub mod types;

pub use service::MembershipService;
