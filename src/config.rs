//! Node configuration.
//!
//! Runtime knobs shared by every node of a cluster. The replication factor must be
//! the same everywhere: successor indices carried in messages are only meaningful
//! against the same `replicas` value.

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_REPLICAS: usize = 2;
pub const DEFAULT_MESSAGE_RATE: usize = 5;
pub const DEFAULT_REFILL_INTERVAL: Duration = Duration::from_millis(1000);

/// Which local map answers a read addressed to this node as a replica holder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReadSource {
    /// The replica map, which is where successor copies are written.
    #[default]
    ReplicaStore,
    /// The primary map, as older deployments did. Replica-routed reads then miss.
    PrimaryStore,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Copies kept besides the owner's (`r`).
    pub replicas: usize,
    /// Letters released per refill tick.
    pub message_rate: usize,
    pub refill_interval: Duration,
    pub replica_reads: ReadSource,
}

impl NodeConfig {
    pub fn new(replicas: usize) -> Self {
        Self {
            replicas,
            ..Self::default()
        }
    }

    pub fn with_message_rate(mut self, message_rate: usize) -> Self {
        self.message_rate = message_rate;
        self
    }

    pub fn with_refill_interval(mut self, refill_interval: Duration) -> Self {
        self.refill_interval = refill_interval;
        self
    }

    pub fn with_replica_reads(mut self, replica_reads: ReadSource) -> Self {
        self.replica_reads = replica_reads;
        self
    }

    /// Smallest cluster able to hold every copy.
    pub fn min_cluster_size(&self) -> usize {
        self.replicas + 1
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            replicas: DEFAULT_REPLICAS,
            message_rate: DEFAULT_MESSAGE_RATE,
            refill_interval: DEFAULT_REFILL_INTERVAL,
            replica_reads: ReadSource::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = NodeConfig::default();
        assert_eq!(config.replicas, 2);
        assert_eq!(config.message_rate, 5);
        assert_eq!(config.refill_interval, Duration::from_secs(1));
        assert_eq!(config.replica_reads, ReadSource::ReplicaStore);
        assert_eq!(config.min_cluster_size(), 3);
    }

    #[test]
    fn test_builders() {
        let config = NodeConfig::new(1)
            .with_message_rate(50)
            .with_replica_reads(ReadSource::PrimaryStore);
        assert_eq!(config.replicas, 1);
        assert_eq!(config.message_rate, 50);
        assert_eq!(config.replica_reads, ReadSource::PrimaryStore);
    }
}
