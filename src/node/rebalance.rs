//! Membership changes.
//!
//! Every feed event rebuilds the ring from scratch, replays operations that were
//! waiting for a bigger cluster, and pushes every locally held key to its owner and
//! successors under the new view. Receivers drop copies they already have through
//! the version check, so the whole-keyspace push is safe to repeat.

use super::data_node::DataNode;
use super::protocol::{Command, NodesUpdate, Put};
use crate::storage::Value;
use std::collections::BTreeMap;

impl DataNode {
    pub(super) fn on_nodes_update(&mut self, message: NodesUpdate) {
        tracing::info!("The cluster has changed");
        self.ring.rebuild(message.nodes);
        tracing::info!(
            "Ring now holds {} node(s), {} at position {}",
            self.ring.len(),
            self.me,
            self.ring.self_position()
        );

        if !self.ring.can_replicate(self.config.replicas) {
            tracing::warn!(
                "Cluster has {} node(s), {} needed; keeping {} local key(s) in place",
                self.ring.len(),
                self.config.min_cluster_size(),
                self.primary.len() + self.replicas.len()
            );
            return;
        }

        self.replay_deferred();
        self.redistribute();
    }

    /// Resubmits archived operations to this node's own inbox.
    fn replay_deferred(&mut self) {
        let deferred = self.post_office.take_deferred();
        if deferred.is_empty() {
            return;
        }
        tracing::info!("Replaying {} deferred operation(s)", deferred.len());
        for command in deferred {
            self.postman.deliver(&self.me, command);
        }
    }

    fn redistribute(&mut self) {
        let replicas = self.config.replicas;
        let merged = self.merge_local_data();
        let total = merged.len();

        for (key, value) in merged {
            let placement = match self.ring.placement(&key, replicas) {
                Ok(placement) => placement,
                Err(reason) => {
                    tracing::warn!("Keeping '{}' as owner copy: {}", key, reason);
                    self.primary.insert(key, value);
                    continue;
                }
            };
            // Acks for these writes come back under a ticket nobody waits on.
            let ticket = self.pending.next_ticket();

            if self.is_owner(&placement) {
                tracing::info!(
                    "Keeping a leader version of '{}' -> '{}' due to new topology",
                    key,
                    value.payload
                );
                self.primary.insert(key.clone(), value.clone());
            } else {
                tracing::debug!(
                    "Sending '{}' to its new leader {}",
                    key,
                    placement.owner.handle
                );
                let put = Put {
                    key: key.clone(),
                    value: value.clone(),
                    reply_to: self.me.clone(),
                    is_replica: false,
                    ticket,
                    successor_index: replicas,
                };
                self.send(placement.owner.handle.clone(), Command::Put(put));
            }

            if placement.holds_replica(&self.me) {
                self.replicas.insert(key.clone(), value.clone());
            }

            for (index, successor) in placement.successors.iter().enumerate() {
                let put = Put {
                    key: key.clone(),
                    value: value.clone(),
                    reply_to: self.me.clone(),
                    is_replica: true,
                    ticket,
                    successor_index: index,
                };
                self.send(successor.handle.clone(), Command::Put(put));
            }
        }

        tracing::info!(
            "Redistributed {} key(s): {} leader, {} replica kept locally",
            total,
            self.primary.len(),
            self.replicas.len()
        );
    }

    /// Empties both maps into one keyspace, keeping the newer copy of a key held twice.
    fn merge_local_data(&mut self) -> BTreeMap<String, Value> {
        let mut merged: BTreeMap<String, Value> = self.primary.drain().collect();
        for (key, value) in self.replicas.drain() {
            match merged.get(&key) {
                Some(existing) if existing.version >= value.version => {}
                _ => {
                    merged.insert(key, value);
                }
            }
        }
        merged
    }
}
