//! Write path.
//!
//! The owner versions and stores the value, then fans a replica copy out to each of
//! its `r` successors and answers once all of them have acknowledged. Non-owners
//! forward to the owner. Every hop re-checks the topology and redirects if needed.

use super::data_node::DataNode;
use super::pending::{PendingRequest, Resolution};
use super::protocol::{Command, Handle, Put, PutAnswer, PutRequest, Ticket};
use crate::ring::NodeInfo;
use crate::storage::{Value, WriteOutcome};

impl DataNode {
    pub(super) fn on_put_request(&mut self, message: PutRequest) {
        let replicas = self.config.replicas;
        let placement = match self.ring.placement(&message.key, replicas) {
            Ok(placement) => placement,
            Err(reason) => {
                self.defer(Command::PutRequest(message), reason);
                return;
            }
        };

        let ticket = self.pending.next_ticket();

        if self.is_owner(&placement) {
            self.commit_as_owner(
                message.key,
                message.value,
                &placement.successors,
                message.reply_to,
                ticket,
                ticket,
            );
            return;
        }

        let put = Put {
            key: message.key,
            value: message.value,
            reply_to: self.me.clone(),
            is_replica: false,
            ticket,
            successor_index: replicas,
        };
        self.send(placement.owner.handle, Command::Put(put));
        self.pending
            .register(ticket, PendingRequest::new(1, message.reply_to, ticket));
    }

    pub(super) fn on_put(&mut self, message: Put) {
        let replicas = self.config.replicas;
        let placement = match self.ring.placement(&message.key, replicas) {
            Ok(placement) => placement,
            Err(reason) => {
                self.defer(Command::Put(message), reason);
                return;
            }
        };

        if message.is_replica {
            let Some(target) = placement.successors.get(message.successor_index) else {
                tracing::warn!(
                    "Dropping replica put for '{}': successor index {} out of range",
                    message.key,
                    message.successor_index
                );
                return;
            };
            if target.handle != self.me {
                tracing::info!(
                    "Redirecting put to true replica, current size {}",
                    self.ring.len()
                );
                let target = target.handle.clone();
                self.send(target, Command::Put(message));
                return;
            }
            self.commit_as_replica(message);
            return;
        }

        if !self.is_owner(&placement) {
            tracing::info!(
                "Redirecting put to true leader, current size {}",
                self.ring.len()
            );
            let put = Put {
                successor_index: replicas,
                ..message
            };
            self.send(placement.owner.handle, Command::Put(put));
            return;
        }

        let fan_out_ticket = self.pending.next_ticket();
        self.commit_as_owner(
            message.key,
            message.value,
            &placement.successors,
            message.reply_to,
            message.ticket,
            fan_out_ticket,
        );
    }

    pub(super) fn on_put_answer(&mut self, message: PutAnswer) {
        match self.pending.resolve(message.ticket) {
            Resolution::Complete(request) => {
                let answer = PutAnswer {
                    success: true,
                    ticket: request.reply_ticket,
                };
                self.send(request.requester, Command::PutAnswer(answer));
            }
            Resolution::Waiting(left) => {
                tracing::debug!("Ticket {} still waiting on {} ack(s)", message.ticket, left);
            }
            Resolution::Unknown => {
                tracing::debug!("Dropping put answer for unknown ticket {}", message.ticket);
            }
        }
    }

    /// Versions and stores `value` as its owner, then replicates it.
    ///
    /// `reply_ticket` is what `requester` expects back; `fan_out_ticket` correlates the
    /// replica acks in this node's own table.
    fn commit_as_owner(
        &mut self,
        key: String,
        mut value: Value,
        successors: &[NodeInfo],
        requester: Handle,
        reply_ticket: Ticket,
        fan_out_ticket: Ticket,
    ) {
        self.primary.assign_version(&key, &mut value);

        if self.primary.commit(&key, value.clone()) == WriteOutcome::Stale {
            tracing::debug!("Stale owner write for '{}' acknowledged without change", key);
            self.acknowledge(requester, reply_ticket);
            return;
        }
        tracing::info!(
            "Inserted a leader version of '{}' -> '{}' (version {:?})",
            key,
            value.payload,
            value.version
        );

        if successors.is_empty() {
            self.acknowledge(requester, reply_ticket);
            return;
        }

        for (index, successor) in successors.iter().enumerate() {
            let put = Put {
                key: key.clone(),
                value: value.clone(),
                reply_to: self.me.clone(),
                is_replica: true,
                ticket: fan_out_ticket,
                successor_index: index,
            };
            self.send(successor.handle.clone(), Command::Put(put));
        }
        self.pending.register(
            fan_out_ticket,
            PendingRequest::new(successors.len(), requester, reply_ticket),
        );
    }

    fn commit_as_replica(&mut self, message: Put) {
        match self.replicas.commit(&message.key, message.value.clone()) {
            WriteOutcome::Applied => tracing::info!(
                "Inserted a replica of '{}' -> '{}' (version {:?})",
                message.key,
                message.value.payload,
                message.value.version
            ),
            WriteOutcome::Stale => tracing::debug!(
                "Stale replica write for '{}' acknowledged without change",
                message.key
            ),
        }
        self.acknowledge(message.reply_to, message.ticket);
    }

    fn acknowledge(&mut self, requester: Handle, ticket: Ticket) {
        let answer = PutAnswer {
            success: true,
            ticket,
        };
        self.send(requester, Command::PutAnswer(answer));
    }
}
