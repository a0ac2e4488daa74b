//! Read path.
//!
//! A node that holds a copy answers straight away. Otherwise it picks one of the
//! `r + 1` holders at random and waits for a single answer under a fresh ticket.
//! The chosen holder re-checks the topology and redirects if it is no longer the
//! node that index refers to.

use super::data_node::DataNode;
use super::pending::{PendingRequest, Resolution};
use super::protocol::{Command, Get, GetAnswer, GetRequest};
use rand::Rng;

impl DataNode {
    pub(super) fn on_get_request(&mut self, message: GetRequest) {
        let replicas = self.config.replicas;
        let placement = match self.ring.placement(&message.key, replicas) {
            Ok(placement) => placement,
            Err(reason) => {
                self.defer(Command::GetRequest(message), reason);
                return;
            }
        };

        let ticket = self.pending.next_ticket();
        let is_owner = self.is_owner(&placement);

        if is_owner || placement.holds_replica(&self.me) {
            let answer = self.local_answer(&message.key, is_owner, ticket);
            self.send(message.reply_to, Command::GetAnswer(answer));
            return;
        }

        let choice = self.load_balancer.gen_range(0..=replicas);
        let destination = if choice == replicas {
            placement.owner.handle
        } else {
            placement.successors[choice].handle.clone()
        };
        tracing::debug!(
            "GET '{}': asking {} (index {}) under ticket {}",
            message.key,
            destination,
            choice,
            ticket
        );

        let get = Get {
            key: message.key,
            reply_to: self.me.clone(),
            ticket,
            successor_index: choice,
        };
        self.send(destination, Command::Get(get));
        self.pending
            .register(ticket, PendingRequest::new(1, message.reply_to, ticket));
    }

    pub(super) fn on_get(&mut self, message: Get) {
        let replicas = self.config.replicas;
        let placement = match self.ring.placement(&message.key, replicas) {
            Ok(placement) => placement,
            Err(reason) => {
                self.defer(Command::Get(message), reason);
                return;
            }
        };

        let is_owner = self.is_owner(&placement);

        if message.successor_index >= replicas {
            if !is_owner {
                tracing::info!(
                    "Redirecting get for '{}' to true leader, current size {}",
                    message.key,
                    self.ring.len()
                );
                self.send(placement.owner.handle, Command::Get(message));
                return;
            }
        } else {
            let target = &placement.successors[message.successor_index].handle;
            if target != &self.me {
                tracing::info!(
                    "Redirecting get for '{}' to true replica, current size {}",
                    message.key,
                    self.ring.len()
                );
                let target = target.clone();
                self.send(target, Command::Get(message));
                return;
            }
        }

        // Single hop: the answer goes to the coordinator, which owns the ticket.
        let answer = self.local_answer(&message.key, is_owner, message.ticket);
        self.send(message.reply_to, Command::GetAnswer(answer));
    }

    pub(super) fn on_get_answer(&mut self, message: GetAnswer) {
        match self.pending.resolve(message.ticket) {
            Resolution::Complete(request) => {
                let answer = GetAnswer {
                    ticket: request.reply_ticket,
                    ..message
                };
                self.send(request.requester, Command::GetAnswer(answer));
            }
            Resolution::Waiting(left) => {
                tracing::debug!("Ticket {} still waiting on {} answer(s)", message.ticket, left);
            }
            Resolution::Unknown => {
                tracing::debug!("Dropping get answer for unknown ticket {}", message.ticket);
            }
        }
    }
}
