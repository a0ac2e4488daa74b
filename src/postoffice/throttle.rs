use crate::node::protocol::{Command, Handle};
use crate::transport::Postman;
use std::collections::VecDeque;
use std::sync::Arc;

/// An outgoing message waiting for send budget.
#[derive(Debug, Clone, PartialEq)]
pub struct Letter {
    pub destination: Handle,
    pub message: Command,
}

impl Letter {
    pub fn new(destination: Handle, message: Command) -> Self {
        Self {
            destination,
            message,
        }
    }
}

/// Outbound rate limiter plus the buffer of operations deferred for a small cluster.
///
/// The budget is reset (not topped up) on every refill, so at most `n` letters leave
/// per tick once the queue is backed up.
pub struct PostOffice {
    postman: Arc<dyn Postman>,
    budget: usize,
    outgoing: VecDeque<Letter>,
    deferred: VecDeque<Command>,
}

impl PostOffice {
    pub fn new(postman: Arc<dyn Postman>, budget: usize) -> Self {
        Self {
            postman,
            budget,
            outgoing: VecDeque::new(),
            deferred: VecDeque::new(),
        }
    }

    /// Dispatches right away while budget remains, otherwise queues.
    pub fn send(&mut self, letter: Letter) {
        if self.budget > 0 {
            self.budget -= 1;
            self.postman.deliver(&letter.destination, letter.message);
        } else {
            self.outgoing.push_back(letter);
        }
    }

    /// Sets the budget to `amount` and drains queued letters against it.
    ///
    /// Returns how many letters were dispatched.
    pub fn refill(&mut self, amount: usize) -> usize {
        self.budget = amount;
        let mut dispatched = 0;
        while self.budget > 0 {
            let Some(letter) = self.outgoing.pop_front() else {
                break;
            };
            self.budget -= 1;
            self.postman.deliver(&letter.destination, letter.message);
            dispatched += 1;
        }
        if dispatched > 0 {
            tracing::debug!(
                "Post office dispatched {} queued letter(s), {} still waiting",
                dispatched,
                self.outgoing.len()
            );
        }
        dispatched
    }

    /// Buffers an inbound operation that cannot run yet.
    pub fn archive(&mut self, command: Command) {
        self.deferred.push_back(command);
    }

    /// Hands back every archived operation in arrival order and forgets them.
    pub fn take_deferred(&mut self) -> Vec<Command> {
        self.deferred.drain(..).collect()
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    pub fn queued(&self) -> usize {
        self.outgoing.len()
    }

    pub fn deferred(&self) -> usize {
        self.deferred.len()
    }
}
