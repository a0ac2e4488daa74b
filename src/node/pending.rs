use super::protocol::{Handle, Ticket};
use std::collections::HashMap;

/// An operation waiting on `awaiting` more answers before replying to `requester`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    pub awaiting: usize,
    pub requester: Handle,
    /// Ticket to echo back, taken from the requester's own numbering.
    pub reply_ticket: Ticket,
}

impl PendingRequest {
    pub fn new(awaiting: usize, requester: Handle, reply_ticket: Ticket) -> Self {
        Self {
            awaiting,
            requester,
            reply_ticket,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Resolution {
    /// Last answer arrived; the entry has been removed.
    Complete(PendingRequest),
    Waiting(usize),
    /// No entry for this ticket: already satisfied, superseded or never ours.
    Unknown,
}

/// Ticket -> in-flight operation.
///
/// Entries have no deadline; a peer that never answers leaves its entry behind.
#[derive(Debug)]
pub struct PendingRequests {
    next_ticket: Ticket,
    requests: HashMap<Ticket, PendingRequest>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self {
            next_ticket: 1,
            requests: HashMap::new(),
        }
    }

    pub fn next_ticket(&mut self) -> Ticket {
        let ticket = self.next_ticket;
        self.next_ticket = self.next_ticket.wrapping_add(1);
        ticket
    }

    /// Ticket the next call to [`next_ticket`](Self::next_ticket) will hand out.
    pub fn peek_ticket(&self) -> Ticket {
        self.next_ticket
    }

    pub fn register(&mut self, ticket: Ticket, request: PendingRequest) {
        self.requests.insert(ticket, request);
    }

    /// Counts one answer against `ticket`.
    pub fn resolve(&mut self, ticket: Ticket) -> Resolution {
        let Some(request) = self.requests.get_mut(&ticket) else {
            return Resolution::Unknown;
        };
        request.awaiting = request.awaiting.saturating_sub(1);
        if request.awaiting > 0 {
            return Resolution::Waiting(request.awaiting);
        }
        match self.requests.remove(&ticket) {
            Some(request) => Resolution::Complete(request),
            None => Resolution::Unknown,
        }
    }

    pub fn get(&self, ticket: Ticket) -> Option<&PendingRequest> {
        self.requests.get(&ticket)
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

impl Default for PendingRequests {
    fn default() -> Self {
        Self::new()
    }
}
