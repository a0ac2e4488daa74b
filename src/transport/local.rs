use super::Postman;
use crate::node::protocol::{Command, Handle};

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// In-process directory of mailboxes.
///
/// Handles resolve to tokio channels; sending to a handle nobody registered (or whose
/// receiver is gone) silently loses the message.
#[derive(Default)]
pub struct LocalNetwork {
    mailboxes: DashMap<Handle, UnboundedSender<Command>>,
}

impl LocalNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Opens a mailbox for `handle`, replacing any previous one.
    pub fn register(&self, handle: Handle) -> UnboundedReceiver<Command> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.mailboxes.insert(handle, tx);
        rx
    }

    pub fn unregister(&self, handle: &Handle) {
        self.mailboxes.remove(handle);
    }

    pub fn is_registered(&self, handle: &Handle) -> bool {
        self.mailboxes.contains_key(handle)
    }
}

impl Postman for LocalNetwork {
    fn deliver(&self, to: &Handle, command: Command) {
        let Some(mailbox) = self.mailboxes.get(to) else {
            tracing::debug!("No mailbox for {}, dropping {}", to, command.kind());
            return;
        };
        if let Err(e) = mailbox.send(command) {
            tracing::debug!("Mailbox of {} closed, dropping {}", to, e.0.kind());
        }
    }
}
