use super::Postman;
use super::handlers::{
    handle_debug_local, handle_debug_nodes, handle_get, handle_message, handle_put,
};
use super::protocol::{
    ENDPOINT_DEBUG_LOCAL, ENDPOINT_DEBUG_NODES, ENDPOINT_GET, ENDPOINT_MESSAGE, ENDPOINT_PUT,
    Envelope,
};
use crate::node::protocol::{Command, Handle, Mailbox};

use anyhow::Result;
use axum::{
    Router,
    extract::Extension,
    routing::{get, post},
};
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::oneshot;

const DELIVERY_TIMEOUT: Duration = Duration::from_millis(500);

/// HTTP message substrate for one node.
///
/// Deliveries addressed to this node's own address go straight to its inbox (or to a
/// waiting client slot); everything else is POSTed once as an [`Envelope`]. Failed
/// deliveries are logged and forgotten.
pub struct HttpPostman {
    local_addr: String,
    inbox: UnboundedSender<Command>,
    slots: DashMap<u64, oneshot::Sender<Command>>,
    next_slot: AtomicU64,
    http_client: reqwest::Client,
    runtime: tokio::runtime::Handle,
    client_timeout: Duration,
}

impl HttpPostman {
    /// Must be called from inside a tokio runtime; remote deliveries are spawned on it.
    pub fn new(
        local_addr: impl Into<String>,
        inbox: UnboundedSender<Command>,
        client_timeout: Duration,
    ) -> Result<Arc<Self>> {
        let runtime = tokio::runtime::Handle::try_current()?;
        Ok(Arc::new(Self {
            local_addr: local_addr.into(),
            inbox,
            slots: DashMap::new(),
            next_slot: AtomicU64::new(1),
            http_client: reqwest::Client::new(),
            runtime,
            client_timeout,
        }))
    }

    pub fn local_handle(&self) -> Handle {
        Handle::node(self.local_addr.clone())
    }

    /// Sends a request built around a fresh reply slot to the local node and waits for
    /// the answer.
    pub async fn ask<F>(&self, build: F) -> Result<Command>
    where
        F: FnOnce(Handle) -> Command,
    {
        let slot = self.next_slot.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.slots.insert(slot, tx);

        let request = build(Handle::client(self.local_addr.clone(), slot));
        self.deliver(&self.local_handle(), request);

        match tokio::time::timeout(self.client_timeout, rx).await {
            Ok(Ok(answer)) => Ok(answer),
            Ok(Err(_)) => Err(anyhow::anyhow!("Reply slot {} closed", slot)),
            Err(_) => {
                self.slots.remove(&slot);
                Err(anyhow::anyhow!(
                    "No answer within {:?} (slot {})",
                    self.client_timeout,
                    slot
                ))
            }
        }
    }

    /// Entry point for envelopes received over HTTP.
    pub fn accept(&self, envelope: Envelope) {
        if envelope.to.addr != self.local_addr {
            tracing::warn!(
                "Envelope for {} arrived at {}, dropping",
                envelope.to,
                self.local_addr
            );
            return;
        }
        self.route_local(envelope.to.mailbox, envelope.command);
    }

    pub fn waiting_clients(&self) -> usize {
        self.slots.len()
    }

    fn route_local(&self, mailbox: Mailbox, command: Command) {
        match mailbox {
            Mailbox::Node => {
                if let Err(e) = self.inbox.send(command) {
                    tracing::error!("Local inbox closed, dropping {}", e.0.kind());
                }
            }
            Mailbox::Client(slot) => match self.slots.remove(&slot) {
                Some((_, waiter)) => {
                    // The waiter may have given up already; nothing to do then.
                    let _ = waiter.send(command);
                }
                None => {
                    tracing::debug!(
                        "No client waiting on slot {}, dropping {}",
                        slot,
                        command.kind()
                    );
                }
            },
        }
    }

    fn post_remote(&self, to: &Handle, command: Command) {
        let url = format!("http://{}{}", to.addr, ENDPOINT_MESSAGE);
        let envelope = Envelope {
            to: to.clone(),
            command,
        };
        let client = self.http_client.clone();

        self.runtime.spawn(async move {
            let response = client
                .post(url.clone())
                .json(&envelope)
                .timeout(DELIVERY_TIMEOUT)
                .send()
                .await;

            match response {
                Ok(resp) if resp.status().is_success() => {}
                Ok(resp) => {
                    tracing::warn!("Delivery to {} rejected: {}", url, resp.status());
                }
                Err(e) => {
                    tracing::warn!(
                        "Delivery of {} to {} failed: {}",
                        envelope.command.kind(),
                        url,
                        e
                    );
                }
            }
        });
    }
}

impl Postman for HttpPostman {
    fn deliver(&self, to: &Handle, command: Command) {
        if to.addr == self.local_addr {
            self.route_local(to.mailbox, command);
        } else {
            self.post_remote(to, command);
        }
    }
}

/// Inter-node and client routes for one node.
pub fn router(postman: Arc<HttpPostman>) -> Router {
    Router::new()
        .route(ENDPOINT_MESSAGE, post(handle_message))
        .route(ENDPOINT_PUT, post(handle_put))
        .route(&format!("{}/:key", ENDPOINT_GET), get(handle_get))
        .route(ENDPOINT_DEBUG_LOCAL, get(handle_debug_local))
        .route(ENDPOINT_DEBUG_NODES, get(handle_debug_nodes))
        .layer(Extension(postman))
}
