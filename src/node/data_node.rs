use super::pending::PendingRequests;
use super::protocol::{
    Command, GetAllLocalAnswer, GetAllLocalRequest, GetAnswer, GetNodesAnswer, GetNodesRequest,
    Handle, Ticket,
};
use crate::config::{NodeConfig, ReadSource};
use crate::postoffice::{Letter, PostOffice};
use crate::ring::{Placement, Ring, RingError};
use crate::storage::VersionedStore;
use crate::transport::Postman;

use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

/// One member of the replicated store.
///
/// All state is owned by the node and only touched from [`DataNode::handle`], which
/// processes one command to completion before the next. Cross-node work is always a
/// message out plus an answer back in.
pub struct DataNode {
    pub(super) me: Handle,
    pub(super) config: NodeConfig,
    pub(super) ring: Ring,
    pub(super) primary: VersionedStore,
    pub(super) replicas: VersionedStore,
    pub(super) pending: PendingRequests,
    pub(super) post_office: PostOffice,
    pub(super) postman: Arc<dyn Postman>,
    pub(super) load_balancer: StdRng,
}

impl DataNode {
    pub fn new(me: Handle, config: NodeConfig, postman: Arc<dyn Postman>) -> Self {
        let ring = Ring::new(me.clone());
        let post_office = PostOffice::new(postman.clone(), config.message_rate);
        tracing::info!(
            "Data node {} starting (ring key {}, replicas={})",
            me,
            ring.nodes()[0].ring_key,
            config.replicas
        );

        Self {
            me,
            config,
            ring,
            primary: VersionedStore::new(),
            replicas: VersionedStore::new(),
            pending: PendingRequests::new(),
            post_office,
            postman,
            load_balancer: StdRng::from_entropy(),
        }
    }

    /// Fixes the replica-choice generator, for reproducible routing.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.load_balancer = StdRng::seed_from_u64(seed);
        self
    }

    /// Starts the message loop and the refill ticker on the current runtime.
    pub fn spawn(self, inbox: UnboundedReceiver<Command>) -> JoinHandle<()> {
        let ticker = spawn_ticker(
            self.postman.clone(),
            self.me.clone(),
            self.config.refill_interval,
        );
        tokio::spawn(async move {
            self.run(inbox).await;
            ticker.abort();
        })
    }

    pub async fn run(mut self, mut inbox: UnboundedReceiver<Command>) {
        while let Some(command) = inbox.recv().await {
            self.handle(command);
        }
        tracing::info!("Inbox of {} closed, stopping", self.me);
    }

    pub fn handle(&mut self, command: Command) {
        tracing::trace!("{} handling {}", self.me, command.kind());
        match command {
            Command::GetRequest(message) => self.on_get_request(message),
            Command::Get(message) => self.on_get(message),
            Command::GetAnswer(message) => self.on_get_answer(message),
            Command::PutRequest(message) => self.on_put_request(message),
            Command::Put(message) => self.on_put(message),
            Command::PutAnswer(message) => self.on_put_answer(message),
            Command::NodesUpdate(message) => self.on_nodes_update(message),
            Command::Timeout => self.on_timeout(),
            Command::GetAllLocalRequest(message) => self.on_get_all_local_request(message),
            Command::GetNodesRequest(message) => self.on_get_nodes_request(message),
            Command::GetAllLocalAnswer(_) | Command::GetNodesAnswer(_) => {
                tracing::debug!("{} ignoring introspection answer", self.me);
            }
        }
    }

    pub fn local_handle(&self) -> &Handle {
        &self.me
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn ring(&self) -> &Ring {
        &self.ring
    }

    pub fn primary(&self) -> &VersionedStore {
        &self.primary
    }

    pub fn replicas(&self) -> &VersionedStore {
        &self.replicas
    }

    pub fn pending(&self) -> &PendingRequests {
        &self.pending
    }

    pub fn post_office(&self) -> &PostOffice {
        &self.post_office
    }

    // --- helpers shared by the handlers ---

    pub(super) fn send(&mut self, destination: Handle, message: Command) {
        self.post_office.send(Letter::new(destination, message));
    }

    pub(super) fn defer(&mut self, command: Command, reason: RingError) {
        tracing::info!(
            "Deferring {} until the cluster grows: {}",
            command.kind(),
            reason
        );
        self.post_office.archive(command);
    }

    pub(super) fn is_owner(&self, placement: &Placement) -> bool {
        placement.position == self.ring.self_position()
    }

    /// Answers a read from whichever local map this node's role points at.
    pub(super) fn local_answer(&self, key: &str, as_owner: bool, ticket: Ticket) -> GetAnswer {
        let store = match (as_owner, self.config.replica_reads) {
            (true, _) | (false, ReadSource::PrimaryStore) => &self.primary,
            (false, ReadSource::ReplicaStore) => &self.replicas,
        };
        let value = store.get(key).map(|value| value.payload.clone());
        GetAnswer {
            key: key.to_string(),
            found: value.is_some(),
            value,
            ticket,
        }
    }

    fn on_timeout(&mut self) {
        self.post_office.refill(self.config.message_rate);
    }

    fn on_get_all_local_request(&mut self, message: GetAllLocalRequest) {
        tracing::info!(
            "Local data: {} primary, {} replica",
            self.primary.len(),
            self.replicas.len()
        );
        let values: Vec<String> = self
            .primary
            .payloads()
            .chain(self.replicas.payloads())
            .map(str::to_string)
            .collect();
        self.send(
            message.reply_to,
            Command::GetAllLocalAnswer(GetAllLocalAnswer { values }),
        );
    }

    fn on_get_nodes_request(&mut self, message: GetNodesRequest) {
        let nodes = self.ring.nodes().to_vec();
        self.send(
            message.reply_to,
            Command::GetNodesAnswer(GetNodesAnswer { nodes }),
        );
    }
}

/// Delivers a `Timeout` to `me` every `period`, as an ordinary inbox message.
fn spawn_ticker(postman: Arc<dyn Postman>, me: Handle, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.tick().await;
        loop {
            interval.tick().await;
            postman.deliver(&me, Command::Timeout);
        }
    })
}
