use anyhow::Result;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Instant;
use std::{net::SocketAddr, time::Duration};
use tokio::net::UdpSocket;
use tokio::sync::{RwLock, watch};
use tracing::info;

use super::types::{GossipMessage, Node, NodeId, NodeState};
use crate::node::protocol::Handle;

const GOSSIP_INTERVAL: Duration = Duration::from_millis(500);
const FAILURE_DETECTION_INTERVAL: Duration = Duration::from_secs(2);
const SUSPECT_TIMEOUT: Duration = Duration::from_secs(5);
const DEAD_TIMEOUT: Duration = Duration::from_secs(10);

/// SWIM-style membership feed.
///
/// Tracks cluster members over UDP gossip and publishes the data node handles of the
/// alive members (self included) on a watch channel whenever that set changes.
pub struct MembershipService {
    pub local_node: Node,
    pub members: Arc<DashMap<NodeId, Node>>,
    seed_nodes: Vec<SocketAddr>,
    socket: Arc<UdpSocket>,
    incarnation: Arc<RwLock<u64>>,
    view: watch::Sender<Vec<Handle>>,
}

impl MembershipService {
    pub async fn new(
        gossip_addr: SocketAddr,
        http_addr: SocketAddr,
        seed_nodes: Vec<SocketAddr>,
    ) -> Result<Arc<Self>> {
        let socket = UdpSocket::bind(gossip_addr).await?;
        let local_node = Node {
            id: NodeId::new(),
            gossip_addr: socket.local_addr()?,
            http_addr,
            state: NodeState::Alive,
            incarnation: 1,
            last_seen: Some(Instant::now()),
        };

        let members = Arc::new(DashMap::new());
        members.insert(local_node.id.clone(), local_node.clone());
        let (view, _) = watch::channel(vec![local_node.handle()]);

        let service = Arc::new(Self {
            local_node,
            members,
            seed_nodes,
            socket: Arc::new(socket),
            incarnation: Arc::new(RwLock::new(1)),
            view,
        });

        if !service.seed_nodes.is_empty() {
            info!(
                "Joining cluster via {} seed node(s)",
                service.seed_nodes.len()
            );
            service.join_seeds().await?;
        }

        Ok(service)
    }

    pub async fn start(self: Arc<Self>) {
        tracing::info!("Starting membership service...");

        let _gossip_handle = {
            let service = self.clone();
            tokio::spawn(async move {
                service.gossip_loop().await;
            })
        };

        let _receive_handle = {
            let service = self.clone();
            tokio::spawn(async move {
                service.receive_loop().await;
            })
        };

        let _failure_detection_handle = {
            let service = self.clone();
            tokio::spawn(async move {
                service.failure_detection_loop().await;
            })
        };

        tracing::info!("All background tasks started");
    }

    /// Live handle set; the current value is available immediately.
    pub fn subscribe(&self) -> watch::Receiver<Vec<Handle>> {
        self.view.subscribe()
    }

    pub fn get_alive_members(&self) -> Vec<Node> {
        self.members
            .iter()
            .filter(|entry| entry.value().state == NodeState::Alive)
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn get_member(&self, id: &NodeId) -> Option<Node> {
        self.members.get(id).map(|entry| entry.value().clone())
    }

    /// Sorted data node handles of every alive member.
    pub fn live_handles(&self) -> Vec<Handle> {
        let mut handles: Vec<Handle> = self
            .get_alive_members()
            .iter()
            .map(Node::handle)
            .collect();
        handles.sort();
        handles.dedup();
        handles
    }

    pub async fn incarnation(&self) -> u64 {
        *self.incarnation.read().await
    }

    /// Applies one gossip message and republishes the live set if it changed.
    pub async fn handle_message(&self, msg: GossipMessage, src: SocketAddr) -> Result<()> {
        match msg {
            GossipMessage::Ping { from } => {
                self.handle_ping(from, src).await?;
            }

            GossipMessage::Ack { from, members } => {
                self.handle_ack(from, members, src).await;
            }

            GossipMessage::Join { node } => {
                self.handle_join(node, src);
            }

            GossipMessage::Suspect {
                node_id,
                incarnation,
            } => {
                self.handle_suspect(node_id, incarnation).await;
            }

            GossipMessage::Alive {
                node_id,
                incarnation,
            } => {
                self.handle_alive(node_id, incarnation);
            }
        }

        self.publish_view();
        Ok(())
    }

    fn publish_view(&self) {
        let handles = self.live_handles();
        let changed = self.view.send_if_modified(|current| {
            if *current == handles {
                return false;
            }
            *current = handles;
            true
        });

        if changed {
            tracing::info!("Live members changed: {:?}", *self.view.borrow());
        }
    }

    async fn local_snapshot(&self) -> Node {
        let mut node = self.local_node.clone();
        node.incarnation = self.incarnation().await;
        node
    }

    async fn join_seeds(&self) -> Result<()> {
        let msg = GossipMessage::Join {
            node: self.local_snapshot().await,
        };
        let encoded = bincode::serialize(&msg)?;

        for seed_node in &self.seed_nodes {
            if let Err(e) = self.socket.send_to(&encoded, seed_node).await {
                tracing::warn!("Failed to send join request to {}: {}", seed_node, e);
            } else {
                info!("Sent join request to {}", seed_node);
            }
        }
        Ok(())
    }

    async fn gossip_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(GOSSIP_INTERVAL);

        loop {
            interval.tick().await;

            let alive_members: Vec<Node> = self
                .get_alive_members()
                .into_iter()
                .filter(|member| member.id != self.local_node.id)
                .collect();

            if alive_members.is_empty() {
                if !self.seed_nodes.is_empty()
                    && let Err(e) = self.join_seeds().await
                {
                    tracing::error!("Failed to rejoin seeds: {}", e);
                }
                continue;
            }

            use rand::Rng;
            let idx = rand::thread_rng().gen_range(0..alive_members.len());
            let target = &alive_members[idx];

            let msg = GossipMessage::Ping {
                from: self.local_snapshot().await,
            };

            if let Ok(encoded) = bincode::serialize(&msg) {
                if let Err(e) = self.socket.send_to(&encoded, target.gossip_addr).await {
                    tracing::warn!("Failed to send ping to {:?}: {}", target.id, e);
                } else {
                    tracing::debug!("Sent ping to {:?}", target.id);
                }
            } else {
                tracing::error!("Failed to serialize GossipMessage::Ping");
            }
        }
    }

    async fn receive_loop(self: Arc<Self>) {
        let mut buf = vec![0u8; 65536];

        loop {
            match self.socket.recv_from(&mut buf).await {
                Ok((len, src)) => match bincode::deserialize::<GossipMessage>(&buf[..len]) {
                    Ok(msg) => {
                        if let Err(e) = self.handle_message(msg, src).await {
                            tracing::error!("Error handling message from {}: {}", src, e);
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Failed to deserialize message from {}: {}", src, e);
                    }
                },
                Err(e) => {
                    tracing::error!("Failed to receive UDP packet: {}", e);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        }
    }

    /// Records direct contact with `from`, which proves it is alive.
    fn touch(&self, mut from: Node, src: SocketAddr) {
        if from.id == self.local_node.id {
            return;
        }

        match self.members.get_mut(&from.id) {
            Some(mut member) => {
                member.last_seen = Some(Instant::now());
                member.http_addr = from.http_addr;
                member.gossip_addr = src;
                if from.incarnation > member.incarnation {
                    member.incarnation = from.incarnation;
                }
                if member.state != NodeState::Alive {
                    tracing::info!("Node {:?} at {} is reachable again", member.id, src);
                    member.state = NodeState::Alive;
                }
            }
            None => {
                tracing::info!("Discovered new member {:?} at {}", from.id, src);
                from.gossip_addr = src;
                from.state = NodeState::Alive;
                from.last_seen = Some(Instant::now());
                self.members.insert(from.id.clone(), from);
            }
        }
    }

    async fn handle_ping(&self, from: Node, src: SocketAddr) -> Result<()> {
        tracing::debug!("Received ping from {:?}", from.id);
        self.touch(from, src);

        let all_members: Vec<Node> = self
            .members
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        let reply = GossipMessage::Ack {
            from: self.local_snapshot().await,
            members: all_members,
        };

        let encoded = bincode::serialize(&reply)?;
        self.socket.send_to(&encoded, src).await?;

        tracing::debug!("Sent ack to {} with {} members", src, self.members.len());

        Ok(())
    }

    async fn handle_ack(&self, from: Node, members: Vec<Node>, src: SocketAddr) {
        tracing::debug!(
            "Received ack from {:?} (inc={}) with {} members",
            from.id,
            from.incarnation,
            members.len()
        );

        self.touch(from, src);

        for member in members {
            self.merge_member(member);
        }
    }

    fn merge_member(&self, new_member: Node) {
        if new_member.id == self.local_node.id {
            return;
        }

        match self.members.get_mut(&new_member.id) {
            Some(mut existing) => {
                if new_member.incarnation > existing.incarnation {
                    tracing::debug!(
                        "Updating {:?}: inc {} -> {}",
                        new_member.id,
                        existing.incarnation,
                        new_member.incarnation,
                    );

                    existing.state = new_member.state;
                    existing.incarnation = new_member.incarnation;
                    existing.http_addr = new_member.http_addr;
                    existing.last_seen = Some(Instant::now());
                } else if new_member.incarnation == existing.incarnation
                    && new_member.state == NodeState::Alive
                    && existing.state == NodeState::Suspect
                {
                    tracing::info!("{:?} refuted suspicion", new_member.id);
                    existing.state = NodeState::Alive;
                    existing.last_seen = Some(Instant::now());
                }
            }
            None if new_member.state != NodeState::Dead => {
                tracing::info!(
                    "Discovered new member: {:?} at {}",
                    new_member.id,
                    new_member.gossip_addr
                );

                let mut member_with_timestamp = new_member;
                member_with_timestamp.last_seen = Some(Instant::now());

                self.members
                    .insert(member_with_timestamp.id.clone(), member_with_timestamp);
            }
            None => {}
        }
    }

    async fn handle_suspect(&self, node_id: NodeId, incarnation: u64) {
        if node_id == self.local_node.id {
            let my_incarnation = {
                let mut inc = self.incarnation.write().await;
                if incarnation < *inc {
                    return;
                }
                *inc = incarnation + 1;
                *inc
            };
            tracing::info!(
                "Refuting suspicion of self with incarnation {}",
                my_incarnation
            );

            if let Some(mut me) = self.members.get_mut(&node_id) {
                me.incarnation = my_incarnation;
            }

            self.broadcast_message(GossipMessage::Alive {
                node_id,
                incarnation: my_incarnation,
            })
            .await;
            return;
        }

        match self.members.get_mut(&node_id) {
            Some(mut existing) => {
                if incarnation >= existing.incarnation && existing.state == NodeState::Alive {
                    tracing::info!(
                        "Node {:?} at {} suspected",
                        existing.id,
                        existing.gossip_addr
                    );
                    existing.state = NodeState::Suspect;
                    existing.incarnation = incarnation;
                }
            }
            None => {
                tracing::debug!("Suspected node {:?} doesn't exist", node_id);
            }
        }
    }

    fn handle_alive(&self, node_id: NodeId, incarnation: u64) {
        match self.members.get_mut(&node_id) {
            Some(mut existing) => {
                if incarnation > existing.incarnation {
                    tracing::info!(
                        "Node {:?} at {} is now Alive (inc={})",
                        existing.id,
                        existing.gossip_addr,
                        incarnation
                    );
                    existing.state = NodeState::Alive;
                    existing.incarnation = incarnation;
                    existing.last_seen = Some(Instant::now());
                } else if incarnation == existing.incarnation
                    && existing.state == NodeState::Suspect
                {
                    tracing::info!(
                        "Node {:?} at {} successfully refuted suspicion",
                        existing.id,
                        existing.gossip_addr,
                    );
                    existing.state = NodeState::Alive;
                    existing.last_seen = Some(Instant::now());
                }
            }
            None => {
                tracing::debug!("Alive message for unknown node {:?}", node_id);
            }
        }
    }

    fn handle_join(&self, mut node: Node, src: SocketAddr) {
        if node.id == self.local_node.id {
            return;
        }
        tracing::info!("Node {:?} joining cluster at {}", node.id, src);

        node.gossip_addr = src;
        node.state = NodeState::Alive;
        node.last_seen = Some(Instant::now());

        self.members.insert(node.id.clone(), node);

        tracing::info!("Cluster size now: {}", self.members.len());
    }

    async fn failure_detection_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(FAILURE_DETECTION_INTERVAL);

        loop {
            interval.tick().await;
            let messages_to_broadcast = self.detect_failures(Instant::now());

            self.publish_view();
            for msg in messages_to_broadcast {
                self.broadcast_message(msg).await;
            }
        }
    }

    /// Ages members by silence: Alive -> Suspect after 5 s, Suspect -> Dead after 10 s.
    fn detect_failures(&self, now: Instant) -> Vec<GossipMessage> {
        let mut messages_to_broadcast = Vec::new();

        for mut entry in self.members.iter_mut() {
            let member = entry.value_mut();

            if member.id == self.local_node.id {
                continue;
            }

            let Some(last_seen) = member.last_seen else {
                member.last_seen = Some(now);
                continue;
            };
            let elapsed = now.saturating_duration_since(last_seen);

            match member.state {
                NodeState::Alive if elapsed > SUSPECT_TIMEOUT => {
                    tracing::warn!(
                        "Node {:?} suspected (no contact for {:?})",
                        member.id,
                        elapsed
                    );

                    member.state = NodeState::Suspect;
                    messages_to_broadcast.push(GossipMessage::Suspect {
                        node_id: member.id.clone(),
                        incarnation: member.incarnation,
                    });
                }
                NodeState::Suspect if elapsed > DEAD_TIMEOUT => {
                    tracing::warn!(
                        "Node {:?} declared DEAD (no contact for {:?})",
                        member.id,
                        elapsed
                    );
                    member.state = NodeState::Dead;
                }
                _ => {}
            }
        }

        messages_to_broadcast
    }

    /// Runs one failure-detection pass as if `now` had been reached.
    #[cfg(test)]
    pub(crate) fn detect_failures_at(&self, now: Instant) {
        let _ = self.detect_failures(now);
        self.publish_view();
    }

    async fn broadcast_message(&self, msg: GossipMessage) {
        let Ok(encoded) = bincode::serialize(&msg) else {
            tracing::error!("Failed to serialize {:?}", msg);
            return;
        };

        let targets: Vec<Node> = self
            .get_alive_members()
            .into_iter()
            .filter(|member| member.id != self.local_node.id)
            .collect();

        for member in targets {
            if let Err(e) = self.socket.send_to(&encoded, member.gossip_addr).await {
                tracing::warn!("Failed to broadcast to {:?}: {}", member.id, e);
            }
        }
    }
}
