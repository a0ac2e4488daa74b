use crate::node::protocol::Handle;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Fixed-length hex digest identifying a node's place on the ring.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RingKey(pub String);

impl RingKey {
    /// Digests a node identity (`address:port`).
    pub fn of(identity: &str) -> Self {
        Self(hex::encode(Sha256::digest(identity.as_bytes())))
    }
}

impl fmt::Display for RingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.0[..self.0.len().min(10)])
    }
}

/// One entry of the membership table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub ring_key: RingKey,
    pub handle: Handle,
}

impl NodeInfo {
    pub fn new(handle: Handle) -> Self {
        Self {
            ring_key: RingKey::of(&handle.addr),
            handle,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RingError {
    /// Fewer distinct nodes are known than the replication factor requires.
    #[error("cluster too small: {known} known node(s), {required} required")]
    InsufficientClusterSize { required: usize, known: usize },
}

/// Where a key lives under the current view.
#[derive(Debug, Clone)]
pub struct Placement {
    pub position: usize,
    pub owner: NodeInfo,
    pub successors: Vec<NodeInfo>,
}

impl Placement {
    pub fn holds_replica(&self, handle: &Handle) -> bool {
        self.successors.iter().any(|node| &node.handle == handle)
    }
}

/// Sorted view of the cluster as seen by one node.
///
/// The local node is always part of its own view; the list is rebuilt wholesale
/// on every membership event and kept sorted by ring key.
#[derive(Debug, Clone)]
pub struct Ring {
    me: Handle,
    nodes: Vec<NodeInfo>,
    self_position: usize,
}

impl Ring {
    pub fn new(me: Handle) -> Self {
        let nodes = vec![NodeInfo::new(me.clone())];
        Self {
            me,
            nodes,
            self_position: 0,
        }
    }

    /// Replaces the view with `peers` plus the local node.
    ///
    /// Duplicate handles (including the local one, if the feed reports it) collapse
    /// into a single entry.
    pub fn rebuild<I>(&mut self, peers: I)
    where
        I: IntoIterator<Item = Handle>,
    {
        let mut nodes: Vec<NodeInfo> = peers
            .into_iter()
            .filter(|handle| handle != &self.me)
            .map(NodeInfo::new)
            .collect();
        nodes.push(NodeInfo::new(self.me.clone()));
        nodes.sort_by(|a, b| a.ring_key.cmp(&b.ring_key));
        nodes.dedup_by(|a, b| a.handle == b.handle);

        self.self_position = nodes
            .iter()
            .position(|node| node.handle == self.me)
            .unwrap_or_default();
        self.nodes = nodes;
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[NodeInfo] {
        &self.nodes
    }

    pub fn self_position(&self) -> usize {
        self.self_position
    }

    pub fn local(&self) -> &Handle {
        &self.me
    }

    /// True when the view can satisfy `replicas` copies besides the owner.
    pub fn can_replicate(&self, replicas: usize) -> bool {
        self.nodes.len() > replicas
    }

    pub fn position(&self, key: &str) -> usize {
        key_position(key, self.nodes.len())
    }

    /// Collects the `replicas` nodes following `position`, wrapping at the end.
    pub fn successors(&self, position: usize, replicas: usize) -> Result<Vec<NodeInfo>, RingError> {
        let count = self.nodes.len();
        if count <= replicas {
            return Err(RingError::InsufficientClusterSize {
                required: replicas + 1,
                known: count,
            });
        }

        Ok((1..=replicas)
            .map(|step| self.nodes[(position + step) % count].clone())
            .collect())
    }

    pub fn placement(&self, key: &str, replicas: usize) -> Result<Placement, RingError> {
        let position = self.position(key);
        let successors = self.successors(position, replicas)?;
        Ok(Placement {
            position,
            owner: self.nodes[position].clone(),
            successors,
        })
    }
}

/// Maps a key onto `0..nodes`.
///
/// Uses the std `DefaultHasher` with its fixed keys. Its algorithm is unspecified
/// across Rust releases, so nodes only agree on positions when every binary in the
/// cluster was built with the same toolchain.
pub fn key_position(key: &str, nodes: usize) -> usize {
    if nodes == 0 {
        return 0;
    }
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    let hash = hasher.finish() as i64;
    hash.rem_euclid(nodes as i64) as usize
}
