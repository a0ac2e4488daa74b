use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A payload tagged with the version the owner assigned to it.
///
/// `version == None` means the value has not been committed by an owner yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Value {
    pub payload: String,
    pub version: Option<u64>,
}

impl Value {
    /// A fresh client value, waiting for its owner to version it.
    pub fn unversioned(payload: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
            version: None,
        }
    }

    pub fn versioned(payload: impl Into<String>, version: u64) -> Self {
        Self {
            payload: payload.into(),
            version: Some(version),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Applied,
    /// The stored version was already at least as new; nothing changed.
    Stale,
}

/// Key -> versioned value map.
///
/// Each node keeps two of these, one for keys it owns and one for copies held on
/// behalf of other owners. They are versioned independently.
#[derive(Debug, Default)]
pub struct VersionedStore {
    entries: HashMap<String, Value>,
}

impl VersionedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Gives `value` the next version for `key` unless it already carries one.
    pub fn assign_version(&self, key: &str, value: &mut Value) {
        if value.version.is_none() {
            let next = self
                .entries
                .get(key)
                .and_then(|existing| existing.version)
                .map_or(0, |version| version + 1);
            value.version = Some(next);
        }
    }

    /// Stores `value` only if it is strictly newer than what is held.
    pub fn commit(&mut self, key: &str, value: Value) -> WriteOutcome {
        if let Some(existing) = self.entries.get(key)
            && existing.version >= value.version
        {
            return WriteOutcome::Stale;
        }
        self.entries.insert(key.to_string(), value);
        WriteOutcome::Applied
    }

    /// Unconditional insert, used when redistributing already-versioned data.
    pub fn insert(&mut self, key: String, value: Value) {
        self.entries.insert(key, value);
    }

    pub fn drain(&mut self) -> impl Iterator<Item = (String, Value)> + '_ {
        self.entries.drain()
    }

    pub fn payloads(&self) -> impl Iterator<Item = &str> {
        self.entries.values().map(|value| value.payload.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
