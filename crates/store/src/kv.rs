//! Versioned in-process key-value core.
//!
//! [`MemoryKv`] is the storage primitive beneath the pending-edit store:
//! string, hash, and set values with a monotonically increasing version per
//! key. Writers coordinate optimistically: read a key's version, queue a
//! batch of operations guarded on that version, and retry when the guard
//! fails. A guarded batch is all-or-nothing; either every operation is
//! visible together or none is.
//!
//! No caller may assume in-process mutual exclusion elsewhere; this type is
//! the single coordination point for transient state.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tokio::sync::RwLock;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// An operation addressed a key holding a value of the wrong type.
#[derive(Debug, thiserror::Error)]
#[error("Key '{key}' holds a {actual} value, expected {expected}")]
pub struct WrongValueType {
    pub key: String,
    pub expected: &'static str,
    pub actual: &'static str,
}

// ---------------------------------------------------------------------------
// Values and operations
// ---------------------------------------------------------------------------

/// A stored value: a string, a field/value hash, or a member set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KvValue {
    Str(String),
    Hash(BTreeMap<String, String>),
    Set(BTreeSet<String>),
}

impl KvValue {
    /// Type name for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Str(_) => "string",
            Self::Hash(_) => "hash",
            Self::Set(_) => "set",
        }
    }
}

/// One write operation inside a batch.
#[derive(Debug, Clone)]
pub enum KvOp {
    /// Set a string value, replacing whatever was there.
    PutStr { key: String, value: String },
    /// Set a field in a hash, creating the hash if absent.
    HashSet {
        key: String,
        field: String,
        value: String,
    },
    /// Add a member to a set, creating the set if absent.
    SetAdd { key: String, member: String },
    /// Remove a member from a set. No-op if the set or member is absent.
    SetRemove { key: String, member: String },
    /// Delete a key. No-op if absent.
    Delete { key: String },
}

impl KvOp {
    fn key(&self) -> &str {
        match self {
            Self::PutStr { key, .. }
            | Self::HashSet { key, .. }
            | Self::SetAdd { key, .. }
            | Self::SetRemove { key, .. }
            | Self::Delete { key } => key,
        }
    }
}

// ---------------------------------------------------------------------------
// MemoryKv
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Entry {
    value: KvValue,
    version: u64,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    next_version: u64,
}

/// In-process versioned key-value store.
///
/// Absent keys have version 0. Every write stamps the key with a fresh
/// version drawn from a store-wide counter, so a key deleted and re-created
/// never reuses a version a guard could have observed.
#[derive(Debug, Default)]
pub struct MemoryKv {
    inner: RwLock<Inner>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a value.
    pub async fn get(&self, key: &str) -> Option<KvValue> {
        self.inner
            .read()
            .await
            .entries
            .get(key)
            .map(|e| e.value.clone())
    }

    /// Read a value together with its version (0 when absent).
    pub async fn get_versioned(&self, key: &str) -> (Option<KvValue>, u64) {
        let inner = self.inner.read().await;
        match inner.entries.get(key) {
            Some(e) => (Some(e.value.clone()), e.version),
            None => (None, 0),
        }
    }

    /// Atomically set a hash field only if it is not already present.
    ///
    /// Returns `true` when the field was newly set, `false` when it already
    /// existed. This result is the sole source of truth for "was I first";
    /// no secondary read may override it.
    pub async fn hash_set_nx(
        &self,
        key: &str,
        field: &str,
        value: &str,
    ) -> Result<bool, WrongValueType> {
        let mut inner = self.inner.write().await;
        let version = inner.bump_version();
        let entry = inner
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Entry {
                value: KvValue::Hash(BTreeMap::new()),
                version: 0,
            });
        let KvValue::Hash(hash) = &mut entry.value else {
            return Err(WrongValueType {
                key: key.to_string(),
                expected: "hash",
                actual: entry.value.type_name(),
            });
        };
        if hash.contains_key(field) {
            return Ok(false);
        }
        hash.insert(field.to_string(), value.to_string());
        entry.version = version;
        Ok(true)
    }

    /// Apply a batch of operations, gated on version guards.
    ///
    /// Returns `Ok(false)` without applying anything when any guarded key's
    /// current version differs from the expected one (the optimistic-lock
    /// conflict the caller retries on). Type mismatches are detected before
    /// anything is written, so a failed batch never partially applies.
    pub async fn apply(
        &self,
        ops: Vec<KvOp>,
        guards: &[(String, u64)],
    ) -> Result<bool, WrongValueType> {
        let mut inner = self.inner.write().await;

        for (key, expected) in guards {
            let current = inner.entries.get(key).map_or(0, |e| e.version);
            if current != *expected {
                return Ok(false);
            }
        }

        // Dry run: walk the batch against the simulated value types so a
        // mismatch aborts before the first real write.
        {
            let mut simulated: HashMap<&str, Option<&'static str>> = HashMap::new();
            for op in &ops {
                let key = op.key();
                let current = *simulated
                    .entry(key)
                    .or_insert_with(|| inner.entries.get(key).map(|e| e.value.type_name()));
                let (expected, next) = match op {
                    KvOp::PutStr { .. } => (None, Some("string")),
                    KvOp::HashSet { .. } => (Some("hash"), Some("hash")),
                    KvOp::SetAdd { .. } | KvOp::SetRemove { .. } => (Some("set"), Some("set")),
                    KvOp::Delete { .. } => (None, None),
                };
                if let (Some(expected), Some(actual)) = (expected, current) {
                    if expected != actual {
                        return Err(WrongValueType {
                            key: key.to_string(),
                            expected,
                            actual,
                        });
                    }
                }
                simulated.insert(key, next);
            }
        }

        for op in ops {
            let version = inner.bump_version();
            match op {
                KvOp::PutStr { key, value } => {
                    inner.entries.insert(
                        key,
                        Entry {
                            value: KvValue::Str(value),
                            version,
                        },
                    );
                }
                KvOp::HashSet { key, field, value } => {
                    let entry = inner.entries.entry(key).or_insert_with(|| Entry {
                        value: KvValue::Hash(BTreeMap::new()),
                        version: 0,
                    });
                    if let KvValue::Hash(hash) = &mut entry.value {
                        hash.insert(field, value);
                    }
                    entry.version = version;
                }
                KvOp::SetAdd { key, member } => {
                    let entry = inner.entries.entry(key).or_insert_with(|| Entry {
                        value: KvValue::Set(BTreeSet::new()),
                        version: 0,
                    });
                    if let KvValue::Set(set) = &mut entry.value {
                        set.insert(member);
                    }
                    entry.version = version;
                }
                KvOp::SetRemove { key, member } => {
                    if let Some(entry) = inner.entries.get_mut(&key) {
                        if let KvValue::Set(set) = &mut entry.value {
                            set.remove(&member);
                            entry.version = version;
                        }
                    }
                }
                KvOp::Delete { key } => {
                    inner.entries.remove(&key);
                }
            }
        }

        Ok(true)
    }
}

impl Inner {
    fn bump_version(&mut self) -> u64 {
        self.next_version += 1;
        self.next_version
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
