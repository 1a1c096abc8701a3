//! Keyed snapshot stores: the in-memory read models.
//!
//! A store maps a key to the payload of the newest event seen for it. It is
//! a projection of an event stream, created empty at startup and rebuilt by
//! re-reading the stream; nothing is persisted, evicted or deleted.
//!
//! # Ordering
//!
//! Last-writer-wins by **event time**, not arrival order:
//!
//! ```text
//! put(VIP, 10, t1)  →  Inserted      VIP = 10 @ t1
//! put(VIP,  8, t0)  →  Stale         VIP = 10 @ t1   (t0 < t1, dropped)
//! put(VIP,  7, t1)  →  Updated       VIP =  7 @ t1   (tie, later arrival wins)
//! ```
//!
//! # Ownership
//!
//! [`SnapshotStore`] is the single write handle and is deliberately not
//! `Clone`; it is moved into the ingestion consumer that owns the stream.
//! Any number of [`SnapshotReader`]s can be handed out to query paths.

use chrono::{DateTime, Utc};
use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, PoisonError, RwLock};

/// A value together with the event time that produced it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot<V> {
    /// Payload of the most recently applied event
    pub value: V,
    /// Event time of that event
    pub updated_at: DateTime<Utc>,
}

/// What a [`SnapshotStore::put`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PutOutcome {
    /// First event for the key
    Inserted,
    /// Replaced an entry with an older or equal event time
    Updated,
    /// Dropped: the stored entry is strictly newer
    Stale,
}

impl PutOutcome {
    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Inserted => "inserted",
            Self::Updated => "updated",
            Self::Stale => "stale",
        }
    }

    /// Whether the store changed.
    #[must_use]
    pub const fn is_applied(self) -> bool {
        !matches!(self, Self::Stale)
    }
}

type Entries<K, V> = Arc<RwLock<HashMap<K, Snapshot<V>>>>;

/// Write handle of a keyed snapshot store.
#[derive(Debug)]
pub struct SnapshotStore<K, V> {
    entries: Entries<K, V>,
}

/// Read-only handle of a keyed snapshot store. Cheap to clone.
#[derive(Debug)]
pub struct SnapshotReader<K, V> {
    entries: Entries<K, V>,
}

impl<K, V> Clone for SnapshotReader<K, V> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
        }
    }
}

impl<K, V> Default for SnapshotStore<K, V> {
    fn default() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl<K, V> SnapshotStore<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A read handle sharing this store's entries.
    #[must_use]
    pub fn reader(&self) -> SnapshotReader<K, V> {
        SnapshotReader {
            entries: Arc::clone(&self.entries),
        }
    }

    /// Upsert `value` for `key` unless the stored entry has a strictly later
    /// event time, in which case nothing changes.
    pub fn put(&self, key: K, value: V, event_time: DateTime<Utc>) -> PutOutcome {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        match entries.get_mut(&key) {
            Some(current) if current.updated_at > event_time => PutOutcome::Stale,
            Some(current) => {
                *current = Snapshot {
                    value,
                    updated_at: event_time,
                };
                PutOutcome::Updated
            },
            None => {
                entries.insert(
                    key,
                    Snapshot {
                        value,
                        updated_at: event_time,
                    },
                );
                PutOutcome::Inserted
            },
        }
    }

    /// Current snapshot for `key`, or `None` if it was never observed.
    #[must_use]
    pub fn get<Q>(&self, key: &Q) -> Option<Snapshot<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        read(&self.entries, key)
    }

    /// Number of keys observed so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether no key has been observed yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V> SnapshotReader<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    /// Current snapshot for `key`, or `None` if it was never observed.
    #[must_use]
    pub fn get<Q>(&self, key: &Q) -> Option<Snapshot<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        read(&self.entries, key)
    }

    /// Number of keys observed so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether no key has been observed yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// The clone happens under the read lock so a reader never sees half of a put.
fn read<K, V, Q>(entries: &Entries<K, V>, key: &Q) -> Option<Snapshot<V>>
where
    K: Eq + Hash + Borrow<Q>,
    V: Clone,
    Q: Hash + Eq + ?Sized,
{
    entries
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(key)
        .cloned()
}
