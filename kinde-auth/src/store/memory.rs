//! In-process transient store with per-entry expiry.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

use super::{StoredValue, TransientStore};
use crate::error::Error;

/// Every this many writes, `put` sweeps out expired entries.
const SWEEP_EVERY_PUTS: usize = 64;

#[derive(Debug, Clone)]
struct Entry {
    raw: String,
    expires_at: Option<DateTime<Utc>>,
}

impl Entry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| now >= at).unwrap_or(false)
    }
}

/// Transient store backed by a concurrent map.
///
/// Values are kept in their encoded text form, the same way a remote KV
/// service holds them. Meant for development and tests; entries do not survive
/// a restart and are not shared between processes.
///
/// Abandoned flows never read their keys back, so writes periodically sweep
/// expired entries to keep the map bounded by the live set.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, Entry>,
    puts: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) entries.
    pub fn len(&self) -> usize {
        let now = Utc::now();
        self.entries.iter().filter(|e| !e.is_expired(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop expired entries.
    ///
    /// Reads already treat expired entries as absent; this only reclaims memory.
    /// Called from `put` every `SWEEP_EVERY_PUTS` writes.
    pub fn cleanup_expired(&self) {
        let now = Utc::now();
        self.entries.retain(|_, entry| !entry.is_expired(now));
    }
}

#[async_trait]
impl TransientStore for MemoryStore {
    async fn put(
        &self,
        key: &str,
        value: StoredValue,
        ttl_secs: Option<u64>,
    ) -> Result<(), Error> {
        let raw = value.encode()?;
        let now = Utc::now();
        let expires_at = ttl_secs.and_then(|secs| {
            Duration::try_seconds(i64::try_from(secs).ok()?)
                .and_then(|ttl| now.checked_add_signed(ttl))
        });
        self.entries
            .insert(key.to_string(), Entry { raw, expires_at });

        if (self.puts.fetch_add(1, Ordering::Relaxed) + 1) % SWEEP_EVERY_PUTS == 0 {
            self.cleanup_expired();
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<StoredValue>, Error> {
        let now = Utc::now();
        let entry = match self.entries.get(key) {
            Some(entry) => entry.clone(),
            None => return Ok(None),
        };

        if entry.is_expired(now) {
            self.entries.remove(key);
            return Ok(None);
        }

        Ok(Some(StoredValue::decode(entry.raw)))
    }

    async fn delete(&self, key: &str) -> Result<(), Error> {
        self.entries.remove(key);
        Ok(())
    }
}
