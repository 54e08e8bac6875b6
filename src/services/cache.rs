//! Process-memory paste store.
//!
//! Entries are sealed under a process-wide wrapping key generated at
//! startup and never persisted, so a restart makes every entry unreadable.
//!
//! Eviction is strict insertion order (FIFO). Reading an entry never moves
//! it; when the cache is full the oldest inserted entry goes first, however
//! recently it was read.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::{
    crypto::{
        envelope::{self, EnvelopeKeys, WrappingKey},
        token,
    },
    error::{AppError, Result},
    models::paste::{Entry, Paste},
    validation::paste::validate_payload,
};

/// The map and its insertion order. Always mutated together under one lock.
#[derive(Default)]
struct CacheInner {
    entries: HashMap<String, Entry>,
    order: VecDeque<String>,
}

impl CacheInner {
    fn push(&mut self, entry: Entry) {
        self.order.push_back(entry.id.clone());
        self.entries.insert(entry.id.clone(), entry);
    }

    fn remove(&mut self, id: &str) -> Option<Entry> {
        let entry = self.entries.remove(id)?;
        if let Some(position) = self.order.iter().position(|queued| queued == id) {
            self.order.remove(position);
        }
        Some(entry)
    }

    fn evict_oldest(&mut self) -> Option<String> {
        let oldest = self.order.pop_front()?;
        self.entries.remove(&oldest);
        Some(oldest)
    }
}

/// A bounded, FIFO-evicted, in-memory paste store.
#[derive(Clone)]
pub struct EphemeralCache {
    inner: Arc<RwLock<CacheInner>>,
    wrapping_key: Arc<WrappingKey>,
    max_entries: usize,
    max_entry_size: usize,
}

impl EphemeralCache {
    /// Creates an empty cache with a fresh process wrapping key.
    ///
    /// # Arguments
    ///
    /// * `max_entries` - The number of entries kept before the oldest is evicted.
    /// * `max_entry_size` - The largest accepted payload in bytes.
    pub fn new(max_entries: usize, max_entry_size: usize) -> Result<Self> {
        if max_entries == 0 {
            return Err(AppError::Validation(
                "Cache capacity must be positive".to_string(),
            ));
        }

        Ok(Self {
            inner: Arc::new(RwLock::new(CacheInner::default())),
            wrapping_key: Arc::new(envelope::generate_wrapping_key()?),
            max_entries,
            max_entry_size,
        })
    }

    /// Seals and stores a payload.
    ///
    /// When the cache is full the oldest inserted entry is evicted first.
    ///
    /// # Returns
    ///
    /// The public id of the new entry.
    pub async fn insert(&self, plaintext: &[u8], burn: bool, content_type: &str) -> Result<String> {
        validate_payload(plaintext, self.max_entry_size)?;

        let keys = EnvelopeKeys::generate()?;
        let ciphertext = keys.seal(plaintext, &self.wrapping_key)?;
        let id = token::generate_public_id(content_type)?;

        let entry = Entry {
            id: id.clone(),
            content_type: content_type.to_string(),
            burn_after_reading: burn,
            keys,
            ciphertext,
        };

        let mut inner = self.inner.write().await;
        if inner.entries.contains_key(&id) {
            return Err(AppError::Internal("Public id collision".to_string()));
        }
        while inner.entries.len() >= self.max_entries {
            match inner.evict_oldest() {
                Some(evicted) => tracing::debug!("Evicted oldest paste {}", evicted),
                None => break,
            }
        }
        inner.push(entry);

        tracing::debug!("Stored paste {} (burn: {})", id, burn);
        Ok(id)
    }

    /// Opens a stored payload.
    ///
    /// A burn-after-reading entry is removed by the same write-locked step
    /// that claims it, so of two racing readers exactly one gets the payload
    /// and the other gets `NotFound`.
    pub async fn fetch(&self, id: &str) -> Result<Paste> {
        {
            let inner = self.inner.read().await;
            let entry = inner.entries.get(id).ok_or(AppError::NotFound)?;
            if !entry.burn_after_reading {
                return self.open(entry);
            }
        }

        // Another reader may have burned it between the two locks.
        let claimed = self.inner.write().await.remove(id);
        let entry = claimed.ok_or(AppError::NotFound)?;
        tracing::debug!("Burned paste {}", id);
        self.open(&entry)
    }

    fn open(&self, entry: &Entry) -> Result<Paste> {
        let data = entry.keys.open(&entry.ciphertext, &self.wrapping_key)?;
        Ok(Paste {
            content_type: entry.content_type.clone(),
            data,
        })
    }

    /// Returns whether `id` is currently stored.
    pub async fn contains(&self, id: &str) -> bool {
        self.inner.read().await.entries.contains_key(id)
    }

    /// Returns the number of stored entries.
    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    /// Returns whether the cache holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn consistent(cache: &EphemeralCache) -> bool {
        let inner = cache.inner.read().await;
        inner.entries.len() == inner.order.len()
            && inner.order.iter().all(|id| inner.entries.contains_key(id))
    }

    #[tokio::test]
    async fn fetch_after_insert_returns_plaintext() {
        let cache = EphemeralCache::new(10, 1024).unwrap();
        let id = cache.insert(b"hello", false, "text/plain").await.unwrap();

        assert!(id.ends_with(".txt"));
        let paste = cache.fetch(&id).await.unwrap();
        assert_eq!(&paste.data[..], b"hello");
        assert_eq!(paste.content_type, "text/plain");
    }

    #[tokio::test]
    async fn eleventh_insert_evicts_the_first() {
        let cache = EphemeralCache::new(10, 1024).unwrap();
        let mut ids = Vec::new();
        for _ in 0..11 {
            ids.push(cache.insert(b"hello", false, "text/plain").await.unwrap());
        }

        assert_eq!(cache.len().await, 10);
        assert!(!cache.contains(&ids[0]).await);
        assert!(cache.contains(&ids[1]).await);
        assert!(cache.contains(&ids[10]).await);
        assert!(matches!(cache.fetch(&ids[0]).await, Err(AppError::NotFound)));
        assert!(consistent(&cache).await);
    }

    #[tokio::test]
    async fn reads_do_not_change_eviction_order() {
        let cache = EphemeralCache::new(2, 1024).unwrap();
        let first = cache.insert(b"one", false, "text/plain").await.unwrap();
        let second = cache.insert(b"two", false, "text/plain").await.unwrap();

        // An LRU would now evict `second`.
        cache.fetch(&first).await.unwrap();
        cache.fetch(&first).await.unwrap();
        let third = cache.insert(b"three", false, "text/plain").await.unwrap();

        assert!(!cache.contains(&first).await);
        assert!(cache.contains(&second).await);
        assert!(cache.contains(&third).await);
    }

    #[tokio::test]
    async fn evictions_follow_insertion_order() {
        let cache = EphemeralCache::new(2, 1024).unwrap();
        let ids: Vec<String> = {
            let mut ids = Vec::new();
            for payload in [b"a", b"b", b"c", b"d"] {
                ids.push(cache.insert(payload, false, "image/dat").await.unwrap());
            }
            ids
        };

        assert!(!cache.contains(&ids[0]).await);
        assert!(!cache.contains(&ids[1]).await);
        assert_eq!(&cache.fetch(&ids[2]).await.unwrap().data[..], b"c");
        assert_eq!(&cache.fetch(&ids[3]).await.unwrap().data[..], b"d");
        assert!(consistent(&cache).await);
    }

    #[tokio::test]
    async fn burned_entry_is_served_once() {
        let cache = EphemeralCache::new(10, 1024).unwrap();
        let id = cache.insert(b"Wololo", true, "trolo/daadda").await.unwrap();

        assert_eq!(&cache.fetch(&id).await.unwrap().data[..], b"Wololo");
        assert!(matches!(cache.fetch(&id).await, Err(AppError::NotFound)));
        assert!(cache.is_empty().await);
        assert!(consistent(&cache).await);
    }

    #[tokio::test]
    async fn kept_entry_is_served_repeatedly() {
        let cache = EphemeralCache::new(10, 1024).unwrap();
        let id = cache.insert(b"Trololoo", false, "wolo/daaddaaaa").await.unwrap();

        for _ in 0..50 {
            assert_eq!(&cache.fetch(&id).await.unwrap().data[..], b"Trololoo");
        }
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let cache = EphemeralCache::new(10, 1024).unwrap();
        assert!(matches!(cache.fetch("nope.txt").await, Err(AppError::NotFound)));
    }

    #[tokio::test]
    async fn oversized_and_empty_payloads_are_rejected() {
        let cache = EphemeralCache::new(10, 4).unwrap();
        assert!(matches!(
            cache.insert(b"12345", false, "text/plain").await,
            Err(AppError::PayloadTooLarge(5))
        ));
        assert!(matches!(
            cache.insert(b"", false, "text/plain").await,
            Err(AppError::Validation(_))
        ));
        assert!(cache.is_empty().await);
    }

    #[test]
    fn zero_capacity_is_rejected() {
        assert!(EphemeralCache::new(0, 1024).is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_readers_burn_exactly_once() {
        let cache = EphemeralCache::new(100, 1024).unwrap();

        for _ in 0..50 {
            let id = cache.insert(b"secret", true, "text/plain").await.unwrap();
            let mut handles = Vec::new();
            for _ in 0..8 {
                let cache = cache.clone();
                let id = id.clone();
                handles.push(tokio::spawn(async move { cache.fetch(&id).await.is_ok() }));
            }

            let mut served = 0;
            for handle in handles {
                if handle.await.unwrap() {
                    served += 1;
                }
            }
            assert_eq!(served, 1);
        }
        assert!(cache.is_empty().await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn capacity_holds_under_concurrent_inserts() {
        let cache = EphemeralCache::new(16, 1024).unwrap();
        let mut handles = Vec::new();
        for task in 0..8 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..25 {
                    let payload = format!("{}-{}", task, i);
                    let id = cache.insert(payload.as_bytes(), i % 3 == 0, "text/plain").await.unwrap();
                    let _ = cache.fetch(&id).await;
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(cache.len().await <= 16);
        assert!(consistent(&cache).await);
    }
}
