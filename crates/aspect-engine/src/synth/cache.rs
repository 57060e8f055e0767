//! Memoization of synthesized types
//!
//! Lookups hit a concurrent map without taking the synthesis lock. A miss
//! takes the lock, checks again, and only then synthesizes, so every key
//! maps to exactly one synthesized value for the lifetime of the cache.

use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{ReentrantMutex, ReentrantMutexGuard};

/// Process-wide lock serializing synthesis
///
/// Re-entrant so that synthesizing a proxy type can synthesize the packet
/// types it needs on the same thread.
pub struct SynthesisLock(ReentrantMutex<()>);

impl SynthesisLock {
    /// Create a new lock
    pub fn new() -> Self {
        Self(ReentrantMutex::new(()))
    }

    /// Acquire the lock
    pub fn lock(&self) -> ReentrantMutexGuard<'_, ()> {
        self.0.lock()
    }
}

impl Default for SynthesisLock {
    fn default() -> Self {
        Self::new()
    }
}

/// Keyed cache of synthesized values
pub struct TypeCache<K, V> {
    entries: DashMap<K, V>,
    lock: Arc<SynthesisLock>,
    syntheses: AtomicU64,
}

impl<K, V> TypeCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create an empty cache synthesizing under `lock`
    pub fn new(lock: Arc<SynthesisLock>) -> Self {
        Self {
            entries: DashMap::new(),
            lock,
            syntheses: AtomicU64::new(0),
        }
    }

    /// Cached value for `key`
    pub fn get(&self, key: &K) -> Option<V> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    /// Cached value for `key`, synthesizing it with `factory` on a miss
    ///
    /// A failing factory publishes nothing; the next request tries again.
    pub fn get_or_create<E, F>(&self, key: K, factory: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        if let Some(hit) = self.get(&key) {
            return Ok(hit);
        }

        let _guard = self.lock.lock();
        if let Some(hit) = self.get(&key) {
            return Ok(hit);
        }

        let value = factory()?;
        self.syntheses.fetch_add(1, Ordering::Relaxed);
        self.entries.insert(key, value.clone());
        Ok(value)
    }

    /// Number of cached entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing is cached
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of times a factory ran successfully
    pub fn synthesis_count(&self) -> u64 {
        self.syntheses.load(Ordering::Relaxed)
    }
}
