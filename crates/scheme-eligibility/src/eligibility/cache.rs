use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use lru::LruCache;

use super::domain::{Rule, SchemeId};

type CacheKey = (SchemeId, NaiveDate);

/// Read-through LRU cache of active rule lists keyed by scheme and evaluation day.
///
/// Entries for a scheme are dropped whenever one of its rules is written. A capacity of
/// zero disables caching.
#[derive(Debug)]
pub struct ActiveRuleCache {
    generation: AtomicU64,
    entries: Option<Mutex<LruCache<CacheKey, Arc<Vec<Rule>>>>>,
}

impl ActiveRuleCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            generation: AtomicU64::new(0),
            entries: NonZeroUsize::new(capacity).map(|capacity| Mutex::new(LruCache::new(capacity))),
        }
    }

    pub fn capacity(&self) -> usize {
        self.entries
            .as_ref()
            .and_then(|entries| entries.lock().ok().map(|entries| entries.cap().get()))
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.entries
            .as_ref()
            .and_then(|entries| entries.lock().ok().map(|entries| entries.len()))
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the cached list or loads, stores and returns a fresh one.
    pub fn get_or_load<E, F>(
        &self,
        scheme_id: &SchemeId,
        as_of: NaiveDate,
        load: F,
    ) -> Result<Arc<Vec<Rule>>, E>
    where
        F: FnOnce() -> Result<Vec<Rule>, E>,
    {
        let Some(entries) = &self.entries else {
            return load().map(Arc::new);
        };

        let key = (scheme_id.clone(), as_of);
        if let Ok(mut entries) = entries.lock() {
            if let Some(hit) = entries.get(&key) {
                return Ok(hit.clone());
            }
        }

        let generation = self.generation.load(Ordering::Acquire);
        let loaded = Arc::new(load()?);
        if let Ok(mut entries) = entries.lock() {
            // a write landed while loading; the loaded list may predate it
            if self.generation.load(Ordering::Acquire) == generation {
                entries.put(key, loaded.clone());
            }
        }
        Ok(loaded)
    }

    pub fn invalidate_scheme(&self, scheme_id: &SchemeId) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        let Some(entries) = &self.entries else {
            return;
        };
        if let Ok(mut entries) = entries.lock() {
            let stale: Vec<CacheKey> = entries
                .iter()
                .filter(|((cached_scheme, _), _)| cached_scheme == scheme_id)
                .map(|(key, _)| key.clone())
                .collect();
            for key in stale {
                entries.pop(&key);
            }
        }
    }
}
