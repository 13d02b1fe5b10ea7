//! Memo of per-user aggregate vectors.
//!
//! Entries are keyed by user and validated against the content hash of the
//! text that produced them, so a user whose history changed is re-embedded and
//! everyone else is served from memory.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::conversations::UserId;

pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

struct CachedProfile {
    content_hash: [u8; 32],
    vector: Arc<Vec<f32>>,
}

pub struct ProfileCache {
    entries: Mutex<HashMap<UserId, CachedProfile>>,
    capacity: usize,
}

impl ProfileCache {
    /// A capacity of 0 disables caching.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity,
        }
    }

    /// Cached vector for `user` if it was built from content with this hash.
    pub fn get(&self, user: &UserId, content_hash: &[u8; 32]) -> Option<Arc<Vec<f32>>> {
        let entries = self.entries.lock().ok()?;
        entries
            .get(user)
            .filter(|entry| &entry.content_hash == content_hash)
            .map(|entry| entry.vector.clone())
    }

    pub fn insert(&self, user: UserId, content_hash: [u8; 32], vector: Arc<Vec<f32>>) {
        if self.capacity == 0 {
            return;
        }

        let Ok(mut entries) = self.entries.lock() else {
            log::warn!("profile cache lock poisoned, skipping insert");
            return;
        };

        if entries.len() >= self.capacity && !entries.contains_key(&user) {
            log::debug!("profile cache full ({} users), clearing", entries.len());
            entries.clear();
        }

        entries.insert(
            user,
            CachedProfile {
                content_hash,
                vector,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ProfileCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}
