//! TTL cache for guard statistics and slug lookups.
//!
//! Entries are invalidated by explicit operations (logout-all, tenant-scope
//! changes), never automatically on data mutation. Callers mutating
//! tenant/user data that feeds these stats must invalidate explicitly.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde_json::Value;

use crate::config::CacheConfig;

#[derive(Debug)]
pub struct StatsCache {
    enabled: bool,
    ttl: Duration,
    entries: Mutex<HashMap<String, (Instant, Value)>>,
}

impl StatsCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            enabled: config.enabled,
            ttl: Duration::from_secs(config.ttl_secs),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// A cache that never stores anything.
    pub fn disabled() -> Self {
        Self::new(&CacheConfig {
            enabled: false,
            ttl_secs: 0,
        })
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        if !self.enabled {
            return None;
        }
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some((stored_at, value)) if stored_at.elapsed() < self.ttl => Some(value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, key: impl Into<String>, value: Value) {
        if !self.enabled {
            return;
        }
        self.entries
            .lock()
            .unwrap()
            .insert(key.into(), (Instant::now(), value));
    }

    /// Drop every entry whose key starts with `prefix`.
    pub fn invalidate_prefix(&self, prefix: &str) {
        self.entries
            .lock()
            .unwrap()
            .retain(|key, _| !key.starts_with(prefix));
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }
}
