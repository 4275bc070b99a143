//! Session storage abstraction.
//!
//! The guards take an explicit, injected [`SessionStore`] handle instead of
//! reaching for a framework facade, so the whole subsystem is testable
//! without an HTTP bootstrap. Values are JSON so snapshots keep their exact
//! wire shape regardless of backend.

use std::collections::BTreeMap;
use std::sync::Mutex;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// One client's session: a mutable key/value map tied to the session cookie.
///
/// All writes within a request are applied in place, synchronously, before
/// the response is produced. Concurrent requests from the same client are
/// last-write-wins; see DESIGN.md.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;
    fn put(&self, key: &str, value: Value);
    fn remove(&self, key: &str) -> Option<Value>;
    fn clear(&self);
    fn keys(&self) -> Vec<String>;

    fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

/// Typed accessors over the JSON payloads.
pub trait SessionExt {
    fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T>;
    fn put_as<T: Serialize>(&self, key: &str, value: &T);
}

impl<S: SessionStore + ?Sized> SessionExt for S {
    fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get(key)
            .and_then(|value| serde_json::from_value(value).ok())
    }

    fn put_as<T: Serialize>(&self, key: &str, value: &T) {
        match serde_json::to_value(value) {
            Ok(json) => self.put(key, json),
            Err(e) => tracing::warn!(key, error = %e, "failed to serialize session value"),
        }
    }
}

/// In-memory session backend used by tests and the dev server.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    entries: Mutex<BTreeMap<String, Value>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    fn put(&self, key: &str, value: Value) {
        self.entries.lock().unwrap().insert(key.to_string(), value);
    }

    fn remove(&self, key: &str) -> Option<Value> {
        self.entries.lock().unwrap().remove(key)
    }

    fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }

    fn keys(&self) -> Vec<String> {
        self.entries.lock().unwrap().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn put_get_remove_round_trip() {
        let session = MemorySessionStore::new();
        session.put("a", json!({"x": 1}));
        assert_eq!(session.get("a"), Some(json!({"x": 1})));
        assert_eq!(session.remove("a"), Some(json!({"x": 1})));
        assert_eq!(session.get("a"), None);
        assert_eq!(session.remove("a"), None);
    }

    #[test]
    fn typed_accessors_use_serde() {
        #[derive(serde::Serialize, serde::Deserialize, PartialEq, Debug)]
        struct Snapshot {
            id: u32,
            email: String,
        }

        let session = MemorySessionStore::new();
        let snapshot = Snapshot {
            id: 7,
            email: "op@example.com".to_string(),
        };
        session.put_as("snap", &snapshot);
        assert_eq!(session.get_as::<Snapshot>("snap"), Some(snapshot));
        // Shape mismatch degrades to None rather than panicking.
        assert_eq!(session.get_as::<Vec<u8>>("snap"), None);
    }

    #[test]
    fn clear_empties_the_map() {
        let session = MemorySessionStore::new();
        session.put("a", json!(1));
        session.put("b", json!(2));
        session.clear();
        assert!(session.keys().is_empty());
    }
}
