//! Request-scoped tenant scoping registry.
//!
//! Holds whether tenant scoping is active for the current request and the
//! `(column, value)` constraints every tenant-scoped read must apply. This
//! is an explicit value created per request and threaded through the
//! handlers, not a process-wide singleton, so scope state can never leak
//! across requests.

use std::sync::{Arc, Mutex};

use serde::Serialize;
use serde_json::Value;

use gatekeeper_core::TenantId;

/// Default scoping column.
pub const TENANT_KEY: &str = "tenant_id";

#[derive(Debug, Default)]
struct ScopeState {
    enabled: bool,
    bindings: Vec<(String, Value)>,
}

/// Cheaply-cloneable handle to one request's scoping state.
///
/// Contract for the query-scope hook: if enabled and bound, filter; if
/// enabled and unbound, return nothing; if disabled, do not filter.
#[derive(Debug, Clone, Default)]
pub struct RequestScope {
    state: Arc<Mutex<ScopeState>>,
}

impl RequestScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Turn scoping on. Idempotent; does not touch existing bindings.
    pub fn enable(&self) {
        self.state.lock().unwrap().enabled = true;
    }

    /// Turn scoping off and drop the bindings: the explicit "no scoping
    /// needed" state.
    pub fn disable(&self) {
        let mut state = self.state.lock().unwrap();
        state.enabled = false;
        state.bindings.clear();
    }

    pub fn is_enabled(&self) -> bool {
        self.state.lock().unwrap().enabled
    }

    /// Register one scope constraint; overwrites a prior value for the same
    /// key, keeping its original position.
    pub fn add_tenant<V: Serialize>(&self, key: &str, value: V) {
        let value = match serde_json::to_value(value) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(key, error = %e, "unserializable scope binding ignored");
                return;
            }
        };
        let mut state = self.state.lock().unwrap();
        if let Some(slot) = state.bindings.iter_mut().find(|(k, _)| k == key) {
            slot.1 = value;
        } else {
            state.bindings.push((key.to_string(), value));
        }
    }

    pub fn has_tenant(&self, key: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .bindings
            .iter()
            .any(|(k, _)| k == key)
    }

    pub fn get_tenant_id(&self, key: &str) -> Option<Value> {
        self.state
            .lock()
            .unwrap()
            .bindings
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }

    /// The bound [`TenantId`] under the default column, if any.
    pub fn bound_tenant(&self) -> Option<TenantId> {
        self.get_tenant_id(TENANT_KEY)
            .and_then(|v| serde_json::from_value(v).ok())
    }

    pub fn bindings(&self) -> Vec<(String, Value)> {
        self.state.lock().unwrap().bindings.clone()
    }

    /// The query-scope hook.
    ///
    /// `field` extracts the scoping column's value from an item; items are
    /// kept only when every registered binding matches. Enabled but unbound
    /// scope keeps nothing (fail closed), never the full unscoped set.
    pub fn apply<T, F>(&self, items: Vec<T>, field: F) -> Vec<T>
    where
        F: Fn(&T, &str) -> Option<Value>,
    {
        let (enabled, bindings) = {
            let state = self.state.lock().unwrap();
            (state.enabled, state.bindings.clone())
        };

        if !enabled {
            return items;
        }
        if bindings.is_empty() {
            return Vec::new();
        }

        items
            .into_iter()
            .filter(|item| {
                bindings
                    .iter()
                    .all(|(key, value)| field(item, key).as_ref() == Some(value))
            })
            .collect()
    }
}
