//! In-memory secrets backend.
//!
//! A deterministic [`SecretsBackend`] built from fixed list/read tables. It
//! answers exactly like the Vault HTTP API would after status mapping: a path
//! with no listing returns `Ok(None)`, a path with no record returns
//! `Ok(None)`, and scripted status codes turn into the same errors the real
//! client produces.
//!
//! # Example
//!
//! ```rust,ignore
//! use fvf::secrets::InMemoryBackend;
//! use serde_json::json;
//!
//! let backend = InMemoryBackend::new()
//!     .with_list("secret", &["a", "b/"])
//!     .with_list("secret/b", &["c"])
//!     .with_secret("secret/a", json!({"k": "v"}));
//! ```

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use super::backend::{MountTable, Record, SecretsBackend};
use super::error::{Result, SecretsError};

/// In-memory backend for tests and offline use.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    lists: HashMap<String, Record>,
    records: HashMap<String, Record>,
    list_failures: HashMap<String, u16>,
    read_failures: HashMap<String, u16>,
    mounts: Option<MountTable>,
    mounts_failure: Option<u16>,
    latency: Option<Duration>,
    calls: Mutex<Vec<String>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listing whose `keys` are the given child names.
    pub fn with_list(mut self, path: &str, keys: &[&str]) -> Self {
        let keys = keys.iter().map(|k| Value::String(k.to_string())).collect();
        let mut data = Record::new();
        data.insert("keys".to_string(), Value::Array(keys));
        self.lists.insert(path.to_string(), data);
        self
    }

    /// Register a raw listing body, for malformed-response cases.
    pub fn with_list_record(mut self, path: &str, data: Record) -> Self {
        self.lists.insert(path.to_string(), data);
        self
    }

    /// Register the record returned when `path` is read.
    ///
    /// Non-object values are stored as an empty record.
    pub fn with_secret(mut self, path: &str, data: Value) -> Self {
        let record = match data {
            Value::Object(map) => map,
            _ => Record::new(),
        };
        self.records.insert(path.to_string(), record);
        self
    }

    /// Make `list(path)` fail with the given HTTP status.
    pub fn with_list_error(mut self, path: &str, status: u16) -> Self {
        self.list_failures.insert(path.to_string(), status);
        self
    }

    /// Make `read(path)` fail with the given HTTP status.
    pub fn with_read_error(mut self, path: &str, status: u16) -> Self {
        self.read_failures.insert(path.to_string(), status);
        self
    }

    /// Answer `list_mounts()` with this table.
    pub fn with_mounts(mut self, mounts: MountTable) -> Self {
        self.mounts = Some(mounts);
        self.mounts_failure = None;
        self
    }

    /// Make `list_mounts()` fail with the given HTTP status.
    pub fn with_mounts_error(mut self, status: u16) -> Self {
        self.mounts_failure = Some(status);
        self
    }

    /// Delay every call, to exercise deadlines and cancellation.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Every call made so far, as `"<op> <path>"`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Number of calls whose op matches (`"list"`, `"read"`, `"mounts"`).
    pub fn call_count(&self, op: &str) -> usize {
        self.calls().iter().filter(|c| c.split(' ').next() == Some(op)).count()
    }

    async fn record_call(&self, op: &str, path: &str) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(format!("{} {}", op, path).trim_end().to_string());
        }
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

fn status_error(path: &str, status: u16) -> SecretsError {
    if status == 403 {
        SecretsError::permission_denied(path, "permission denied")
    } else {
        SecretsError::api(path, status, "scripted failure")
    }
}

#[async_trait]
impl SecretsBackend for InMemoryBackend {
    async fn list(&self, path: &str) -> Result<Option<Record>> {
        self.record_call("list", path).await;
        if let Some(status) = self.list_failures.get(path) {
            return Err(status_error(path, *status));
        }
        Ok(self.lists.get(path).cloned())
    }

    async fn read(&self, path: &str) -> Result<Option<Record>> {
        self.record_call("read", path).await;
        if let Some(status) = self.read_failures.get(path) {
            return Err(status_error(path, *status));
        }
        Ok(self.records.get(path).cloned())
    }

    async fn list_mounts(&self) -> Result<MountTable> {
        self.record_call("mounts", "").await;
        if let Some(status) = self.mounts_failure {
            return Err(status_error("sys/mounts", status));
        }
        Ok(self.mounts.clone().unwrap_or_default())
    }
}
