//! Secrets backend trait and types
//!
//! Defines the remote capabilities the search engine depends on. The real
//! implementation talks to Vault over HTTP; tests inject [`InMemoryBackend`].
//!
//! [`InMemoryBackend`]: super::memory::InMemoryBackend

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use super::error::Result;

/// A string-keyed JSON record as returned in the `data` field of a response.
pub type Record = Map<String, Value>;

/// Mount listing keyed by mount path with its trailing slash (e.g. `"kv/"`).
pub type MountTable = BTreeMap<String, Mount>;

/// Engine type of the mounts this tool searches.
pub const KV_ENGINE: &str = "kv";

/// KV storage layout in effect for a mount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KvVersion {
    /// Flat layout: list and read at `<mount>/<path>`
    V1,
    /// Versioned layout: list under `metadata/`, read under `data/`
    V2,
}

impl KvVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::V1 => "1",
            Self::V2 => "2",
        }
    }

    pub fn is_v2(&self) -> bool {
        matches!(self, Self::V2)
    }

    /// Layout implied by a mount's options map: `version = "2"` means v2.
    pub fn from_options(options: &HashMap<String, String>) -> Self {
        match options.get("version").map(String::as_str) {
            Some("2") => Self::V2,
            _ => Self::V1,
        }
    }
}

impl FromStr for KvVersion {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "1" | "v1" => Ok(Self::V1),
            "2" | "v2" => Ok(Self::V2),
            _ => Err(format!("Unknown KV version: {}", s)),
        }
    }
}

impl fmt::Display for KvVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.as_str())
    }
}

/// A secrets engine mounted at the top level of the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mount {
    /// Engine type (`"kv"`, `"pki"`, ...)
    #[serde(rename = "type", default)]
    pub mount_type: String,

    /// Engine options; KV mounts carry `version`
    #[serde(default, deserialize_with = "null_as_empty")]
    pub options: HashMap<String, String>,
}

// Non-KV engines report `"options": null`.
fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<HashMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<HashMap<String, String>>::deserialize(deserializer)?.unwrap_or_default())
}

impl Mount {
    pub fn new(mount_type: impl Into<String>) -> Self {
        Self { mount_type: mount_type.into(), options: HashMap::new() }
    }

    /// Set an engine option.
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn is_kv(&self) -> bool {
        self.mount_type == KV_ENGINE
    }

    pub fn kv_version(&self) -> KvVersion {
        KvVersion::from_options(&self.options)
    }
}

/// Remote capabilities consumed by the walker, the value reader and mount
/// discovery.
///
/// Implementations must be Send + Sync so a walk can run in a spawned task.
#[async_trait]
pub trait SecretsBackend: Send + Sync {
    /// List the children of `path`.
    ///
    /// Returns `Ok(None)` when the server has no listing for the path, which
    /// is how a concrete secret (as opposed to a directory) answers a list.
    async fn list(&self, path: &str) -> Result<Option<Record>>;

    /// Read the record stored at `path`; `Ok(None)` when nothing is there.
    async fn read(&self, path: &str) -> Result<Option<Record>>;

    /// List every mount via the privileged `sys/mounts` endpoint.
    async fn list_mounts(&self) -> Result<MountTable>;
}

#[async_trait]
impl<B: SecretsBackend + ?Sized> SecretsBackend for std::sync::Arc<B> {
    async fn list(&self, path: &str) -> Result<Option<Record>> {
        (**self).list(path).await
    }

    async fn read(&self, path: &str) -> Result<Option<Record>> {
        (**self).read(path).await
    }

    async fn list_mounts(&self) -> Result<MountTable> {
        (**self).list_mounts().await
    }
}
