//! Recursive discovery of secrets beneath a starting path.
//!
//! The walker lists a path; every child ending in `/` is a folder and is
//! descended into, every other child is a leaf secret. A path that has no
//! listing is itself a leaf. Depth limits, the [`Filter`] and the optional
//! value fetch are applied as leaves are reached.
//!
//! # Depth
//!
//! With `max_depth == 0` there is no limit. Otherwise the start path is depth
//! 0, a folder is not descended into if its depth would reach `max_depth`, and
//! a leaf is dropped if its depth would exceed `max_depth`.
//!
//! # Output
//!
//! Results go to an [`ItemSink`]: a `Vec` for batch walks, or a bounded
//! channel for streaming walks where the consumer sees items as they appear.

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, Instrument};

use super::control::WalkControl;
use super::filter::Filter;
use super::paths::{base_name, join_non_empty, list_api_path, logical_path, split_mount};
use super::reader::read_secret;
use crate::secrets::{KvVersion, Record, Result, SecretsBackend, SecretsError};

/// One discovered secret.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoundItem {
    /// Logical path, `<mount>/<inner>`.
    pub path: String,
    /// Normalized key/value payload, when values were requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Record>,
}

impl FoundItem {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into(), value: None }
    }

    pub fn with_value(path: impl Into<String>, value: Record) -> Self {
        Self { path: path.into(), value: Some(value) }
    }
}

/// Parameters for a single walk.
#[derive(Debug, Clone)]
pub struct WalkOptions {
    pub version: KvVersion,
    /// `0` means unlimited.
    pub max_depth: usize,
    pub filter: Filter,
    /// Fetch and attach each leaf's payload.
    pub with_values: bool,
}

impl WalkOptions {
    pub fn new(version: KvVersion) -> Self {
        Self { version, max_depth: 0, filter: Filter::all(), with_values: false }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_values(mut self, with_values: bool) -> Self {
        self.with_values = with_values;
        self
    }

    fn descends_into(&self, child_depth: usize) -> bool {
        self.max_depth == 0 || child_depth < self.max_depth
    }

    fn keeps_leaf_at(&self, leaf_depth: usize) -> bool {
        self.max_depth == 0 || leaf_depth <= self.max_depth
    }
}

/// Destination for discovered items.
#[async_trait]
pub trait ItemSink: Send {
    async fn emit(&mut self, item: FoundItem) -> Result<()>;
}

#[async_trait]
impl ItemSink for Vec<FoundItem> {
    async fn emit(&mut self, item: FoundItem) -> Result<()> {
        self.push(item);
        Ok(())
    }
}

/// Blocks while the channel is full; a dropped receiver stops the walk.
#[async_trait]
impl ItemSink for mpsc::Sender<FoundItem> {
    async fn emit(&mut self, item: FoundItem) -> Result<()> {
        self.send(item).await.map_err(|_| SecretsError::Cancelled)
    }
}

struct Walker<'a, B: ?Sized> {
    backend: &'a B,
    options: &'a WalkOptions,
    control: &'a WalkControl,
    mount: &'a str,
}

impl<'a, B> Walker<'a, B>
where
    B: SecretsBackend + ?Sized,
{
    fn recurse<'s, S>(&'s self, inner: String, depth: usize, sink: &'s mut S) -> BoxFuture<'s, Result<()>>
    where
        S: ItemSink,
    {
        async move {
            let list_path = list_api_path(self.mount, &inner, self.options.version);
            let Some(listing) = self.control.guard(self.backend.list(&list_path)).await? else {
                return self.handle_leaf(&inner, sink).await;
            };

            let keys = match listing.get("keys") {
                Some(Value::Array(keys)) => keys,
                _ => {
                    return Err(SecretsError::unexpected_response(
                        &list_path,
                        "listing has no keys array",
                    ))
                }
            };
            debug!(path = %list_path, depth, children = keys.len(), "Listed folder");

            let next_depth = depth + 1;
            for key in keys {
                self.control.checkpoint()?;

                let Some(key) = key.as_str().filter(|k| !k.is_empty()) else {
                    debug!(path = %list_path, "Skipping non-string listing key");
                    continue;
                };

                match key.strip_suffix('/') {
                    Some(folder) => {
                        if !self.options.descends_into(next_depth) {
                            continue;
                        }
                        let child = join_non_empty(&[inner.trim_end_matches('/'), folder]);
                        self.recurse(child, next_depth, sink).await?;
                    }
                    None => {
                        if !self.options.keeps_leaf_at(next_depth) {
                            continue;
                        }
                        let child = join_non_empty(&[inner.trim_end_matches('/'), key]);
                        self.handle_leaf(&child, sink).await?;
                    }
                }
            }
            Ok(())
        }
        .boxed()
    }

    async fn handle_leaf<S>(&self, inner: &str, sink: &mut S) -> Result<()>
    where
        S: ItemSink,
    {
        let full_path = logical_path(self.mount, inner);

        // Values are read before filtering so every leaf costs one read.
        let value = if self.options.with_values {
            Some(read_secret(self.backend, self.mount, inner, self.options.version, self.control).await?)
        } else {
            None
        };

        if !self.options.filter.matches(base_name(&full_path), &full_path) {
            return Ok(());
        }
        sink.emit(FoundItem { path: full_path, value }).await
    }
}

/// Walks beneath `start` and sends every matching secret to `sink`.
///
/// `start` is a logical path whose first segment is the mount. Any backend
/// error, cancellation or deadline aborts the walk.
pub async fn walk_into<B, S>(
    backend: &B,
    start: &str,
    options: &WalkOptions,
    control: &WalkControl,
    sink: &mut S,
) -> Result<()>
where
    B: SecretsBackend + ?Sized,
    S: ItemSink,
{
    let (mount, inner) = split_mount(start);
    let walker = Walker { backend, options, control, mount };
    walker
        .recurse(inner.to_string(), 0, sink)
        .instrument(crate::walk_span!("walk", start, version = %options.version))
        .await
}

/// Batch walk: every matching secret beneath `start`, sorted by path.
pub async fn walk_vault<B>(
    backend: &B,
    start: &str,
    options: &WalkOptions,
    control: &WalkControl,
) -> Result<Vec<FoundItem>>
where
    B: SecretsBackend + ?Sized,
{
    let mut items = Vec::new();
    walk_into(backend, start, options, control, &mut items).await?;
    items.sort_by(|a, b| a.path.cmp(&b.path));
    info!(start = %start, found = items.len(), "Walk complete");
    Ok(items)
}

/// Streaming walk: matching secrets are sent to `tx` as discovered.
///
/// Send blocks while the channel is full. If the receiver is dropped the walk
/// stops with [`SecretsError::Cancelled`].
pub async fn walk_vault_stream<B>(
    backend: &B,
    start: &str,
    options: &WalkOptions,
    control: &WalkControl,
    mut tx: mpsc::Sender<FoundItem>,
) -> Result<()>
where
    B: SecretsBackend + ?Sized,
{
    walk_into(backend, start, options, control, &mut tx).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    use crate::secrets::InMemoryBackend;

    fn paths(items: &[FoundItem]) -> Vec<&str> {
        items.iter().map(|i| i.path.as_str()).collect()
    }

    fn v1_tree() -> InMemoryBackend {
        InMemoryBackend::new()
            .with_list("secret", &["app/", "db"])
            .with_list("secret/app", &["config", "api/"])
            .with_list("secret/app/api", &["key"])
            .with_secret("secret/db", json!({"password": "pw"}))
            .with_secret("secret/app/config", json!({"url": "u"}))
            .with_secret("secret/app/api/key", json!({"token": "t"}))
    }

    #[tokio::test]
    async fn test_walk_unlimited_depth_sorted() {
        let backend = v1_tree();
        let items = walk_vault(&backend, "secret", &WalkOptions::new(KvVersion::V1), &WalkControl::new())
            .await
            .unwrap();
        assert_eq!(paths(&items), vec!["secret/app/api/key", "secret/app/config", "secret/db"]);
        assert!(items.iter().all(|i| i.value.is_none()));
        assert_eq!(backend.call_count("read"), 0);
    }

    #[tokio::test]
    async fn test_depth_one_keeps_only_top_level_leaves() {
        let backend = InMemoryBackend::new().with_list("secret", &["a/", "b"]);
        let options = WalkOptions::new(KvVersion::V1).with_max_depth(1);
        let items = walk_vault(&backend, "secret", &options, &WalkControl::new()).await.unwrap();
        assert_eq!(paths(&items), vec!["secret/b"]);
        assert!(!backend.calls().contains(&"list secret/a".to_string()));
    }

    #[tokio::test]
    async fn test_depth_two_descends_one_level() {
        let backend = v1_tree();
        let options = WalkOptions::new(KvVersion::V1).with_max_depth(2);
        let items = walk_vault(&backend, "secret", &options, &WalkControl::new()).await.unwrap();
        assert_eq!(paths(&items), vec!["secret/app/config", "secret/db"]);
    }

    #[tokio::test]
    async fn test_v2_translates_list_and_read_paths() {
        let backend = InMemoryBackend::new()
            .with_list("kv/metadata", &["app/"])
            .with_list("kv/metadata/app", &["config"])
            .with_secret("kv/data/app/config", json!({"data": {"a": "b"}, "metadata": {}}));
        let options = WalkOptions::new(KvVersion::V2).with_values(true);

        let items = walk_vault(&backend, "kv", &options, &WalkControl::new()).await.unwrap();
        assert_eq!(paths(&items), vec!["kv/app/config"]);
        assert_eq!(items[0].value.clone().map(Value::Object), Some(json!({"a": "b"})));
        assert!(backend.calls().contains(&"read kv/data/app/config".to_string()));
    }

    #[tokio::test]
    async fn test_start_at_leaf_yields_the_leaf() {
        let backend = v1_tree();
        let items =
            walk_vault(&backend, "secret/db", &WalkOptions::new(KvVersion::V1), &WalkControl::new())
                .await
                .unwrap();
        assert_eq!(paths(&items), vec!["secret/db"]);
    }

    #[tokio::test]
    async fn test_filter_applied_to_leaves() {
        let backend = v1_tree();
        let options = WalkOptions::new(KvVersion::V1).with_filter(Filter::all().with_name_part("CONF"));
        let items = walk_vault(&backend, "secret", &options, &WalkControl::new()).await.unwrap();
        assert_eq!(paths(&items), vec!["secret/app/config"]);
    }

    #[tokio::test]
    async fn test_values_fetched_before_filtering() {
        let backend = v1_tree();
        let options = WalkOptions::new(KvVersion::V1)
            .with_values(true)
            .with_filter(Filter::all().with_name_part("db"));
        let items = walk_vault(&backend, "secret", &options, &WalkControl::new()).await.unwrap();

        assert_eq!(paths(&items), vec!["secret/db"]);
        assert_eq!(backend.call_count("read"), 3);
    }

    #[tokio::test]
    async fn test_listing_without_keys_is_unexpected() {
        let mut body = Record::new();
        body.insert("keys".to_string(), json!("not-an-array"));
        let backend = InMemoryBackend::new().with_list_record("secret", body);

        let err = walk_vault(&backend, "secret", &WalkOptions::new(KvVersion::V1), &WalkControl::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SecretsError::UnexpectedResponse { ref path, .. } if path == "secret"));
    }

    #[tokio::test]
    async fn test_list_error_aborts_walk() {
        let backend = v1_tree().with_list_error("secret/app", 500);
        let err = walk_vault(&backend, "secret", &WalkOptions::new(KvVersion::V1), &WalkControl::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SecretsError::Api { status: 500, ref path, .. } if path == "secret/app"));
    }

    #[tokio::test]
    async fn test_cancelled_walk_stops() {
        let backend = v1_tree();
        let control = WalkControl::new();
        control.cancel();
        let err = walk_vault(&backend, "secret", &WalkOptions::new(KvVersion::V1), &control)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(backend.call_count("list"), 0);
    }

    struct CancelOnFirst {
        control: WalkControl,
        items: Vec<FoundItem>,
    }

    #[async_trait]
    impl ItemSink for CancelOnFirst {
        async fn emit(&mut self, item: FoundItem) -> Result<()> {
            self.items.push(item);
            self.control.cancel();
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_cancel_mid_listing_stops_before_next_child() {
        let keys: Vec<String> = (0..50).map(|i| format!("leaf-{:02}", i)).collect();
        let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
        let backend = InMemoryBackend::new().with_list("secret", &keys);
        let control = WalkControl::new();
        let mut sink = CancelOnFirst { control: control.clone(), items: Vec::new() };

        let err = walk_into(&backend, "secret", &WalkOptions::new(KvVersion::V1), &control, &mut sink)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(paths(&sink.items), vec!["secret/leaf-00"]);
        assert_eq!(backend.call_count("list"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_interrupts_slow_listing() {
        let backend = v1_tree().with_latency(Duration::from_secs(10));
        let control = WalkControl::with_timeout(Duration::from_secs(1));
        let err = walk_vault(&backend, "secret", &WalkOptions::new(KvVersion::V1), &control)
            .await
            .unwrap_err();
        assert!(err.is_deadline_exceeded());
    }

    #[tokio::test]
    async fn test_stream_delivers_all_items() {
        let backend = v1_tree();
        let (tx, mut rx) = mpsc::channel(1);
        let options = WalkOptions::new(KvVersion::V1);
        let control = WalkControl::new();

        let walk = walk_vault_stream(&backend, "secret", &options, &control, tx);
        let collect = async {
            let mut got = Vec::new();
            while let Some(item) = rx.recv().await {
                got.push(item.path);
            }
            got
        };
        let (result, mut got) = tokio::join!(walk, collect);

        result.unwrap();
        got.sort();
        assert_eq!(got, vec!["secret/app/api/key", "secret/app/config", "secret/db"]);
    }

    #[tokio::test]
    async fn test_stream_stops_when_receiver_dropped() {
        let backend = v1_tree();
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let err = walk_vault_stream(
            &backend,
            "secret",
            &WalkOptions::new(KvVersion::V1),
            &WalkControl::new(),
            tx,
        )
        .await
        .unwrap_err();
        assert!(err.is_cancelled());
    }

    #[test]
    fn test_found_item_serialization_omits_missing_value() {
        let item = FoundItem::new("secret/a");
        assert_eq!(serde_json::to_value(&item).unwrap(), json!({"path": "secret/a"}));

        let mut value = Record::new();
        value.insert("k".to_string(), json!("v"));
        let item = FoundItem::with_value("secret/a", value);
        assert_eq!(serde_json::to_value(&item).unwrap(), json!({"path": "secret/a", "value": {"k": "v"}}));
    }
}
