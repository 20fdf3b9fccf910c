//! Routing a search request to one or more walks.
//!
//! A request either covers every KV mount, an explicit list of paths, or a
//! single path. Each walk root gets its own layout from the
//! [`VersionPolicy`]; results from all roots go to the same sink.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::control::WalkControl;
use super::detect::VersionPolicy;
use super::filter::Filter;
use super::mounts::list_mounts_with_fallback;
use super::walker::{walk_into, FoundItem, ItemSink, WalkOptions};
use crate::secrets::{KvVersion, Result, SecretsBackend, SecretsError};

/// Capacity of the channel used by [`stream_items`].
pub const STREAM_CAPACITY: usize = 256;

/// What a search covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchTarget {
    /// Every mount of type `kv`.
    AllMounts,
    /// One starting path.
    Path(String),
    /// Several starting paths, walked in order.
    Paths(Vec<String>),
}

impl SearchTarget {
    /// Picks the target from the `--path` and `--paths` inputs.
    ///
    /// A non-empty path list wins over a single path; with neither, every
    /// mount is searched.
    pub fn from_inputs(path: Option<&str>, paths: Option<&str>) -> Self {
        let list = paths.map(parse_path_list).unwrap_or_default();
        if !list.is_empty() {
            return Self::Paths(list);
        }
        match path.map(str::trim).filter(|p| !p.is_empty()) {
            Some(path) => Self::Path(path.to_string()),
            None => Self::AllMounts,
        }
    }
}

/// Splits a comma-separated path list, trimming entries and dropping blanks.
pub fn parse_path_list(raw: &str) -> Vec<String> {
    raw.split(',').map(str::trim).filter(|p| !p.is_empty()).map(str::to_string).collect()
}

/// A complete search: where to look, how to pick layouts, what to keep.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub target: SearchTarget,
    pub policy: VersionPolicy,
    pub max_depth: usize,
    pub filter: Filter,
    pub with_values: bool,
}

impl SearchRequest {
    pub fn new(target: SearchTarget) -> Self {
        Self {
            target,
            policy: VersionPolicy::default(),
            max_depth: 0,
            filter: Filter::all(),
            with_values: false,
        }
    }

    pub fn with_policy(mut self, policy: VersionPolicy) -> Self {
        self.policy = policy;
        self
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

    fn walk_options(&self, version: KvVersion) -> WalkOptions {
        WalkOptions::new(version)
            .with_max_depth(self.max_depth)
            .with_filter(self.filter.clone())
            .with_values(self.with_values)
    }
}

/// Runs every walk of `request` into `sink`, stopping at the first failure.
///
/// Errors from multi-root searches carry the root that failed. A mount
/// listing failure is returned unwrapped.
pub async fn run_search<B, S>(
    backend: &B,
    request: &SearchRequest,
    control: &WalkControl,
    sink: &mut S,
) -> Result<()>
where
    B: SecretsBackend + ?Sized,
    S: ItemSink,
{
    match &request.target {
        SearchTarget::AllMounts => {
            let mounts = control.guard(list_mounts_with_fallback(backend)).await?;
            for (name, mount) in &mounts {
                let root = name.trim_end_matches('/');
                if !mount.is_kv() {
                    debug!(mount = %root, mount_type = %mount.mount_type, "Skipping non-KV mount");
                    continue;
                }
                let version = request.policy.resolve_for_mount(mount);
                walk_into(backend, root, &request.walk_options(version), control, sink)
                    .await
                    .map_err(|e| SecretsError::walk(format!("mount {}", root), e))?;
            }
        }
        SearchTarget::Paths(paths) => {
            for path in paths {
                let version = request.policy.resolve_for_path(backend, path, control).await;
                walk_into(backend, path, &request.walk_options(version), control, sink)
                    .await
                    .map_err(|e| SecretsError::walk(format!("path {}", path), e))?;
            }
        }
        SearchTarget::Path(path) => {
            let version = request.policy.resolve_for_path(backend, path, control).await;
            walk_into(backend, path, &request.walk_options(version), control, sink).await?;
        }
    }
    Ok(())
}

/// Batch search: every matching secret across all roots, sorted by path.
pub async fn collect_items<B>(
    backend: &B,
    request: &SearchRequest,
    control: &WalkControl,
) -> Result<Vec<FoundItem>>
where
    B: SecretsBackend + ?Sized,
{
    let mut items = Vec::new();
    run_search(backend, request, control, &mut items).await?;
    items.sort_by(|a, b| a.path.cmp(&b.path));
    info!(found = items.len(), "Search complete");
    Ok(items)
}

/// Streaming search on a background task.
///
/// Items arrive on the receiver as they are discovered, unordered. The task
/// ends when every root is walked, on the first error, when `control` fires,
/// or when the receiver is dropped.
pub fn stream_items<B>(
    backend: Arc<B>,
    request: SearchRequest,
    control: WalkControl,
) -> (mpsc::Receiver<FoundItem>, JoinHandle<Result<()>>)
where
    B: SecretsBackend + ?Sized + 'static,
{
    let (mut tx, rx) = mpsc::channel(STREAM_CAPACITY);
    let handle = tokio::spawn(async move {
        let result = run_search(backend.as_ref(), &request, &control, &mut tx).await;
        if let Err(err) = &result {
            debug!(error = %err, "Streaming search ended early");
        }
        result
    });
    (rx, handle)
}
