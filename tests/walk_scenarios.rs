//! End-to-end search scenarios through the public API with an in-memory server.

use fvf::search::{
    collect_items, list_mounts_with_fallback, walk_vault, Filter, SearchRequest, SearchTarget,
    WalkControl, WalkOptions,
};
use fvf::secrets::{InMemoryBackend, KvVersion, Mount, MountTable};
use serde_json::json;
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};

fn paths(items: &[fvf::FoundItem]) -> Vec<String> {
    items.iter().map(|i| i.path.clone()).collect()
}

#[tokio::test]
async fn test_depth_limit_excludes_nested_leaves() {
    let backend = InMemoryBackend::new()
        .with_list("secret", &["a/", "b"])
        .with_list("secret/a", &["c"]);

    let options = WalkOptions::new(KvVersion::V1).with_max_depth(1);
    let items = assert_ok!(walk_vault(&backend, "secret", &options, &WalkControl::new()).await);
    assert_eq!(paths(&items), vec!["secret/b"]);
}

#[tokio::test]
async fn test_walking_a_leaf_returns_it() {
    let backend = InMemoryBackend::new();
    let items = assert_ok!(
        walk_vault(&backend, "secret/x", &WalkOptions::new(KvVersion::V1), &WalkControl::new()).await
    );
    assert_eq!(paths(&items), vec!["secret/x"]);
}

#[tokio::test]
async fn test_v1_tree_sorted_without_values() {
    let backend = InMemoryBackend::new()
        .with_list("secret", &["b/", "a"])
        .with_list("secret/b", &["c"]);

    let items = assert_ok!(
        walk_vault(&backend, "secret", &WalkOptions::new(KvVersion::V1), &WalkControl::new()).await
    );
    assert_eq!(paths(&items), vec!["secret/a", "secret/b/c"]);
    assert!(items.iter().all(|i| i.value.is_none()));
}

#[tokio::test]
async fn test_v2_name_filter_skips_deeper_sibling() {
    let backend = InMemoryBackend::new()
        .with_list("kv/metadata", &["app/"])
        .with_list("kv/metadata/app", &["app-cfg", "deep/"])
        .with_list("kv/metadata/app/deep", &["other"]);

    let options = WalkOptions::new(KvVersion::V2).with_filter(Filter::all().with_name_part("cfg"));
    let items = assert_ok!(walk_vault(&backend, "kv", &options, &WalkControl::new()).await);
    assert_eq!(paths(&items), vec!["kv/app/app-cfg"]);
}

#[tokio::test]
async fn test_results_sorted_across_roots() {
    let mut mounts = MountTable::new();
    mounts.insert("zeta/".to_string(), Mount::new("kv"));
    mounts.insert("alpha/".to_string(), Mount::new("kv"));
    let backend = InMemoryBackend::new()
        .with_mounts(mounts)
        .with_list("zeta", &["b", "a"])
        .with_list("alpha", &["z"]);

    let items = assert_ok!(
        collect_items(&backend, &SearchRequest::new(SearchTarget::AllMounts), &WalkControl::new()).await
    );
    let got = paths(&items);
    let mut sorted = got.clone();
    sorted.sort();
    assert_eq!(got, sorted);
    assert_eq!(got, vec!["alpha/z", "zeta/a", "zeta/b"]);
}

#[tokio::test]
async fn test_fallback_merge_precedence() {
    let backend = InMemoryBackend::new().with_mounts_error(403).with_secret(
        "sys/internal/ui/mounts",
        json!({
            "data": {
                "mounts": {"kv/": {"type": "kv", "options": {"version": "2"}}},
                "kv/": {"type": "kv", "options": {"version": "1"}},
                "team/": {"type": "kv", "options": {"version": "1"}},
                "secret": {
                    "kv/": {"type": "generic"},
                    "team/": {"type": "generic"},
                    "legacy/": {"type": "kv"}
                }
            }
        }),
    );

    let mounts = assert_ok!(list_mounts_with_fallback(&backend).await);
    assert_eq!(mounts.keys().cloned().collect::<Vec<_>>(), vec!["kv/", "legacy/", "team/"]);
    assert_eq!(mounts["kv/"].kv_version(), KvVersion::V2);
    assert!(mounts["team/"].is_kv());
    assert!(mounts["legacy/"].is_kv());
}

#[tokio::test]
async fn test_fallback_mounts_drive_search() {
    let backend = InMemoryBackend::new()
        .with_mounts_error(403)
        .with_secret(
            "sys/internal/ui/mounts",
            json!({"secret": {"kv/": {"type": "kv", "options": {"version": "2"}}}}),
        )
        .with_list("kv/metadata", &["app"])
        .with_secret("kv/data/app", json!({"data": {"k": "v"}}));

    let request = SearchRequest::new(SearchTarget::AllMounts).with_values(true);
    let items = assert_ok!(collect_items(&backend, &request, &WalkControl::new()).await);
    assert_eq!(paths(&items), vec!["kv/app"]);
    assert_eq!(serde_json::to_value(&items[0].value).unwrap(), json!({"k": "v"}));
}

#[tokio::test]
async fn test_read_failure_aborts_search() {
    let backend = InMemoryBackend::new()
        .with_list("secret", &["a", "b"])
        .with_secret("secret/a", json!({"k": "v"}))
        .with_read_error("secret/b", 500);

    let request = SearchRequest::new(SearchTarget::Path("secret".into()))
        .with_policy(fvf::VersionPolicy::Fixed(KvVersion::V1))
        .with_values(true);
    let err = assert_err!(collect_items(&backend, &request, &WalkControl::new()).await);
    assert!(err.to_string().contains("secret/b"));
}

#[tokio::test]
async fn test_streaming_matches_batch() {
    let backend = Arc::new(
        InMemoryBackend::new()
            .with_list("secret", &["a", "b/"])
            .with_list("secret/b", &["c", "d/"])
            .with_list("secret/b/d", &["e"]),
    );
    let request = SearchRequest::new(SearchTarget::Path("secret".into()))
        .with_policy(fvf::VersionPolicy::Fixed(KvVersion::V1));

    let batch = assert_ok!(collect_items(backend.as_ref(), &request, &WalkControl::new()).await);

    let (mut rx, handle) = fvf::search::stream_items(Arc::clone(&backend), request, WalkControl::new());
    let mut streamed = Vec::new();
    while let Some(item) = rx.recv().await {
        streamed.push(item.path);
    }
    assert_ok!(handle.await.unwrap());
    streamed.sort();

    assert_eq!(streamed, paths(&batch));
}
