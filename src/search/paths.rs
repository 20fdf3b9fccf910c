//! Address translation between logical secret paths and API paths.
//!
//! A logical path is `<mount>/<inner>`. KV v1 serves both listing and reading
//! at that address; KV v2 lists under `<mount>/metadata/<inner>` and reads
//! under `<mount>/data/<inner>`.

use crate::secrets::KvVersion;

/// Splits a logical path into its mount (first segment) and the inner path.
///
/// Leading separators are ignored on both parts; a bare mount yields an empty
/// inner path.
pub fn split_mount(path: &str) -> (&str, &str) {
    let path = path.trim_start_matches('/');
    match path.split_once('/') {
        Some((mount, inner)) => (mount, inner.trim_start_matches('/')),
        None => (path, ""),
    }
}

/// Joins the non-empty elements with `/`.
pub fn join_non_empty(elements: &[&str]) -> String {
    elements.iter().filter(|e| !e.is_empty()).copied().collect::<Vec<_>>().join("/")
}

/// Lexically normalizes a path: collapses repeated separators, drops `.`
/// segments, resolves `..` against earlier segments and removes leading and
/// trailing separators.
pub fn clean_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(&last) if last != ".." => {
                    segments.pop();
                }
                _ => segments.push(".."),
            },
            s => segments.push(s),
        }
    }
    segments.join("/")
}

/// Last segment of a cleaned path.
pub fn base_name(path: &str) -> &str {
    let path = path.trim_end_matches('/');
    path.rsplit('/').next().unwrap_or(path)
}

/// API path used to list children of `inner` under `mount`.
pub fn list_api_path(mount: &str, inner: &str, version: KvVersion) -> String {
    match version {
        KvVersion::V2 => clean_path(&join_non_empty(&[mount, "metadata", inner])),
        KvVersion::V1 => clean_path(&join_non_empty(&[mount, inner])),
    }
}

/// API path used to read the secret at `inner` under `mount`.
pub fn read_api_path(mount: &str, inner: &str, version: KvVersion) -> String {
    match version {
        KvVersion::V2 => clean_path(&join_non_empty(&[mount, "data", inner])),
        KvVersion::V1 => clean_path(&join_non_empty(&[mount, inner])),
    }
}

/// Canonical logical path of a secret.
pub fn logical_path(mount: &str, inner: &str) -> String {
    clean_path(&join_non_empty(&[mount, inner]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_split_mount() {
        assert_eq!(split_mount("secret/app/config"), ("secret", "app/config"));
        assert_eq!(split_mount("secret"), ("secret", ""));
        assert_eq!(split_mount("secret/"), ("secret", ""));
        assert_eq!(split_mount("/kv//app/"), ("kv", "app/"));
    }

    #[test]
    fn test_api_paths() {
        assert_eq!(list_api_path("kv", "app", KvVersion::V2), "kv/metadata/app");
        assert_eq!(read_api_path("kv", "app", KvVersion::V2), "kv/data/app");
        assert_eq!(list_api_path("secret", "app", KvVersion::V1), "secret/app");
        assert_eq!(read_api_path("secret", "app", KvVersion::V1), "secret/app");
    }

    #[test]
    fn test_api_paths_empty_inner() {
        assert_eq!(list_api_path("kv", "", KvVersion::V2), "kv/metadata");
        assert_eq!(read_api_path("kv", "", KvVersion::V2), "kv/data");
        assert_eq!(list_api_path("secret", "", KvVersion::V1), "secret");
    }

    #[test]
    fn test_api_paths_trailing_separators() {
        assert_eq!(list_api_path("kv", "app/", KvVersion::V2), "kv/metadata/app");
        assert_eq!(read_api_path("secret", "app//x", KvVersion::V1), "secret/app/x");
    }

    #[test]
    fn test_clean_path() {
        assert_eq!(clean_path("a//b/"), "a/b");
        assert_eq!(clean_path("/a/./b"), "a/b");
        assert_eq!(clean_path("a/b/../c"), "a/c");
        assert_eq!(clean_path("../a"), "../a");
        assert_eq!(clean_path(""), "");
    }

    #[test]
    fn test_base_name() {
        assert_eq!(base_name("secret/app/config"), "config");
        assert_eq!(base_name("secret"), "secret");
        assert_eq!(base_name("secret/app/"), "app");
    }

    #[test]
    fn test_join_non_empty() {
        assert_eq!(join_non_empty(&["kv", "", "app"]), "kv/app");
        assert_eq!(join_non_empty(&["", ""]), "");
    }

    proptest! {
        #[test]
        fn prop_clean_path_is_idempotent(path in "[a-z/.]{0,24}") {
            let once = clean_path(&path);
            prop_assert_eq!(clean_path(&once), once.clone());
            prop_assert!(!once.contains("//"));
            prop_assert!(!once.ends_with('/'));
            prop_assert!(!once.starts_with('/'));
        }

        #[test]
        fn prop_v2_paths_insert_marker(mount in "[a-z]{1,8}", inner in "[a-z]{1,8}(/[a-z]{1,8}){0,3}") {
            prop_assert_eq!(
                list_api_path(&mount, &inner, KvVersion::V2),
                format!("{}/metadata/{}", mount, inner)
            );
            prop_assert_eq!(
                read_api_path(&mount, &inner, KvVersion::V2),
                format!("{}/data/{}", mount, inner)
            );
            prop_assert_eq!(logical_path(&mount, &inner), format!("{}/{}", mount, inner));
        }
    }
}
