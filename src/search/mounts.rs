//! Mount discovery with a fallback for restricted tokens.
//!
//! Tokens without `sys/mounts` access are usually still allowed to read the
//! UI mount listing, whose shape varies between server versions. The merge
//! below accepts every shape seen in practice.

use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::secrets::{Mount, MountTable, Record, Result, SecretsBackend};

/// Secondary endpoint read when the primary mount listing is forbidden.
pub const UI_MOUNTS_PATH: &str = "sys/internal/ui/mounts";

/// Lists mounts, falling back to the UI listing on permission denied.
///
/// Only a permission-denied primary failure triggers the fallback. When the
/// fallback fails or yields no mounts, the primary error is returned so the
/// caller sees the actionable cause.
pub async fn list_mounts_with_fallback<B>(backend: &B) -> Result<MountTable>
where
    B: SecretsBackend + ?Sized,
{
    let primary = match backend.list_mounts().await {
        Ok(mounts) => return Ok(mounts),
        Err(err) if err.is_permission_denied() => err,
        Err(err) => return Err(err),
    };

    warn!(error = %primary, fallback = UI_MOUNTS_PATH, "Mount listing denied, trying fallback");
    match backend.read(UI_MOUNTS_PATH).await {
        Ok(Some(data)) => {
            let mounts = merge_ui_mounts(&data);
            if mounts.is_empty() {
                debug!("Fallback mount listing had no usable entries");
                return Err(primary);
            }
            debug!(count = mounts.len(), "Mounts discovered through fallback");
            Ok(mounts)
        }
        Ok(None) => Err(primary),
        Err(err) => {
            debug!(error = %err, "Fallback mount listing failed");
            Err(primary)
        }
    }
}

/// Flattens a UI mount listing into a mount table.
///
/// One wrapping `data` level is removed. Entries are then taken from the
/// `mounts` sub-map, the root itself, and every sub-map of the root, in that
/// order; the first entry seen for a name wins. Only values that carry a
/// `type` or `options` key count as mounts, and only string options are kept.
pub fn merge_ui_mounts(data: &Record) -> MountTable {
    let root = match data.get("data") {
        Some(Value::Object(inner)) => inner,
        _ => data,
    };

    let mut table = MountTable::new();
    if let Some(Value::Object(mounts)) = root.get("mounts") {
        merge_section(&mut table, mounts);
    }
    merge_section(&mut table, root);
    for section in root.values() {
        if let Value::Object(section) = section {
            merge_section(&mut table, section);
        }
    }
    table
}

fn merge_section(table: &mut MountTable, section: &Record) {
    for (name, entry) in section {
        let Some(mount) = mount_from_entry(entry) else {
            continue;
        };
        let name = if name.ends_with('/') { name.clone() } else { format!("{}/", name) };
        table.entry(name).or_insert(mount);
    }
}

fn mount_from_entry(entry: &Value) -> Option<Mount> {
    let entry = entry.as_object()?;
    if !entry.contains_key("type") && !entry.contains_key("options") {
        return None;
    }

    let mount_type = entry.get("type").and_then(Value::as_str).unwrap_or_default().to_string();
    let options: HashMap<String, String> = match entry.get("options") {
        Some(Value::Object(options)) => options
            .iter()
            .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
            .collect(),
        _ => HashMap::new(),
    };
    Some(Mount { mount_type, options })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::{InMemoryBackend, KvVersion, SecretsError};
    use serde_json::json;
    use tracing_test::traced_test;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => Record::new(),
        }
    }

    #[test]
    fn test_merge_sectioned_listing() {
        let data = record(json!({
            "secret": {
                "kv/": {"type": "kv", "options": {"version": "2"}},
                "cubbyhole/": {"type": "cubbyhole", "options": null}
            },
            "auth": {
                "token/": {"type": "token"}
            }
        }));
        let table = merge_ui_mounts(&data);

        assert_eq!(table["kv/"].kv_version(), KvVersion::V2);
        assert_eq!(table["cubbyhole/"].mount_type, "cubbyhole");
        assert!(table["cubbyhole/"].options.is_empty());
        assert!(table.contains_key("token/"));
    }

    #[test]
    fn test_merge_unwraps_data_and_mounts_key() {
        let data = record(json!({
            "data": {
                "mounts": {"secret/": {"type": "kv", "options": {"version": "1"}}}
            }
        }));
        let table = merge_ui_mounts(&data);
        assert_eq!(table.len(), 1);
        assert_eq!(table["secret/"].kv_version(), KvVersion::V1);
    }

    #[test]
    fn test_merge_accepts_flat_root_entries() {
        let data = record(json!({
            "kv/": {"options": {"version": "2"}},
            "request_id": "abc",
            "junk": {"accessor": "x"}
        }));
        let table = merge_ui_mounts(&data);
        assert_eq!(table.len(), 1);
        assert_eq!(table["kv/"].mount_type, "");
    }

    #[test]
    fn test_merge_first_seen_wins() {
        let data = record(json!({
            "mounts": {"kv/": {"type": "kv", "options": {"version": "2"}}},
            "secret": {"kv/": {"type": "kv", "options": {"version": "1"}}}
        }));
        let table = merge_ui_mounts(&data);
        assert_eq!(table["kv/"].kv_version(), KvVersion::V2);
    }

    #[test]
    fn test_merge_keeps_only_string_options() {
        let data = record(json!({
            "secret": {"kv/": {"type": "kv", "options": {"version": "2", "max": 5, "flag": true}}}
        }));
        let table = merge_ui_mounts(&data);
        assert_eq!(table["kv/"].options.len(), 1);
    }

    #[test]
    fn test_merge_normalizes_trailing_separator() {
        let data = record(json!({"secret": {"kv": {"type": "kv"}}}));
        assert!(merge_ui_mounts(&data).contains_key("kv/"));
    }

    #[tokio::test]
    async fn test_primary_success_skips_fallback() {
        let mut mounts = MountTable::new();
        mounts.insert("secret/".to_string(), Mount::new("kv"));
        let backend = InMemoryBackend::new().with_mounts(mounts);

        let table = list_mounts_with_fallback(&backend).await.unwrap();
        assert!(table.contains_key("secret/"));
        assert_eq!(backend.call_count("read"), 0);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_permission_denied_uses_fallback() {
        let backend = InMemoryBackend::new()
            .with_mounts_error(403)
            .with_secret(UI_MOUNTS_PATH, json!({"secret": {"kv/": {"type": "kv", "options": {"version": "2"}}}}));

        let table = list_mounts_with_fallback(&backend).await.unwrap();
        assert_eq!(table["kv/"].kv_version(), KvVersion::V2);
        assert!(logs_contain("Mount listing denied, trying fallback"));
    }

    #[tokio::test]
    async fn test_failed_fallback_returns_primary_error() {
        let backend = InMemoryBackend::new().with_mounts_error(403).with_read_error(UI_MOUNTS_PATH, 403);
        let err = list_mounts_with_fallback(&backend).await.unwrap_err();
        assert!(matches!(err, SecretsError::PermissionDenied { ref path, .. } if path == "sys/mounts"));

        let backend = InMemoryBackend::new().with_mounts_error(403);
        let err = list_mounts_with_fallback(&backend).await.unwrap_err();
        assert!(matches!(err, SecretsError::PermissionDenied { ref path, .. } if path == "sys/mounts"));
    }

    #[tokio::test]
    async fn test_other_errors_do_not_fall_back() {
        let backend = InMemoryBackend::new()
            .with_mounts_error(500)
            .with_secret(UI_MOUNTS_PATH, json!({"secret": {"kv/": {"type": "kv"}}}));
        let err = list_mounts_with_fallback(&backend).await.unwrap_err();
        assert!(matches!(err, SecretsError::Api { status: 500, .. }));
        assert_eq!(backend.call_count("read"), 0);
    }
}
