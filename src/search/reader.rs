//! Reading secret values and normalizing the v1/v2 payload shapes.

use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use super::control::WalkControl;
use super::detect::VersionPolicy;
use super::paths::{read_api_path, split_mount};
use crate::secrets::{KvVersion, Record, Result, SecretsBackend, SecretsError};

/// Default bound on a single on-demand read.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Reads the secret at `inner` under `mount` and returns its key/value payload.
///
/// KV v1 records are the payload. KV v2 records nest it under `data`; a
/// missing, null or non-object `data` yields an empty payload (soft-deleted or
/// destroyed versions still have metadata).
///
/// # Errors
///
/// - [`SecretsError::NotFound`] if the server has no record at the read path
/// - any error from the backend call, or cancellation from `control`
pub async fn read_secret<B>(
    backend: &B,
    mount: &str,
    inner: &str,
    version: KvVersion,
    control: &WalkControl,
) -> Result<Record>
where
    B: SecretsBackend + ?Sized,
{
    let read_path = read_api_path(mount, inner, version);
    let record = control
        .guard(backend.read(&read_path))
        .await?
        .ok_or_else(|| SecretsError::not_found(&read_path))?;

    Ok(match version {
        KvVersion::V1 => record,
        KvVersion::V2 => normalize_v2(record, &read_path),
    })
}

fn normalize_v2(mut record: Record, read_path: &str) -> Record {
    match record.remove("data") {
        Some(Value::Object(data)) => data,
        Some(Value::Null) | None => Record::new(),
        Some(other) => {
            debug!(path = %read_path, kind = %json_kind(&other), "Unexpected v2 payload, treating as empty");
            Record::new()
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Fetches one secret on demand (e.g. when a user picks a result).
///
/// The layout is resolved per call through `policy`. Each attempt is bounded
/// by `request_timeout`; an attempt that hits its deadline is retried once.
/// Any other failure is returned as is.
pub async fn fetch_value_lazily<B>(
    backend: &B,
    full_path: &str,
    policy: VersionPolicy,
    request_timeout: Duration,
    parent: &WalkControl,
) -> Result<Record>
where
    B: SecretsBackend + ?Sized,
{
    match fetch_attempt(backend, full_path, policy, request_timeout, parent).await {
        Err(err) if err.is_deadline_exceeded() => {
            warn!(path = %full_path, timeout_ms = request_timeout.as_millis() as u64, "Read timed out, retrying once");
            fetch_attempt(backend, full_path, policy, request_timeout, parent).await
        }
        other => other,
    }
}

async fn fetch_attempt<B>(
    backend: &B,
    full_path: &str,
    policy: VersionPolicy,
    request_timeout: Duration,
    parent: &WalkControl,
) -> Result<Record>
where
    B: SecretsBackend + ?Sized,
{
    let control = parent.child_with_timeout(request_timeout);
    let (mount, inner) = split_mount(full_path);
    let version = policy.resolve_for_path(backend, mount, &control).await;
    read_secret(backend, mount, inner, version, &control).await
}
