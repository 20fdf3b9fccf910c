//! KV layout detection and the policy that picks a layout per walk.

use tracing::debug;

use super::control::WalkControl;
use super::mounts::list_mounts_with_fallback;
use super::paths::split_mount;
use crate::secrets::{KvVersion, Mount, SecretsBackend};

/// Outcome of looking a path's mount up in the mount table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detection {
    /// Mount listing failed or the mount is not in it.
    Unknown,
    /// The mount exists but is not a KV engine.
    NotKv,
    /// A KV mount with the given layout.
    Kv(KvVersion),
}

impl Detection {
    pub fn is_v2(&self) -> bool {
        matches!(self, Self::Kv(KvVersion::V2))
    }

    /// The mount was found, so the answer can be trusted.
    pub fn is_definitive(&self) -> bool {
        !matches!(self, Self::Unknown)
    }

    /// Layout to use; `default` only applies when detection was inconclusive.
    pub fn version_or(&self, default: KvVersion) -> KvVersion {
        match self {
            Self::Unknown => default,
            Self::NotKv => KvVersion::V1,
            Self::Kv(version) => *version,
        }
    }
}

/// Determines the KV layout of the mount that `path` lives under.
///
/// Never fails: a mount listing error collapses to [`Detection::Unknown`].
pub async fn detect_kv_version<B>(backend: &B, path: &str, control: &WalkControl) -> Detection
where
    B: SecretsBackend + ?Sized,
{
    let (mount, _) = split_mount(path);
    if mount.is_empty() {
        return Detection::Unknown;
    }

    let mounts = match control.guard(list_mounts_with_fallback(backend)).await {
        Ok(mounts) => mounts,
        Err(err) => {
            debug!(path = %path, error = %err, "Mount listing unavailable, layout unknown");
            return Detection::Unknown;
        }
    };

    match mounts.get(&format!("{}/", mount)) {
        None => Detection::Unknown,
        Some(entry) if !entry.is_kv() => Detection::NotKv,
        Some(entry) => Detection::Kv(entry.kv_version()),
    }
}

/// How the layout of each walk root is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionPolicy {
    /// Always use this layout.
    Fixed(KvVersion),
    /// Use the mount table; fall back to `default` when a path's mount can't
    /// be determined.
    Detect { default: KvVersion },
}

impl Default for VersionPolicy {
    fn default() -> Self {
        Self::Detect { default: KvVersion::V2 }
    }
}

impl VersionPolicy {
    /// Combines the CLI switches: `kv1` forces v1, `force_kv2` forces the
    /// `kv2` default, otherwise the layout is detected.
    pub fn from_flags(kv1: bool, kv2: bool, force_kv2: bool) -> Self {
        let default = if kv2 { KvVersion::V2 } else { KvVersion::V1 };
        if kv1 {
            Self::Fixed(KvVersion::V1)
        } else if force_kv2 {
            Self::Fixed(default)
        } else {
            Self::Detect { default }
        }
    }

    /// Layout for walking an entire mount whose table entry is known.
    pub fn resolve_for_mount(&self, mount: &Mount) -> KvVersion {
        match self {
            Self::Fixed(version) => *version,
            Self::Detect { .. } => mount.kv_version(),
        }
    }

    /// Layout for walking or reading an explicit path.
    pub async fn resolve_for_path<B>(&self, backend: &B, path: &str, control: &WalkControl) -> KvVersion
    where
        B: SecretsBackend + ?Sized,
    {
        match self {
            Self::Fixed(version) => *version,
            Self::Detect { default } => detect_kv_version(backend, path, control).await.version_or(*default),
        }
    }
}
