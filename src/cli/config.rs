//! Configuration file handling for the fvf CLI
//!
//! Loads optional defaults from ~/.fvf/config.toml and resolves the Vault
//! address, token and namespace from flags, environment and files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::secrets::VaultToken;

/// Default Vault address when nothing else is configured.
pub const DEFAULT_ADDRESS: &str = "http://127.0.0.1:8200";

/// Default overall deadline for a search, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default bound on a single on-demand read, in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;

/// CLI configuration stored in ~/.fvf/config.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    /// Vault address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    /// Vault token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Vault Enterprise namespace
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Overall search timeout in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    /// Per-request timeout for single reads, in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<u64>,
}

fn home_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .context("Unable to determine home directory")?;
    Ok(PathBuf::from(home))
}

impl CliConfig {
    /// Get the default configuration file path (~/.fvf/config.toml)
    pub fn config_path() -> Result<PathBuf> {
        Ok(home_dir()?.join(".fvf").join("config.toml"))
    }

    /// Load configuration from the default path; a missing file is empty.
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_path()?)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Resolve the Vault address
///
/// Checks sources in the following priority order:
/// 1. --address command line flag
/// 2. VAULT_ADDR environment variable
/// 3. ~/.fvf/config.toml
/// 4. Default: http://127.0.0.1:8200
pub fn resolve_address(flag: Option<String>, config: &CliConfig) -> String {
    resolve_address_with(flag, config, env_var)
}

fn resolve_address_with(
    flag: Option<String>,
    config: &CliConfig,
    env: impl Fn(&str) -> Option<String>,
) -> String {
    if let Some(address) = non_empty(flag) {
        debug!(address = %address, "Using address from --address flag");
        return address;
    }
    if let Some(address) = non_empty(env("VAULT_ADDR")) {
        debug!(address = %address, "Using address from VAULT_ADDR");
        return address;
    }
    if let Some(address) = non_empty(config.address.clone()) {
        debug!(address = %address, "Using address from config file");
        return address;
    }
    debug!(address = DEFAULT_ADDRESS, "Using default address");
    DEFAULT_ADDRESS.to_string()
}

/// Resolve the Vault token
///
/// Checks sources in the following priority order:
/// 1. --token command line flag
/// 2. --token-file command line flag
/// 3. VAULT_TOKEN environment variable
/// 4. ~/.vault-token
/// 5. ~/.fvf/config.toml
///
/// Returns `None` when no source has a token; requests then go out
/// unauthenticated.
pub fn resolve_token(
    token_flag: Option<String>,
    token_file_flag: Option<PathBuf>,
    config: &CliConfig,
) -> Result<Option<VaultToken>> {
    let helper_file = home_dir().ok().map(|home| home.join(".vault-token"));
    resolve_token_with(token_flag, token_file_flag, config, env_var, helper_file.as_deref())
}

fn resolve_token_with(
    token_flag: Option<String>,
    token_file_flag: Option<PathBuf>,
    config: &CliConfig,
    env: impl Fn(&str) -> Option<String>,
    helper_file: Option<&Path>,
) -> Result<Option<VaultToken>> {
    if let Some(token) = non_empty(token_flag) {
        debug!("Using token from --token flag");
        return Ok(Some(VaultToken::from(token)));
    }

    if let Some(token_file) = token_file_flag {
        debug!("Reading token from file: {}", token_file.display());
        let token = std::fs::read_to_string(&token_file)
            .with_context(|| format!("Failed to read token file: {}", token_file.display()))?
            .trim()
            .to_string();

        if token.is_empty() {
            anyhow::bail!("Token file is empty: {}", token_file.display());
        }
        return Ok(Some(VaultToken::from(token)));
    }

    if let Some(token) = non_empty(env("VAULT_TOKEN")) {
        debug!("Using token from VAULT_TOKEN environment variable");
        return Ok(Some(VaultToken::from(token)));
    }

    if let Some(path) = helper_file {
        if let Ok(contents) = std::fs::read_to_string(path) {
            if let Some(token) = non_empty(Some(contents)) {
                debug!("Using token from {}", path.display());
                return Ok(Some(VaultToken::from(token)));
            }
        }
    }

    if let Some(token) = non_empty(config.token.clone()) {
        debug!("Using token from config file");
        return Ok(Some(VaultToken::from(token)));
    }

    debug!("No Vault token found, continuing unauthenticated");
    Ok(None)
}

/// Resolve the Vault namespace: --namespace, VAULT_NAMESPACE, config file.
pub fn resolve_namespace(flag: Option<String>, config: &CliConfig) -> Option<String> {
    resolve_namespace_with(flag, config, env_var)
}

fn resolve_namespace_with(
    flag: Option<String>,
    config: &CliConfig,
    env: impl Fn(&str) -> Option<String>,
) -> Option<String> {
    non_empty(flag).or_else(|| non_empty(env("VAULT_NAMESPACE"))).or_else(|| non_empty(config.namespace.clone()))
}

/// Resolve the overall search timeout: --timeout, config file, 30 seconds.
pub fn resolve_timeout(flag: Option<u64>, config: &CliConfig) -> Duration {
    let secs = flag.or(config.timeout).unwrap_or(DEFAULT_TIMEOUT_SECS);
    debug!(timeout_secs = secs, "Resolved search timeout");
    Duration::from_secs(secs)
}

/// Resolve the per-request timeout: --request-timeout, config file, 15 seconds.
pub fn resolve_request_timeout(flag: Option<u64>, config: &CliConfig) -> Duration {
    Duration::from_secs(flag.or(config.request_timeout).unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS))
}
