//! # fvf
//!
//! Finds secrets across HashiCorp Vault KV mounts by recursively walking
//! them, translating between the KV v1 and KV v2 layouts, and filtering the
//! discovered paths by name substring or path regex.
//!
//! ## Architecture
//!
//! ```text
//! CLI → SearchRequest → Walker → SecretsBackend (Vault HTTP / in-memory)
//!            ↓             ↓
//!     Mount discovery   Value reader
//! ```
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use fvf::search::{walk_vault, WalkControl, WalkOptions};
//! use fvf::secrets::{KvVersion, VaultBackend, VaultConfig};
//!
//! # async fn run() -> fvf::secrets::Result<()> {
//! let backend = VaultBackend::new(VaultConfig::default())?;
//! let items = walk_vault(&backend, "secret", &WalkOptions::new(KvVersion::V2), &WalkControl::new()).await?;
//! for item in items {
//!     println!("{}", item.path);
//! }
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod observability;
pub mod search;
pub mod secrets;

pub use search::{FoundItem, SearchRequest, SearchTarget, VersionPolicy, WalkControl};
pub use secrets::{Result, SecretsBackend, SecretsError};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
