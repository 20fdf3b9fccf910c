//! Remote secrets service abstraction.
//!
//! The search engine only needs three capabilities from the server, captured
//! by the [`SecretsBackend`] trait:
//! - **list**: children of a path, or "no listing" for a concrete secret
//! - **read**: the record stored at a path
//! - **list_mounts**: every mounted secrets engine with its options
//!
//! # Backends
//!
//! - [`VaultBackend`]: HashiCorp Vault over its HTTP API
//! - [`InMemoryBackend`]: fixed tables, for tests and offline use
//!
//! # Security Considerations
//!
//! - Secret values are never logged
//! - The Vault token is redacted in debug output and zeroed on drop

pub mod backend;
pub mod error;
pub mod memory;
pub mod vault;

pub use backend::{KvVersion, Mount, MountTable, Record, SecretsBackend, KV_ENGINE};
pub use error::{Result, SecretsError};
pub use memory::InMemoryBackend;
pub use vault::{VaultBackend, VaultConfig, VaultToken};
