//! HashiCorp Vault backend implementation.
//!
//! Talks to the Vault HTTP API directly for the generic logical operations the
//! search engine needs (`LIST` and read on arbitrary paths, whose payload shape
//! depends on the engine and server version), and uses `vaultrs` for client
//! settings and the health check.
//!
//! # Status mapping
//!
//! - `404` on a list or read means "nothing here" and maps to `Ok(None)`;
//!   a list answering 404 is how Vault reports that a path is a secret rather
//!   than a directory.
//! - `403` maps to [`SecretsError::PermissionDenied`].
//! - Any other non-success status maps to [`SecretsError::Api`].
//!
//! # Example
//!
//! ```rust,ignore
//! use fvf::secrets::{VaultBackend, VaultConfig};
//!
//! let backend = VaultBackend::new(VaultConfig {
//!     address: "https://vault.example.com:8200".to_string(),
//!     token: Some("s.token".into()),
//!     namespace: None,
//! })?;
//! backend.check_connection().await?;
//! ```

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::{debug, trace};
use vaultrs::client::{VaultClient, VaultClientSettingsBuilder};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::backend::{Mount, MountTable, Record, SecretsBackend};
use super::error::{Result, SecretsError};

const TOKEN_HEADER: &str = "X-Vault-Token";
const NAMESPACE_HEADER: &str = "X-Vault-Namespace";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Vault token that never shows up in logs or debug output.
#[derive(Clone, Default, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct VaultToken(String);

impl VaultToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, for the request header only.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for VaultToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VaultToken([REDACTED])")
    }
}

impl From<&str> for VaultToken {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for VaultToken {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Connection settings for a Vault server.
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// Vault server address (e.g., "https://vault.example.com:8200")
    pub address: String,

    /// Token sent as `X-Vault-Token`; requests go out unauthenticated without one
    pub token: Option<VaultToken>,

    /// Vault namespace (for Enterprise multi-tenancy)
    pub namespace: Option<String>,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self { address: "http://127.0.0.1:8200".to_string(), token: None, namespace: None }
    }
}

/// Error body returned by Vault on failures.
#[derive(Debug, Default, Deserialize, Serialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<String>,
}

/// Vault-backed implementation of [`SecretsBackend`].
pub struct VaultBackend {
    http: Client,
    vault: VaultClient,
    address: String,
    token: Option<VaultToken>,
    namespace: Option<String>,
}

impl fmt::Debug for VaultBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultBackend")
            .field("address", &self.address)
            .field("namespace", &self.namespace)
            .field("token", &self.token)
            .finish()
    }
}

impl VaultBackend {
    /// Creates a backend for the given server.
    ///
    /// # Errors
    ///
    /// - [`SecretsError::Config`] if the address is empty or the client cannot be built
    pub fn new(config: VaultConfig) -> Result<Self> {
        let address = config.address.trim().trim_end_matches('/').to_string();
        if address.is_empty() {
            return Err(SecretsError::config_error("Vault address cannot be empty"));
        }

        let mut settings_builder = VaultClientSettingsBuilder::default();
        settings_builder.address(&address);
        if let Some(ref token) = config.token {
            settings_builder.token(token.expose());
        }
        if let Some(ref namespace) = config.namespace {
            settings_builder.namespace(Some(namespace.clone()));
        }
        let settings = settings_builder.build().map_err(|e| {
            SecretsError::config_error(format!("Invalid Vault configuration: {}", e))
        })?;
        let vault = VaultClient::new(settings).map_err(|e| {
            SecretsError::config_error(format!("Failed to create Vault client: {}", e))
        })?;

        let http = Client::builder().connect_timeout(CONNECT_TIMEOUT).build().map_err(|e| {
            SecretsError::config_error(format!("Failed to build HTTP client: {}", e))
        })?;

        Ok(Self { http, vault, address, token: config.token, namespace: config.namespace })
    }

    /// Server address this backend talks to.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Verifies the server is reachable by calling the health endpoint.
    pub async fn check_connection(&self) -> Result<()> {
        match vaultrs::sys::health(&self.vault).await {
            Ok(_) => {
                debug!(address = %self.address, "Vault health check succeeded");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, address = %self.address, "Failed to connect to Vault");
                Err(SecretsError::transport("sys/health", format!("health check failed: {}", e)))
            }
        }
    }

    fn request(&self, path: &str) -> RequestBuilder {
        let url = format!("{}/v1/{}", self.address, path.trim_start_matches('/'));
        let mut request = self.http.get(&url);
        if let Some(token) = self.token.as_ref().filter(|t| !t.is_empty()) {
            request = request.header(TOKEN_HEADER, token.expose());
        }
        if let Some(namespace) = self.namespace.as_deref().filter(|ns| !ns.is_empty()) {
            request = request.header(NAMESPACE_HEADER, namespace);
        }
        request
    }

    /// Sends the request and returns the parsed body, or `None` when the
    /// server has nothing at `path`.
    async fn send(&self, path: &str, request: RequestBuilder) -> Result<Option<Value>> {
        let response =
            request.send().await.map_err(|e| SecretsError::transport(path, e.to_string()))?;
        handle_response(path, response).await
    }
}

async fn handle_response(path: &str, response: Response) -> Result<Option<Value>> {
    let status = response.status();
    trace!(path = %path, status = %status, "Vault response");

    match status {
        StatusCode::NO_CONTENT => return Ok(None),
        StatusCode::NOT_FOUND => {
            let text = response.text().await.unwrap_or_default();
            return Ok(not_found_body(&text));
        }
        s if s.is_success() => {}
        s => {
            let text = response.text().await.unwrap_or_default();
            let message = error_message(&text);
            if s == StatusCode::FORBIDDEN {
                return Err(SecretsError::permission_denied(path, message));
            }
            return Err(SecretsError::api(path, s.as_u16(), message));
        }
    }

    let body = response.text().await.map_err(|e| SecretsError::transport(path, e.to_string()))?;
    if body.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(&body)?))
}

/// A 404 still carries a usable body when it has `data` or warnings, which
/// is how soft-deleted KV v2 versions are reported.
fn not_found_body(text: &str) -> Option<Value> {
    let body: Value = serde_json::from_str(text).ok()?;
    let has_data = body.get("data").and_then(Value::as_object).is_some_and(|d| !d.is_empty());
    let has_warnings = body.get("warnings").and_then(Value::as_array).is_some_and(|w| !w.is_empty());
    (has_data || has_warnings).then_some(body)
}

fn error_message(text: &str) -> String {
    match serde_json::from_str::<ErrorBody>(text) {
        Ok(body) if !body.errors.is_empty() => body.errors.join("; "),
        _ if text.trim().is_empty() => "<empty response>".to_string(),
        _ => text.trim().to_string(),
    }
}

/// The `data` object of a logical response, if any.
fn data_of(body: Option<Value>) -> Option<Record> {
    match body? {
        Value::Object(mut envelope) => match envelope.remove("data") {
            Some(Value::Object(data)) => Some(data),
            _ => None,
        },
        _ => None,
    }
}

/// Parses `sys/mounts`; newer servers wrap the table in `data`, older ones
/// return it at the top level next to request metadata.
fn parse_mount_table(body: Value) -> MountTable {
    let table = match body {
        Value::Object(mut envelope) => match envelope.remove("data") {
            Some(Value::Object(data)) => data,
            _ => envelope,
        },
        _ => Record::new(),
    };

    table
        .into_iter()
        .filter(|(name, _)| name.ends_with('/'))
        .filter_map(|(name, entry)| {
            serde_json::from_value::<Mount>(entry).ok().map(|mount| (name, mount))
        })
        .collect()
}

#[async_trait]
impl SecretsBackend for VaultBackend {
    async fn list(&self, path: &str) -> Result<Option<Record>> {
        debug!(path = %path, "LIST");
        let request = self.request(path).query(&[("list", "true")]);
        Ok(data_of(self.send(path, request).await?))
    }

    async fn read(&self, path: &str) -> Result<Option<Record>> {
        debug!(path = %path, "READ");
        let request = self.request(path);
        Ok(data_of(self.send(path, request).await?))
    }

    async fn list_mounts(&self) -> Result<MountTable> {
        const PATH: &str = "sys/mounts";
        debug!("Listing mounts");
        let body = self.send(PATH, self.request(PATH)).await?;
        body.map(parse_mount_table)
            .ok_or_else(|| SecretsError::unexpected_response(PATH, "empty mount listing"))
    }
}
