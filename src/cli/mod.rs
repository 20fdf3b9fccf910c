//! # Command Line Interface
//!
//! `fvf` searches Vault KV mounts for secrets by name or path pattern and
//! prints the matches, optionally with their values. `fvf get <path>` prints
//! one secret.

pub mod config;
pub mod output;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use owo_colors::OwoColorize;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::observability::init_logging;
use crate::search::{
    collect_items, fetch_value_lazily, stream_items, Filter, SearchRequest, SearchTarget,
    VersionPolicy, WalkControl,
};
use crate::secrets::{SecretsError, VaultBackend, VaultConfig};
use config::CliConfig;
use output::{format_item_line, format_record, print_items, print_json, OutputFormat};

#[derive(Parser, Debug)]
#[command(name = "fvf")]
#[command(about = "Find secrets across Vault KV mounts")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Start path to recurse, e.g. secret/ or secret/app/ (default: all KV mounts)
    #[arg(long)]
    pub path: Option<String>,

    /// Comma-separated list of start paths, e.g. kv/app1/,kv/app2/
    #[arg(long)]
    pub paths: Option<String>,

    /// Assume KV v1 (overrides --kv2 and skips detection)
    #[arg(long)]
    pub kv1: bool,

    /// Assume KV v2 when detection is inconclusive
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub kv2: bool,

    /// Use the --kv2 setting and skip auto-detection
    #[arg(long)]
    pub force_kv2: bool,

    /// Regex matched against the full logical path
    #[arg(long = "match", value_name = "REGEX")]
    pub pattern: Option<String>,

    /// Case-insensitive substring matched against the secret name (last segment)
    #[arg(long)]
    pub name: Option<String>,

    /// Print secret values
    #[arg(long)]
    pub values: bool,

    /// Maximum recursion depth (0 = unlimited)
    #[arg(long, default_value_t = 0)]
    pub max_depth: usize,

    /// Output a JSON array instead of lines
    #[arg(long, global = true)]
    pub json: bool,

    /// Output format for batch results: plain or yaml (--json wins)
    #[arg(long, conflicts_with = "stream")]
    pub format: Option<OutputFormat>,

    /// Print paths as they are discovered instead of after the search
    #[arg(long)]
    pub stream: bool,

    /// Total timeout for the search, in seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Timeout for a single secret read, in seconds
    #[arg(long, global = true)]
    pub request_timeout: Option<u64>,

    /// Vault address (default: VAULT_ADDR)
    #[arg(long, global = true)]
    pub address: Option<String>,

    /// Vault token (default: VAULT_TOKEN or ~/.vault-token)
    #[arg(long, global = true)]
    pub token: Option<String>,

    /// Path to file containing the Vault token
    #[arg(long, global = true)]
    pub token_file: Option<PathBuf>,

    /// Vault Enterprise namespace
    #[arg(long, global = true)]
    pub namespace: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the value of one secret
    Get {
        /// Logical path, e.g. kv/app/config
        path: String,
    },
}

impl Cli {
    fn policy(&self) -> VersionPolicy {
        VersionPolicy::from_flags(self.kv1, self.kv2, self.force_kv2)
    }

    fn output_format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            self.format.unwrap_or_default()
        }
    }

    fn search_request(&self) -> Result<SearchRequest> {
        let filter = Filter::from_parts(self.name.as_deref(), self.pattern.as_deref())?;
        Ok(SearchRequest::new(SearchTarget::from_inputs(self.path.as_deref(), self.paths.as_deref()))
            .with_policy(self.policy())
            .with_max_depth(self.max_depth)
            .with_filter(filter)
            .with_values(self.values || self.json))
    }
}

/// Run the CLI
pub async fn run_cli() -> Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Warning: Error loading .env file: {}", e);
        }
    }

    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = CliConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "Ignoring unreadable config file");
        CliConfig::default()
    });

    let backend = create_backend(&cli, &config)?;
    let request_timeout = config::resolve_request_timeout(cli.request_timeout, &config);
    let control = WalkControl::with_timeout(config::resolve_timeout(cli.timeout, &config));

    let interrupt = control.token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    control
        .guard(backend.check_connection())
        .await
        .with_context(|| format!("Cannot connect to Vault at {}", backend.address()))?;

    match &cli.command {
        Some(Commands::Get { path }) => {
            handle_get(&backend, path, &cli, request_timeout, &control).await
        }
        None if cli.stream => run_stream(Arc::new(backend), &cli, request_timeout, control).await,
        None => run_batch(&backend, &cli, &control).await,
    }
}

/// Create the Vault backend from resolved settings
fn create_backend(cli: &Cli, config: &CliConfig) -> Result<VaultBackend> {
    let vault_config = VaultConfig {
        address: config::resolve_address(cli.address.clone(), config),
        token: config::resolve_token(cli.token.clone(), cli.token_file.clone(), config)?,
        namespace: config::resolve_namespace(cli.namespace.clone(), config),
    };
    debug!(address = %vault_config.address, namespace = ?vault_config.namespace, "Connecting to Vault");
    VaultBackend::new(vault_config).context("Failed to create Vault client")
}

async fn run_batch(backend: &VaultBackend, cli: &Cli, control: &WalkControl) -> Result<()> {
    let request = cli.search_request()?;
    let items = match collect_items(backend, &request, control).await {
        Ok(items) => items,
        Err(err) => return Err(explain_search_error(&request.target, err)),
    };
    print_items(&items, cli.output_format(), cli.values || cli.json)
}

/// Streams paths as they arrive; values, when requested, are fetched per item.
async fn run_stream(
    backend: Arc<VaultBackend>,
    cli: &Cli,
    request_timeout: Duration,
    control: WalkControl,
) -> Result<()> {
    let show_values = cli.values || cli.json;
    let request = cli.search_request()?.with_values(false);
    let target = request.target.clone();
    let (mut rx, handle) = stream_items(Arc::clone(&backend), request, control.clone());

    while let Some(mut item) = rx.recv().await {
        if show_values {
            let value =
                fetch_value_lazily(backend.as_ref(), &item.path, cli.policy(), request_timeout, &control)
                    .await
                    .with_context(|| format!("Failed to read {}", item.path))?;
            item.value = Some(value);
        }
        if cli.json {
            println!("{}", serde_json::to_string(&item).context("Failed to serialize to JSON")?);
        } else {
            println!("{}", format_item_line(&item, show_values));
        }
    }

    match handle.await.context("Search task failed")? {
        Ok(()) => Ok(()),
        Err(err) => Err(explain_search_error(&target, err)),
    }
}

async fn handle_get(
    backend: &VaultBackend,
    path: &str,
    cli: &Cli,
    request_timeout: Duration,
    control: &WalkControl,
) -> Result<()> {
    let value = fetch_value_lazily(backend, path, cli.policy(), request_timeout, control)
        .await
        .with_context(|| format!("Failed to read {}", path))?;

    if cli.json {
        print_json(&value)
    } else {
        println!("{}", format_record(&value, true));
        Ok(())
    }
}

/// Adds a hint for mount listing failures, the one error users can act on.
fn explain_search_error(target: &SearchTarget, err: SecretsError) -> anyhow::Error {
    let from_mount_listing = *target == SearchTarget::AllMounts
        && !matches!(err, SecretsError::Walk { .. })
        && !err.is_cancelled()
        && !err.is_deadline_exceeded();

    if from_mount_listing {
        if err.is_permission_denied() {
            print_hint(
                "fvf: permission denied listing mounts (sys/mounts). Fallback to \
                 sys/internal/ui/mounts also failed. Use --path to target a known mount. \
                 If your mount is KV v1, add --kv1.",
            );
        } else {
            print_hint(
                "fvf: cannot list mounts (provide --path to search a known mount). \
                 If your mount is KV v1, add --kv1.",
            );
        }
    }
    anyhow::Error::new(err)
}

/// Hints are green on a terminal and plain otherwise.
fn print_hint(message: &str) {
    if std::io::stderr().is_terminal() {
        eprintln!("{}", message.green());
    } else {
        eprintln!("{}", message);
    }
}
