//! # Structured Logging
//!
//! Logs go to stderr through a `tracing-subscriber` formatter so stdout stays
//! reserved for search results. `RUST_LOG` takes precedence; otherwise
//! `--verbose` selects `debug` and the default is `warn`.
//!
//! Secret values never appear in log fields, only paths and counts.

use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Create a tracing span for one walk.
///
/// ```rust,ignore
/// let span = walk_span!("walk", "secret/app");
/// let span = walk_span!("walk", "kv", version = "v2");
/// ```
#[macro_export]
macro_rules! walk_span {
    ($operation:expr, $root:expr) => {
        tracing::debug_span!(
            "walk",
            operation = %$operation,
            root = %$root,
            operation_id = %uuid::Uuid::new_v4()
        )
    };
    ($operation:expr, $root:expr, $($field:tt)*) => {
        tracing::debug_span!(
            "walk",
            operation = %$operation,
            root = %$root,
            operation_id = %uuid::Uuid::new_v4(),
            $($field)*
        )
    };
}

fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "warn"
    }
}

/// Install the global subscriber.
///
/// An already-installed subscriber (e.g. in tests) is left in place.
pub fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::debug!("Global subscriber already set");
    }
}
