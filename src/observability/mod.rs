//! # Observability
//!
//! Structured logging for the search engine and CLI.

pub mod logging;

pub use logging::init_logging;
