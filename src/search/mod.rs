//! # Secret Discovery
//!
//! Recursive search over KV mounts:
//! - [`paths`]: logical path to API path translation for both KV layouts
//! - [`filter`]: name substring and path regex matching
//! - [`walker`]: depth-limited recursive walk in batch or streaming form
//! - [`reader`]: value reads with v2 unwrapping, plus on-demand fetch
//! - [`mounts`]: mount listing with the restricted-token fallback
//! - [`detect`]: per-mount layout detection and [`VersionPolicy`]
//! - [`collect`]: routing a [`SearchRequest`] over its walk roots
//!
//! Every remote call runs under a [`WalkControl`], so a walk stops promptly
//! when cancelled or past its deadline.

pub mod collect;
pub mod control;
pub mod detect;
pub mod filter;
pub mod mounts;
pub mod paths;
pub mod reader;
pub mod walker;

pub use collect::{collect_items, parse_path_list, run_search, stream_items, SearchRequest, SearchTarget};
pub use control::WalkControl;
pub use detect::{detect_kv_version, Detection, VersionPolicy};
pub use filter::Filter;
pub use mounts::{list_mounts_with_fallback, merge_ui_mounts};
pub use reader::{fetch_value_lazily, read_secret};
pub use walker::{walk_vault, walk_vault_stream, FoundItem, ItemSink, WalkOptions};
