//! Output formatting for search results
//!
//! Supports JSON and YAML documents plus the plain line format: one path per
//! line, or `path = k: v, k2: v2` when values are shown.

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::io::Write;
use std::str::FromStr;

use crate::search::FoundItem;
use crate::secrets::Record;

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Plain,
    Json,
    Yaml,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "plain" | "text" => Ok(Self::Plain),
            "json" => Ok(Self::Json),
            "yaml" => Ok(Self::Yaml),
            _ => Err(format!("Unsupported output format: '{}'. Use 'plain', 'json', or 'yaml'.", s)),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Plain => "plain",
            Self::Json => "json",
            Self::Yaml => "yaml",
        };
        f.write_str(name)
    }
}

/// Print data as JSON
pub fn print_json<T: Serialize>(data: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(data).context("Failed to serialize to JSON")?;
    println!("{}", json);
    Ok(())
}

/// Print data as YAML
pub fn print_yaml<T: Serialize>(data: &T) -> Result<()> {
    let yaml = serde_yaml::to_string(data).context("Failed to serialize to YAML")?;
    print!("{}", yaml);
    Ok(())
}

/// Print the result set in `format`.
pub fn print_items(items: &[FoundItem], format: OutputFormat, show_values: bool) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(&items),
        OutputFormat::Yaml => print_yaml(&items),
        OutputFormat::Plain => {
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            for item in items {
                writeln!(out, "{}", format_item_line(item, show_values))
                    .context("Failed to write to stdout")?;
            }
            Ok(())
        }
    }
}

/// One plain-format line for an item.
pub fn format_item_line(item: &FoundItem, show_values: bool) -> String {
    match (&item.value, show_values) {
        (Some(value), true) => format!("{} = {}", item.path, format_record(value, false)),
        _ => item.path.clone(),
    }
}

/// Renders a payload as `k: v` pairs, comma separated or one per line.
pub fn format_record(record: &Record, multiline: bool) -> String {
    let mut entries: Vec<(&String, &Value)> = record.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    let parts: Vec<String> =
        entries.into_iter().map(|(k, v)| format!("{}: {}", k, scalar_to_string(v))).collect();
    parts.join(if multiline { "\n" } else { ", " })
}

/// Strings unquoted, null empty, numbers and booleans plain, arrays of
/// scalars comma separated, anything nested as compact JSON.
pub fn scalar_to_string(value: &Value) -> String {
    if let Some(s) = try_scalar(value) {
        return s;
    }
    match value {
        Value::Array(elements) => elements
            .iter()
            .map(|e| try_scalar(e).unwrap_or_else(|| e.to_string()))
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

fn try_scalar(value: &Value) -> Option<String> {
    match value {
        Value::Null => Some(String::new()),
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
