//! Common utility functions shared across CLI commands.

use std::path::Path;

use anyhow::{Context, Result};
use sentinel_core::extract::sanitize_name;
use sentinel_core::{Document, InvoiceFields};
use serde_json::Value;

/// Read every input file.
///
/// An unreadable path aborts the run. A readable file that is not a
/// supported document is returned as a per-document error so the rest of
/// the batch is still analyzed.
pub fn load_documents(
    paths: &[impl AsRef<Path>],
) -> Result<Vec<(String, sentinel_core::Result<Document>)>> {
    paths
        .iter()
        .map(|path| {
            let path = path.as_ref();
            let bytes = std::fs::read(path)
                .with_context(|| format!("Failed to read file: {}", path.display()))?;
            let name = file_name(path);
            let document = Document::new(&name, bytes);
            Ok((sanitize_name(&name), document))
        })
        .collect()
}

/// Load pre-extracted records: a JSON array of records or a single record.
///
/// Records without a `source_name` are named `<file>#<index>`.
pub fn load_records(path: &Path) -> Result<Vec<InvoiceFields>> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read file: {}", path.display()))?;
    let value: Value = serde_json::from_slice(&bytes)
        .with_context(|| format!("Failed to parse records in {}", path.display()))?;

    let items = match value {
        Value::Array(items) => items,
        other => vec![other],
    };

    let name = file_name(path);
    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            let mut fields: InvoiceFields = serde_json::from_value(item).with_context(|| {
                format!("Failed to parse records in {} (entry {i})", path.display())
            })?;
            if fields.source_name.trim().is_empty() {
                fields.source_name = format!("{name}#{i}");
            }
            Ok(fields)
        })
        .collect()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("document")
        .to_string()
}

/// Shorten `s` to at most `max` characters, marking the cut with `...`.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let keep = max.saturating_sub(3);
    let mut out: String = s.chars().take(keep).collect();
    out.push_str("...");
    out
}
