//! Layout fingerprinting.
//!
//! A structural fingerprint is a short feature string built from what the
//! structurer reported about a document's table and production style:
//!
//! ```text
//! {scanned_or_typed}::{table headers, lowercased, joined by " | "}::{rows}x{columns}::{handwritten_or_typed}
//! ```
//!
//! e.g. `typed::description | qty | rate | amount::2x4::typed`. Missing parts
//! become `unknown` (or `?` for table dimensions). A document with no layout
//! evidence at all gets an empty fingerprint, which the engine treats as an
//! unknown layout.
//!
//! With the `perceptual-hash` feature, page images can additionally be reduced
//! to a 64-bit blockhash for visual comparison.

use crate::extract::StructuredInvoice;
use crate::model::LayoutSignature;

const UNKNOWN: &str = "unknown";

/// Build the structural fingerprint for a structured invoice.
pub fn fingerprint(invoice: &StructuredInvoice) -> String {
    let style = clean(&invoice.scanned_or_typed);
    let hand = clean(&invoice.handwritten_or_typed);
    let headers: Vec<String> = invoice
        .table_headers
        .iter()
        .map(|h| h.trim().to_lowercase())
        .filter(|h| !h.is_empty())
        .collect();
    let rows = invoice.table_size.rows;
    let columns = invoice.table_size.columns;

    if style.is_empty() && hand.is_empty() && headers.is_empty() && rows.is_none() && columns.is_none()
    {
        return String::new();
    }

    let style = or_unknown(&style);
    let body = if headers.is_empty() {
        style.clone()
    } else {
        headers.join(" | ")
    };
    let size = format!("{}x{}", dimension(rows), dimension(columns));

    format!("{style}::{body}::{size}::{}", or_unknown(&hand))
}

/// Layout signature for a structured invoice, optionally carrying a visual hash.
pub fn signature(invoice: &StructuredInvoice, visual_hash: Option<String>) -> LayoutSignature {
    LayoutSignature {
        fingerprint: fingerprint(invoice),
        visual_hash,
    }
}

fn clean(value: &str) -> String {
    value.trim().to_lowercase()
}

fn or_unknown(value: &str) -> String {
    if value.is_empty() {
        UNKNOWN.to_string()
    } else {
        value.to_string()
    }
}

fn dimension(value: Option<u64>) -> String {
    value.map_or_else(|| "?".to_string(), |v| v.to_string())
}

/// Number of differing bits between two hashes.
///
/// Hashes of different lengths are compared on their common prefix, with a
/// penalty of 8 bits per missing byte. Returns `None` if either is empty.
pub fn hamming_distance(a: &[u8], b: &[u8]) -> Option<u32> {
    if a.is_empty() || b.is_empty() {
        return None;
    }

    let common: u32 = a.iter().zip(b).map(|(x, y)| (x ^ y).count_ones()).sum();
    let penalty = (a.len().abs_diff(b.len()) * 8) as u32;

    Some(common + penalty)
}

/// Hex-encoded blockhash64 of an encoded image (PNG, JPEG, GIF, WebP).
#[cfg(feature = "perceptual-hash")]
pub fn visual_hash(image_data: &[u8]) -> crate::error::Result<String> {
    use blockhash::{blockhash64, Blockhash64};

    let image = image::load_from_memory(image_data).map_err(|e| {
        crate::error::SentinelError::UnsupportedDocument(format!("Failed to decode image: {e}"))
    })?;
    let hash: Blockhash64 = blockhash64(&image);
    let bytes: [u8; 8] = hash.into();
    Ok(hex::encode(bytes))
}
