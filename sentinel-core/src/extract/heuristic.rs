//! Offline, pattern-based structurer.
//!
//! Used when no language model is configured. It finds contacts and tax ids
//! reliably and makes a reasonable guess at the vendor and the line-item table.

use regex::Regex;
use tracing::debug;

use super::document::DocumentKind;
use super::structured::{StructuredInvoice, TableSize};
use crate::error::{Result, SentinelError};

const HEADER_KEYWORDS: &[&str] = &[
    "description",
    "item",
    "items",
    "particulars",
    "product",
    "qty",
    "quantity",
    "rate",
    "price",
    "unit",
    "amount",
    "total",
    "hsn",
    "sac",
    "sl",
    "s.no",
    "no.",
    "tax",
    "gst",
    "discount",
];

const TITLE_WORDS: &[&str] = &[
    "invoice",
    "tax invoice",
    "bill",
    "receipt",
    "original",
    "duplicate",
    "cash memo",
    "estimate",
];

pub struct HeuristicStructurer {
    email: Regex,
    phone: Regex,
    gstin: Regex,
    pan: Regex,
    vendor_label: Regex,
    cell_split: Regex,
}

impl std::fmt::Debug for HeuristicStructurer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("HeuristicStructurer")
    }
}

impl HeuristicStructurer {
    pub fn new() -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern)
                .map_err(|e| SentinelError::InvalidConfig(format!("Invalid pattern: {e}")))
        };

        Ok(Self {
            email: compile(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}")?,
            phone: compile(r"\+?\(?\d[\d \t().-]{7,}\d")?,
            gstin: compile(r"\b\d{2}[A-Z]{5}\d{4}[A-Z][1-9A-Z]Z[0-9A-Z]\b")?,
            pan: compile(r"\b[A-Z]{5}\d{4}[A-Z]\b")?,
            vendor_label: compile(
                r"(?im)^\s*(?:vendor|seller|supplier|from|billed\s+by|sold\s+by)\s*(?:name)?\s*[:\-]\s*(.+?)\s*$",
            )?,
            cell_split: compile(r"\s*\|\s*|\t+|\s{2,}")?,
        })
    }

    /// Structure OCR text without any external service.
    pub fn structure_text(&self, text: &str, kind: DocumentKind) -> StructuredInvoice {
        let email_addresses = dedup(self.email.find_iter(text).map(|m| m.as_str().to_string()));
        let phone_numbers = dedup(
            self.phone
                .find_iter(text)
                .map(|m| m.as_str().trim().to_string())
                .filter(|p| (10..=15).contains(&p.chars().filter(char::is_ascii_digit).count())),
        );

        let upper = text.to_uppercase();
        let gst_or_pan = self
            .gstin
            .find(&upper)
            .or_else(|| self.pan.find(&upper))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();

        let vendor_name = self.vendor(text);
        let (table_headers, table_row_data) = self.table(text);
        let table_size = if table_headers.is_empty() {
            TableSize::default()
        } else {
            TableSize {
                rows: Some(table_row_data.len() as u64),
                columns: Some(table_headers.len() as u64),
            }
        };

        let scanned_or_typed = match kind {
            DocumentKind::Png | DocumentKind::Jpeg => "scanned",
            DocumentKind::Pdf | DocumentKind::Text => "typed",
        };

        debug!(
            vendor = %vendor_name,
            emails = email_addresses.len(),
            phones = phone_numbers.len(),
            columns = table_headers.len(),
            "Heuristic structuring complete"
        );

        StructuredInvoice {
            vendor_name,
            phone_numbers,
            email_addresses,
            gst_or_pan,
            table_headers,
            table_row_data,
            table_size,
            scanned_or_typed: scanned_or_typed.to_string(),
            handwritten_or_typed: String::new(),
        }
    }

    /// A labelled vendor line wins; otherwise the first line that looks like a
    /// name rather than a title, contact or number.
    fn vendor(&self, text: &str) -> String {
        if let Some(caps) = self.vendor_label.captures(text) {
            return caps[1].to_string();
        }

        text.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with("--- Page"))
            .take(8)
            .find(|line| self.looks_like_name(line))
            .unwrap_or_default()
            .to_string()
    }

    fn looks_like_name(&self, line: &str) -> bool {
        let lower = line.to_lowercase();
        let letters = line.chars().filter(|c| c.is_alphabetic()).count();
        let digits = line.chars().filter(|c| c.is_ascii_digit()).count();

        line.len() <= 80
            && letters >= 2
            && digits * 2 < letters
            && !TITLE_WORDS.iter().any(|t| lower == *t || lower.starts_with(&format!("{t} ")))
            && !self.email.is_match(line)
            && !lower.contains(':')
    }

    fn split_cells(&self, line: &str) -> Vec<String> {
        self.cell_split
            .split(line.trim())
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect()
    }

    fn is_header(&self, cells: &[String]) -> bool {
        let hits = cells
            .iter()
            .filter(|c| HEADER_KEYWORDS.contains(&c.to_lowercase().as_str()))
            .count();
        cells.len() >= 2 && hits >= 2
    }

    fn table(&self, text: &str) -> (Vec<String>, Vec<Vec<String>>) {
        let lines: Vec<&str> = text.lines().collect();
        let Some((start, headers)) = lines.iter().enumerate().find_map(|(i, line)| {
            let cells = self.split_cells(line);
            self.is_header(&cells).then_some((i, cells))
        }) else {
            return (Vec::new(), Vec::new());
        };

        let mut rows = Vec::new();
        for line in &lines[start + 1..] {
            let lower = line.trim().to_lowercase();
            if lower.is_empty() {
                if rows.is_empty() {
                    continue;
                }
                break;
            }
            if lower.starts_with("total") || lower.starts_with("sub total") || lower.starts_with("subtotal") {
                break;
            }
            let cells = self.split_cells(line);
            if cells.len() >= 2 && cells.iter().any(|c| c.chars().any(|ch| ch.is_ascii_digit())) {
                rows.push(cells);
            }
        }

        (headers, rows)
    }
}

fn dedup(values: impl Iterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for value in values {
        if !out.iter().any(|v| v.eq_ignore_ascii_case(&value)) {
            out.push(value);
        }
    }
    out
}

#[cfg(feature = "network")]
#[async_trait::async_trait]
impl super::FieldStructurer for HeuristicStructurer {
    async fn structure(
        &self,
        ocr: &super::ocr::OcrText,
        document: &super::document::Document,
    ) -> Result<StructuredInvoice> {
        Ok(self.structure_text(&ocr.text, document.kind))
    }

    fn name(&self) -> &'static str {
        "heuristic"
    }
}
