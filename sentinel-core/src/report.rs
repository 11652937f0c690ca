//! Report sink: CSV export and the grouped session report.

use std::io;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::FlagEngine;
use crate::error::{Result, SentinelError};
use crate::model::{FlagKind, FlagResult, FlagStatus, InvoiceRecord, RecordId};

/// Default CSV file name for exported reports.
pub const CSV_FILE_NAME: &str = "red_flags_report.csv";

const CSV_HEADERS: [&str; 8] = [
    "record_id",
    "source",
    "vendor_name",
    "contact_email",
    "contact_phone",
    "tax_id",
    "status",
    "flags",
];

/// One CSV row per ingested record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    pub record_id: String,
    pub source: String,
    pub vendor_name: String,
    pub contact_email: String,
    pub contact_phone: String,
    pub tax_id: String,
    pub status: FlagStatus,
    /// Human-readable triggered flags with referenced record ids.
    pub flags: String,
}

impl ReportRow {
    pub fn new(record: &InvoiceRecord, result: &FlagResult) -> Self {
        Self {
            record_id: record.id.to_string(),
            source: record.source_name.clone(),
            vendor_name: record.vendor_name.clone(),
            contact_email: record.contact_email.clone(),
            contact_phone: record.contact_phone.clone(),
            tax_id: record.tax_id.clone(),
            status: result.status,
            flags: result.describe(),
        }
    }

    /// Rows for every record in the engine, in ingestion order.
    pub fn from_engine(engine: &FlagEngine) -> Vec<Self> {
        engine
            .entries()
            .map(|(record, result)| Self::new(record, result))
            .collect()
    }
}

/// Write rows as CSV. The header row is written even when `rows` is empty.
pub fn write_csv<W: io::Write>(rows: &[ReportRow], writer: W) -> Result<()> {
    let mut csv = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);

    csv.write_record(CSV_HEADERS).map_err(csv_error)?;
    for row in rows {
        csv.serialize(row).map_err(csv_error)?;
    }
    csv.flush()?;
    Ok(())
}

pub fn to_csv_string(rows: &[ReportRow]) -> Result<String> {
    let mut buf = Vec::new();
    write_csv(rows, &mut buf)?;
    String::from_utf8(buf).map_err(|e| SentinelError::ReportError(e.to_string()))
}

pub fn write_csv_file(rows: &[ReportRow], path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)?;
    write_csv(rows, io::BufWriter::new(file))
}

fn csv_error(e: csv::Error) -> SentinelError {
    SentinelError::ReportError(format!("CSV write failed: {e}"))
}

/// A document that could not be extracted and was never ingested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionFailure {
    pub source: String,
    pub error: String,
}

/// A red record within a flag group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupEntry {
    pub record_id: RecordId,
    pub source: String,
    pub vendor_name: String,
    pub conflicts_with: Vec<RecordId>,
    pub detail: String,
}

/// All records that raised one kind of flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlagGroup {
    pub kind: FlagKind,
    pub label: String,
    pub entries: Vec<GroupEntry>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub records: usize,
    pub red: usize,
    pub green: usize,
    pub failed: usize,
}

/// Everything known about a session: per-record rows, red flags grouped by
/// kind and documents that failed extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    pub generated_at: DateTime<Utc>,
    pub summary: ReportSummary,
    pub rows: Vec<ReportRow>,
    /// Only kinds that were raised at least once, in rule order.
    pub groups: Vec<FlagGroup>,
    pub failures: Vec<ExtractionFailure>,
}

impl SessionReport {
    pub fn build(engine: &FlagEngine, failures: &[ExtractionFailure]) -> Self {
        let rows = ReportRow::from_engine(engine);
        let red = engine.results().iter().filter(|r| r.is_red()).count();

        let groups = FlagKind::ALL
            .iter()
            .filter_map(|&kind| {
                let entries: Vec<GroupEntry> = engine
                    .entries()
                    .filter_map(|(record, result)| {
                        let flag = result.flag(kind)?;
                        Some(GroupEntry {
                            record_id: record.id,
                            source: record.source_name.clone(),
                            vendor_name: record.vendor_name.clone(),
                            conflicts_with: flag.conflicting_ids().collect(),
                            detail: flag
                                .conflicts
                                .iter()
                                .map(|c| format!("{} ({})", c.record_id, c.detail))
                                .collect::<Vec<_>>()
                                .join(", "),
                        })
                    })
                    .collect();
                (!entries.is_empty()).then(|| FlagGroup {
                    kind,
                    label: kind.label().to_string(),
                    entries,
                })
            })
            .collect();

        Self {
            generated_at: Utc::now(),
            summary: ReportSummary {
                records: engine.len(),
                red,
                green: engine.len() - red,
                failed: failures.len(),
            },
            rows,
            groups,
            failures: failures.to_vec(),
        }
    }

    pub fn has_red_flags(&self) -> bool {
        self.summary.red > 0
    }

    pub fn to_csv_string(&self) -> Result<String> {
        to_csv_string(&self.rows)
    }
}
