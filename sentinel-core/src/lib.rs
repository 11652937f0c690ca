//! Sentinel Core - invoice red-flag detection
//!
//! This crate compares invoices within one analysis session and flags
//! suspicious patterns:
//!
//! - the same email or phone number used by different vendors,
//! - the same document layout used by different vendors,
//! - a vendor whose invoices do not share a layout.
//!
//! # Features
//!
//! - [`FlagEngine`]: ordered, session-scoped rule evaluation with indexed history
//! - Pluggable layout similarity ([`LayoutSimilarity`])
//! - Field extraction through OCR and an LLM or heuristic structurer
//!   ([`extract`], feature `network`)
//! - Visual page hashing for layout comparison (feature `perceptual-hash`)
//! - CSV and grouped JSON reports ([`report`])
//!
//! # Example
//!
//! ```
//! use sentinel_core::{FlagEngine, EngineConfig, InvoiceFields, FlagKind};
//!
//! # fn example() -> sentinel_core::Result<()> {
//! let mut engine = FlagEngine::new(EngineConfig::default())?;
//!
//! engine.ingest(InvoiceFields {
//!     vendor_name: "Acme".into(),
//!     layout_signature: "typed::description | qty | amount::2x3::typed".into(),
//!     ..Default::default()
//! });
//! let result = engine.ingest(InvoiceFields {
//!     vendor_name: "Globex".into(),
//!     layout_signature: "typed::description | qty | amount::2x3::typed".into(),
//!     ..Default::default()
//! });
//!
//! assert!(result.flag(FlagKind::SameLayoutDifferentVendor).is_some());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod extract;
pub mod layout;
pub mod model;
pub mod normalize;
pub mod report;
pub mod similarity;

pub use config::{
    EngineConfig, VendorMatching, DEFAULT_DIFFERENT_LAYOUT_THRESHOLD,
    DEFAULT_SAME_LAYOUT_THRESHOLD, DEFAULT_VENDOR_FUZZY_THRESHOLD,
};
pub use engine::{FlagEngine, History};
pub use error::{Result, SentinelError};
pub use extract::{Document, DocumentKind};
pub use model::{
    Conflict, ConflictDetail, Flag, FlagKind, FlagResult, FlagStatus, InvoiceFields,
    InvoiceRecord, LayoutSignature, RecordId,
};
pub use report::{ExtractionFailure, ReportRow, SessionReport, CSV_FILE_NAME};
pub use similarity::{DiceSimilarity, LayoutSimilarity, LevenshteinSimilarity, SimilarityKind};

#[cfg(feature = "perceptual-hash")]
pub use similarity::PerceptualSimilarity;

// Network-dependent exports
#[cfg(feature = "network")]
pub use extract::{ExtractorConfig, ExtractorFactory, FieldExtractor};
