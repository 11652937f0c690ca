//! Field extraction: document → [`InvoiceFields`](crate::InvoiceFields).
//!
//! Extraction runs in two stages, each behind a trait:
//!
//! - **OCR** ([`OcrEngine`]) turns a PDF or image into text plus page images
//!   ([`TesseractOcr`], [`AzureReadOcr`], [`PlainTextOcr`]).
//! - **Structuring** ([`FieldStructurer`]) turns that text into a
//!   [`StructuredInvoice`] ([`OpenAiStructurer`], [`HeuristicStructurer`]).
//!
//! [`OcrLlmExtractor`] composes the two into a [`FieldExtractor`].
//!
//! ## Quick Start
//!
//! ```no_run
//! use sentinel_core::extract::{Document, ExtractorConfig, ExtractorFactory};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // OpenAI if OPENAI_API_KEY is set, heuristic otherwise
//! let extractor = ExtractorFactory::create(ExtractorConfig::default())?;
//! let document = Document::from_path("invoice.pdf".as_ref())?;
//! let fields = extractor.extract(&document).await?;
//! println!("{}", fields.vendor_name);
//! # Ok(())
//! # }
//! ```
//!
//! Extraction failures are per document: a document that fails is reported
//! and never reaches the flag engine.

mod document;
mod heuristic;
mod structured;

#[cfg(feature = "network")]
mod azure;
#[cfg(feature = "network")]
mod factory;
#[cfg(feature = "network")]
pub mod http_client;
#[cfg(feature = "network")]
mod mock;
#[cfg(feature = "network")]
mod ocr;
#[cfg(feature = "network")]
mod openai;
#[cfg(feature = "network")]
mod pipeline;

pub use document::{sanitize_name, Document, DocumentKind};
pub use heuristic::HeuristicStructurer;
pub use structured::{StructuredInvoice, TableSize};

#[cfg(feature = "network")]
pub use azure::{AzureReadConfig, AzureReadOcr, DEFAULT_AZURE_API_VERSION};
#[cfg(feature = "network")]
pub use factory::{
    ExtractorConfig, ExtractorFactory, OcrConfig, OcrKind, StructurerConfig, StructurerKind,
};
#[cfg(feature = "network")]
pub use http_client::HttpConfig;
#[cfg(feature = "network")]
pub use mock::MockExtractor;
#[cfg(feature = "network")]
pub use ocr::{join_pages, OcrEngine, OcrText, PageImage, PlainTextOcr, TesseractConfig, TesseractOcr};
#[cfg(feature = "network")]
pub use openai::{
    extraction_prompt, parse_structured, OpenAiConfig, OpenAiStructurer, DEFAULT_OPENAI_BASE_URL,
    DEFAULT_OPENAI_MODEL,
};
#[cfg(feature = "network")]
pub use pipeline::OcrLlmExtractor;

#[cfg(feature = "network")]
use async_trait::async_trait;

#[cfg(feature = "network")]
use crate::error::Result;
#[cfg(feature = "network")]
use crate::model::InvoiceFields;

/// Turns OCR output into structured invoice fields.
#[cfg(feature = "network")]
#[async_trait]
pub trait FieldStructurer: Send + Sync {
    async fn structure(&self, ocr: &OcrText, document: &Document) -> Result<StructuredInvoice>;

    /// Short identifier used in logs.
    fn name(&self) -> &'static str;
}

/// Turns an uploaded document into engine input.
///
/// Implementations must be thread-safe: the binaries run several
/// extractions concurrently against one extractor.
#[cfg(feature = "network")]
#[async_trait]
pub trait FieldExtractor: Send + Sync {
    async fn extract(&self, document: &Document) -> Result<InvoiceFields>;

    /// Identifier for logs and reports, e.g. `tesseract+openai`.
    fn name(&self) -> String;
}
