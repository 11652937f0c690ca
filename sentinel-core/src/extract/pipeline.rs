use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::document::Document;
use super::ocr::{OcrEngine, OcrText};
use super::{FieldExtractor, FieldStructurer};
use crate::error::{Result, SentinelError};
use crate::model::InvoiceFields;

/// OCR followed by structuring: the standard extraction pipeline.
///
/// Text documents skip OCR. When the `perceptual-hash` feature is enabled and
/// OCR produced a page image, the first page's blockhash is added to the
/// layout signature.
pub struct OcrLlmExtractor {
    ocr: Arc<dyn OcrEngine>,
    structurer: Arc<dyn FieldStructurer>,
    visual_hash: bool,
}

impl OcrLlmExtractor {
    pub fn new(ocr: Arc<dyn OcrEngine>, structurer: Arc<dyn FieldStructurer>) -> Self {
        Self {
            ocr,
            structurer,
            visual_hash: cfg!(feature = "perceptual-hash"),
        }
    }

    /// Enable or disable visual page hashing.
    pub fn with_visual_hash(mut self, enabled: bool) -> Self {
        self.visual_hash = enabled && cfg!(feature = "perceptual-hash");
        self
    }

    #[cfg(feature = "perceptual-hash")]
    fn page_hash(&self, ocr: &OcrText) -> Option<String> {
        if !self.visual_hash {
            return None;
        }
        let page = ocr.pages.first()?;
        match crate::layout::visual_hash(&page.bytes) {
            Ok(hash) => Some(hash),
            Err(e) => {
                tracing::warn!(error = %e, "Could not hash page image");
                None
            }
        }
    }

    #[cfg(not(feature = "perceptual-hash"))]
    fn page_hash(&self, _ocr: &OcrText) -> Option<String> {
        None
    }
}

#[async_trait]
impl FieldExtractor for OcrLlmExtractor {
    #[instrument(level = "info", skip_all, fields(document = %document.name, kind = %document.kind))]
    async fn extract(&self, document: &Document) -> Result<InvoiceFields> {
        let ocr = match document.text() {
            Some(text) => OcrText::plain(text),
            None => self.ocr.recognize(document).await?,
        };

        if ocr.text.trim().is_empty() && ocr.pages.is_empty() {
            return Err(SentinelError::OcrError(format!(
                "{}: no text recognized",
                document.name
            )));
        }
        debug!(chars = ocr.text.len(), pages = ocr.pages.len(), "OCR complete");

        let structured = self.structurer.structure(&ocr, document).await?;
        let visual_hash = self.page_hash(&ocr);

        Ok(structured.into_fields(ocr.text, document.name.clone(), visual_hash))
    }

    fn name(&self) -> String {
        format!("{}+{}", self.ocr.name(), self.structurer.name())
    }
}
