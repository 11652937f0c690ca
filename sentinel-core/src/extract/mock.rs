use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use super::document::Document;
use super::FieldExtractor;
use crate::error::{Result, SentinelError};
use crate::model::InvoiceFields;

/// Canned extractor for tests: returns preset fields per document name.
///
/// Documents with no preset are read as a JSON [`InvoiceFields`] object when
/// they are text, and rejected otherwise.
#[derive(Debug, Clone, Default)]
pub struct MockExtractor {
    fields: HashMap<String, InvoiceFields>,
    failures: HashMap<String, String>,
    latencies: HashMap<String, Duration>,
}

impl MockExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `fields` for documents named `name`.
    pub fn with_fields(mut self, name: &str, fields: InvoiceFields) -> Self {
        self.fields.insert(name.to_string(), fields);
        self
    }

    /// Fail documents named `name` with an OCR service error.
    pub fn with_failure(mut self, name: &str, message: &str) -> Self {
        self.failures.insert(name.to_string(), message.to_string());
        self
    }

    /// Delay extraction of documents named `name`, like a slow OCR call.
    pub fn with_latency(mut self, name: &str, latency: Duration) -> Self {
        self.latencies.insert(name.to_string(), latency);
        self
    }
}

#[async_trait]
impl FieldExtractor for MockExtractor {
    async fn extract(&self, document: &Document) -> Result<InvoiceFields> {
        if let Some(latency) = self.latencies.get(&document.name) {
            tokio::time::sleep(*latency).await;
        }
        if let Some(message) = self.failures.get(&document.name) {
            return Err(SentinelError::OcrError(message.clone()));
        }
        if let Some(fields) = self.fields.get(&document.name) {
            let mut fields = fields.clone();
            fields.source_name = document.name.clone();
            return Ok(fields);
        }

        let text = document.text().ok_or_else(|| {
            SentinelError::UnsupportedDocument(format!("{}: no preset fields", document.name))
        })?;
        let mut fields: InvoiceFields = serde_json::from_str(text).map_err(|_| {
            SentinelError::UnstructuredResponse {
                raw_output: text.to_string(),
            }
        })?;
        fields.source_name = document.name.clone();
        Ok(fields)
    }

    fn name(&self) -> String {
        "mock".to_string()
    }
}
