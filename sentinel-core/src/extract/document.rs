//! Uploaded documents and type detection.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SentinelError};

/// Supported document formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Pdf,
    Png,
    Jpeg,
    /// Text that has already been through OCR.
    Text,
}

impl DocumentKind {
    /// Detect the kind from magic bytes, then from the file extension.
    pub fn detect(name: &str, bytes: &[u8]) -> Result<Self> {
        if bytes.starts_with(b"%PDF-") {
            return Ok(Self::Pdf);
        }
        if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Ok(Self::Png);
        }
        if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Ok(Self::Jpeg);
        }

        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        match ext.as_deref() {
            Some("txt") if std::str::from_utf8(bytes).is_ok() => Ok(Self::Text),
            Some("txt") => Err(SentinelError::UnsupportedDocument(format!(
                "{name}: text file is not valid UTF-8"
            ))),
            Some("pdf" | "png" | "jpg" | "jpeg") => Err(SentinelError::UnsupportedDocument(
                format!("{name}: content does not match its extension"),
            )),
            _ => Err(SentinelError::UnsupportedDocument(format!(
                "{name}: expected PDF, PNG, JPEG or TXT"
            ))),
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, Self::Png | Self::Jpeg)
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Text => "text/plain",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Text => "txt",
        }
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// An uploaded invoice document held in memory.
#[derive(Clone)]
pub struct Document {
    /// Sanitized file name.
    pub name: String,
    pub bytes: Vec<u8>,
    pub kind: DocumentKind,
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("size", &self.bytes.len())
            .finish()
    }
}

impl Document {
    /// Build a document from an uploaded name and its bytes.
    pub fn new(name: &str, bytes: Vec<u8>) -> Result<Self> {
        if bytes.is_empty() {
            return Err(SentinelError::UnsupportedDocument(format!("{name}: file is empty")));
        }
        let kind = DocumentKind::detect(name, &bytes)?;
        Ok(Self {
            name: sanitize_name(name),
            bytes,
            kind,
        })
    }

    /// Read a document from disk.
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("document");
        Self::new(name, bytes)
    }

    /// UTF-8 contents of a text document.
    pub fn text(&self) -> Option<&str> {
        match self.kind {
            DocumentKind::Text => std::str::from_utf8(&self.bytes).ok(),
            _ => None,
        }
    }
}

/// Replace every character outside `[A-Za-z0-9_.-]` with `_`. Path
/// separators are replaced too, so the result is always a bare file name.
pub fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        "document".to_string()
    } else {
        cleaned
    }
}
