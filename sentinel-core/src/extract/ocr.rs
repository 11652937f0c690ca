//! OCR engines.
//!
//! OCR itself is a black box: [`TesseractOcr`] shells out to the `tesseract`
//! binary (rasterizing PDFs with `pdftoppm` first) and
//! [`AzureReadOcr`](super::AzureReadOcr) calls a hosted service.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, instrument};

use super::document::{Document, DocumentKind};
use crate::error::{Result, SentinelError};

/// A rendered page image, attached to LLM requests and used for visual hashing.
#[derive(Clone)]
pub struct PageImage {
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for PageImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageImage")
            .field("mime_type", &self.mime_type)
            .field("size", &self.bytes.len())
            .finish()
    }
}

/// OCR output for one document.
#[derive(Debug, Clone, Default)]
pub struct OcrText {
    pub text: String,
    /// Page images, in page order. Empty for text documents.
    pub pages: Vec<PageImage>,
}

impl OcrText {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            pages: Vec::new(),
        }
    }
}

/// Join per-page OCR text under `--- Page N ---` headers.
pub fn join_pages<S: AsRef<str>>(pages: &[S]) -> String {
    let mut out = String::new();
    for (i, page) in pages.iter().enumerate() {
        out.push_str(&format!("\n\n--- Page {} ---\n\n{}", i + 1, page.as_ref()));
    }
    out.trim().to_string()
}

/// Turns a document into text.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn recognize(&self, document: &Document) -> Result<OcrText>;

    /// Short identifier used in logs.
    fn name(&self) -> &'static str;
}

/// Accepts only documents that are already text.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextOcr;

#[async_trait]
impl OcrEngine for PlainTextOcr {
    async fn recognize(&self, document: &Document) -> Result<OcrText> {
        document.text().map(OcrText::plain).ok_or_else(|| {
            SentinelError::UnsupportedDocument(format!(
                "{}: plain-text OCR only accepts .txt documents",
                document.name
            ))
        })
    }

    fn name(&self) -> &'static str {
        "text"
    }
}

#[derive(Debug, Clone)]
pub struct TesseractConfig {
    pub tesseract_bin: PathBuf,
    pub pdftoppm_bin: PathBuf,
    /// Rasterization resolution for PDF pages.
    pub dpi: u32,
    /// Tesseract language code (`-l`), e.g. `eng`.
    pub language: Option<String>,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        Self {
            tesseract_bin: PathBuf::from("tesseract"),
            pdftoppm_bin: PathBuf::from("pdftoppm"),
            dpi: 300,
            language: None,
        }
    }
}

impl TesseractConfig {
    /// Optional: `TESSERACT_BIN`, `PDFTOPPM_BIN`, `TESSERACT_LANG`, `SENTINEL_PDF_DPI`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(bin) = std::env::var("TESSERACT_BIN") {
            config.tesseract_bin = bin.into();
        }
        if let Ok(bin) = std::env::var("PDFTOPPM_BIN") {
            config.pdftoppm_bin = bin.into();
        }
        if let Ok(lang) = std::env::var("TESSERACT_LANG") {
            config.language = Some(lang).filter(|l| !l.trim().is_empty());
        }
        if let Some(dpi) = std::env::var("SENTINEL_PDF_DPI")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            config.dpi = dpi;
        }
        config
    }
}

/// OCR through the local `tesseract` and `pdftoppm` executables.
#[derive(Debug, Clone, Default)]
pub struct TesseractOcr {
    config: TesseractConfig,
}

impl TesseractOcr {
    pub fn new(config: TesseractConfig) -> Self {
        Self { config }
    }

    async fn ocr_image_file(&self, path: &Path) -> Result<String> {
        let mut args: Vec<&OsStr> = vec![path.as_os_str(), OsStr::new("stdout")];
        if let Some(lang) = &self.config.language {
            args.push(OsStr::new("-l"));
            args.push(OsStr::new(lang));
        }
        let stdout = run(&self.config.tesseract_bin, &args).await?;
        Ok(String::from_utf8_lossy(&stdout).into_owned())
    }

    async fn recognize_image(&self, document: &Document) -> Result<OcrText> {
        let file = tempfile::Builder::new()
            .prefix("sentinel-")
            .suffix(&format!(".{}", document.kind.extension()))
            .tempfile()?;
        tokio::fs::write(file.path(), &document.bytes).await?;

        let text = self.ocr_image_file(file.path()).await?;
        Ok(OcrText {
            text: text.trim().to_string(),
            pages: vec![PageImage {
                mime_type: document.kind.mime_type(),
                bytes: document.bytes.clone(),
            }],
        })
    }

    async fn recognize_pdf(&self, document: &Document) -> Result<OcrText> {
        let dir = tempfile::Builder::new().prefix("sentinel-pdf-").tempdir()?;
        let input = dir.path().join("input.pdf");
        tokio::fs::write(&input, &document.bytes).await?;

        let dpi = self.config.dpi.to_string();
        let prefix = dir.path().join("page");
        run(
            &self.config.pdftoppm_bin,
            &[
                OsStr::new("-r"),
                OsStr::new(&dpi),
                OsStr::new("-png"),
                input.as_os_str(),
                prefix.as_os_str(),
            ],
        )
        .await?;

        let page_paths = rendered_pages(dir.path()).await?;
        if page_paths.is_empty() {
            return Err(SentinelError::OcrError(format!(
                "{}: PDF rendered no pages",
                document.name
            )));
        }
        debug!(pages = page_paths.len(), "Rasterized PDF");

        let mut texts = Vec::with_capacity(page_paths.len());
        let mut pages = Vec::with_capacity(page_paths.len());
        for path in &page_paths {
            texts.push(self.ocr_image_file(path).await?);
            pages.push(PageImage {
                mime_type: "image/png",
                bytes: tokio::fs::read(path).await?,
            });
        }

        Ok(OcrText {
            text: join_pages(&texts),
            pages,
        })
    }
}

#[async_trait]
impl OcrEngine for TesseractOcr {
    #[instrument(level = "debug", skip_all, fields(document = %document.name, kind = %document.kind))]
    async fn recognize(&self, document: &Document) -> Result<OcrText> {
        match document.kind {
            DocumentKind::Text => PlainTextOcr.recognize(document).await,
            DocumentKind::Png | DocumentKind::Jpeg => self.recognize_image(document).await,
            DocumentKind::Pdf => self.recognize_pdf(document).await,
        }
    }

    fn name(&self) -> &'static str {
        "tesseract"
    }
}

/// `page-1.png`, `page-2.png`, ... (pdftoppm zero-pads for large documents)
/// sorted by page number.
async fn rendered_pages(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut pages: Vec<(u32, PathBuf)> = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let number = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| s.strip_prefix("page-"))
            .and_then(|n| n.parse().ok());
        let is_png = path.extension().and_then(|e| e.to_str()) == Some("png");
        if let (Some(number), true) = (number, is_png) {
            pages.push((number, path));
        }
    }

    pages.sort_by_key(|(n, _)| *n);
    Ok(pages.into_iter().map(|(_, p)| p).collect())
}

async fn run(program: &Path, args: &[&OsStr]) -> Result<Vec<u8>> {
    let output = Command::new(program)
        .args(args)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SentinelError::OcrError(format!("{} is not installed", program.display()))
            } else {
                SentinelError::OcrError(format!("Failed to run {}: {e}", program.display()))
            }
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(SentinelError::OcrError(format!(
            "{} exited with {}: {}",
            program.display(),
            output.status,
            stderr.trim()
        )));
    }

    Ok(output.stdout)
}
