//! Extractor construction from configuration.

use std::str::FromStr;
use std::sync::Arc;

use super::azure::{AzureReadConfig, AzureReadOcr};
use super::heuristic::HeuristicStructurer;
use super::mock::MockExtractor;
use super::ocr::{OcrEngine, PlainTextOcr, TesseractConfig, TesseractOcr};
use super::openai::{OpenAiConfig, OpenAiStructurer};
use super::pipeline::OcrLlmExtractor;
use super::{FieldExtractor, FieldStructurer};
use crate::error::{Result, SentinelError};

/// Which OCR engine to use.
#[derive(Debug, Clone, Default)]
pub enum OcrConfig {
    /// Azure if `AZURE_OCR_ENDPOINT` and `AZURE_OCR_KEY` are set, else Tesseract.
    #[default]
    Auto,
    /// Text documents only.
    Text,
    Tesseract(TesseractConfig),
    Azure(AzureReadConfig),
}

/// Which field structurer to use.
#[derive(Debug, Clone, Default)]
pub enum StructurerConfig {
    /// OpenAI if `OPENAI_API_KEY` is set, else the heuristic structurer.
    #[default]
    Auto,
    Heuristic,
    OpenAi(OpenAiConfig),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OcrKind {
    #[default]
    Auto,
    Text,
    Tesseract,
    Azure,
}

impl FromStr for OcrKind {
    type Err = SentinelError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "text" => Ok(Self::Text),
            "tesseract" => Ok(Self::Tesseract),
            "azure" => Ok(Self::Azure),
            other => Err(SentinelError::InvalidConfig(format!(
                "Unknown OCR engine '{other}' (expected auto, text, tesseract or azure)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StructurerKind {
    #[default]
    Auto,
    Heuristic,
    OpenAi,
}

impl FromStr for StructurerKind {
    type Err = SentinelError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "heuristic" => Ok(Self::Heuristic),
            "openai" => Ok(Self::OpenAi),
            other => Err(SentinelError::InvalidConfig(format!(
                "Unknown extractor '{other}' (expected auto, heuristic or openai)"
            ))),
        }
    }
}

impl OcrConfig {
    /// Resolve a kind, reading credentials from the environment when needed.
    pub fn from_kind(kind: OcrKind) -> Result<Self> {
        Ok(match kind {
            OcrKind::Auto => Self::Auto,
            OcrKind::Text => Self::Text,
            OcrKind::Tesseract => Self::Tesseract(TesseractConfig::from_env()),
            OcrKind::Azure => Self::Azure(AzureReadConfig::from_env()?),
        })
    }
}

impl StructurerConfig {
    pub fn from_kind(kind: StructurerKind) -> Result<Self> {
        Ok(match kind {
            StructurerKind::Auto => Self::Auto,
            StructurerKind::Heuristic => Self::Heuristic,
            StructurerKind::OpenAi => Self::OpenAi(OpenAiConfig::from_env()?),
        })
    }
}

#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    pub ocr: OcrConfig,
    pub structurer: StructurerConfig,
    /// Add a visual page hash to layout signatures when possible.
    pub visual_hash: bool,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            ocr: OcrConfig::Auto,
            structurer: StructurerConfig::Auto,
            visual_hash: true,
        }
    }
}

impl ExtractorConfig {
    pub fn from_kinds(ocr: OcrKind, structurer: StructurerKind) -> Result<Self> {
        Ok(Self {
            ocr: OcrConfig::from_kind(ocr)?,
            structurer: StructurerConfig::from_kind(structurer)?,
            visual_hash: true,
        })
    }

    /// Optional: `SENTINEL_OCR` (auto, text, tesseract, azure),
    /// `SENTINEL_EXTRACTOR` (auto, heuristic, openai), `SENTINEL_VISUAL_HASH`.
    pub fn from_env() -> Result<Self> {
        let ocr = match std::env::var("SENTINEL_OCR") {
            Ok(v) => v.parse()?,
            Err(_) => OcrKind::Auto,
        };
        let structurer = match std::env::var("SENTINEL_EXTRACTOR") {
            Ok(v) => v.parse()?,
            Err(_) => StructurerKind::Auto,
        };

        let mut config = Self::from_kinds(ocr, structurer)?;
        if let Ok(v) = std::env::var("SENTINEL_VISUAL_HASH") {
            config.visual_hash = !matches!(v.trim(), "0" | "false" | "no" | "off");
        }
        Ok(config)
    }
}

/// Factory for field extractors.
pub struct ExtractorFactory;

impl ExtractorFactory {
    pub fn create(config: ExtractorConfig) -> Result<Arc<dyn FieldExtractor>> {
        let ocr = Self::create_ocr(config.ocr)?;
        let structurer = Self::create_structurer(config.structurer)?;
        let extractor = OcrLlmExtractor::new(ocr, structurer).with_visual_hash(config.visual_hash);
        tracing::info!(extractor = %extractor.name(), "Field extractor ready");
        Ok(Arc::new(extractor))
    }

    pub fn create_ocr(config: OcrConfig) -> Result<Arc<dyn OcrEngine>> {
        match config {
            OcrConfig::Auto => Self::create_ocr_auto(),
            OcrConfig::Text => Ok(Arc::new(PlainTextOcr)),
            OcrConfig::Tesseract(config) => Ok(Arc::new(TesseractOcr::new(config))),
            OcrConfig::Azure(config) => Ok(Arc::new(AzureReadOcr::new(config)?)),
        }
    }

    pub fn create_structurer(config: StructurerConfig) -> Result<Arc<dyn FieldStructurer>> {
        match config {
            StructurerConfig::Auto => Self::create_structurer_auto(),
            StructurerConfig::Heuristic => Ok(Arc::new(HeuristicStructurer::new()?)),
            StructurerConfig::OpenAi(config) => Ok(Arc::new(OpenAiStructurer::new(config)?)),
        }
    }

    /// Priority:
    /// 1. Azure Read (if `AZURE_OCR_ENDPOINT` and `AZURE_OCR_KEY` are set)
    /// 2. Local Tesseract
    fn create_ocr_auto() -> Result<Arc<dyn OcrEngine>> {
        if let Ok(config) = AzureReadConfig::from_env() {
            tracing::info!("Auto-selected Azure Read OCR");
            return Self::create_ocr(OcrConfig::Azure(config));
        }

        tracing::info!("Auto-selected Tesseract OCR");
        Self::create_ocr(OcrConfig::Tesseract(TesseractConfig::from_env()))
    }

    /// Priority:
    /// 1. OpenAI (if `OPENAI_API_KEY` is set)
    /// 2. Heuristic structurer
    fn create_structurer_auto() -> Result<Arc<dyn FieldStructurer>> {
        if let Ok(config) = OpenAiConfig::from_env() {
            tracing::info!(model = %config.model, "Auto-selected OpenAI structurer");
            return Self::create_structurer(StructurerConfig::OpenAi(config));
        }

        tracing::info!("Auto-selected heuristic structurer");
        Self::create_structurer(StructurerConfig::Heuristic)
    }

    /// Offline extractor: plain-text OCR and the heuristic structurer.
    pub fn create_offline() -> Result<Arc<dyn FieldExtractor>> {
        Self::create(ExtractorConfig {
            ocr: OcrConfig::Text,
            structurer: StructurerConfig::Heuristic,
            visual_hash: false,
        })
    }

    /// Create a mock extractor for testing.
    pub fn create_mock() -> Arc<dyn FieldExtractor> {
        Arc::new(MockExtractor::default())
    }
}
