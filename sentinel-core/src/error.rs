use thiserror::Error;

#[derive(Error, Debug)]
pub enum SentinelError {
    #[error("OCR error: {0}")]
    OcrError(String),

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("LLM returned unstructured text")]
    UnstructuredResponse { raw_output: String },

    #[error("Unsupported document: {0}")]
    UnsupportedDocument(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Report error: {0}")]
    ReportError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "network")]
    #[error("HTTP request error: {0}")]
    HttpError(#[from] reqwest::Error),
}

impl SentinelError {
    /// Whether the failure came from an unreachable or failing upstream service
    /// (OCR engine, LLM API) rather than from the document itself.
    pub fn is_service_failure(&self) -> bool {
        match self {
            Self::OcrError(_) | Self::LlmError(_) => true,
            #[cfg(feature = "network")]
            Self::HttpError(_) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, SentinelError>;
