//! Analyze command implementation.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use futures::stream::{self, StreamExt};
use sentinel_core::extract::{OcrKind, StructurerKind};
use sentinel_core::{
    ExtractionFailure, ExtractorConfig, ExtractorFactory, FieldExtractor, SentinelError,
};
use tracing::{debug, info, warn};

use super::{build_engine, finish};
use crate::exit_codes::ExitCode;
use crate::utils::{load_documents, truncate};
use crate::{EngineArgs, ExtractorArg, OcrArg, OutputArgs};

/// Extraction settings for one run.
pub struct AnalyzeOptions {
    pub extractor: ExtractorArg,
    pub ocr: OcrArg,
    pub jobs: usize,
    pub visual_hash: bool,
}

impl From<ExtractorArg> for StructurerKind {
    fn from(arg: ExtractorArg) -> Self {
        match arg {
            ExtractorArg::Auto => Self::Auto,
            ExtractorArg::Heuristic => Self::Heuristic,
            ExtractorArg::Openai => Self::OpenAi,
        }
    }
}

impl From<OcrArg> for OcrKind {
    fn from(arg: OcrArg) -> Self {
        match arg {
            OcrArg::Auto => Self::Auto,
            OcrArg::Text => Self::Text,
            OcrArg::Tesseract => Self::Tesseract,
            OcrArg::Azure => Self::Azure,
        }
    }
}

/// Execute the analyze command.
///
/// Documents are extracted concurrently but ingested in command-line order,
/// so record ids and flags do not depend on which extraction finishes first.
pub async fn execute(
    files: Vec<PathBuf>,
    options: AnalyzeOptions,
    engine_args: EngineArgs,
    output: OutputArgs,
    quiet: bool,
) -> Result<ExitCode> {
    let mut engine = build_engine(&engine_args)?;

    let mut config = ExtractorConfig::from_kinds(options.ocr.into(), options.extractor.into())?;
    config.visual_hash = options.visual_hash;
    let extractor: Arc<dyn FieldExtractor> = ExtractorFactory::create(config)?;

    let documents = load_documents(&files)?;
    info!(
        documents = documents.len(),
        extractor = %extractor.name(),
        jobs = options.jobs,
        "Analyzing documents"
    );

    let outcomes: Vec<_> = stream::iter(documents)
        .map(|(name, document)| {
            let extractor = Arc::clone(&extractor);
            async move {
                let fields = match document {
                    Ok(document) => extractor.extract(&document).await,
                    Err(e) => Err(e),
                };
                (name, fields)
            }
        })
        .buffered(options.jobs.max(1))
        .collect()
        .await;

    let mut failures = Vec::new();
    let mut service_error = None;
    for (name, outcome) in outcomes {
        match outcome {
            Ok(fields) => {
                let result = engine.ingest(fields);
                debug!(source = %name, record_id = %result.record_id, status = %result.status, "Ingested");
            }
            Err(e) => {
                warn!(source = %name, error = %e, "Extraction failed");
                failures.push(ExtractionFailure {
                    source: name,
                    error: describe_failure(&e),
                });
                if e.is_service_failure() && service_error.is_none() {
                    service_error = Some(e);
                }
            }
        }
    }

    // Nothing could be analyzed because the service is down: report that
    // instead of an empty, all-green session.
    if engine.is_empty() {
        if let Some(e) = service_error {
            return Err(anyhow::Error::new(e).context("Extraction service unavailable"));
        }
    }

    finish(&engine, &failures, &output, quiet)
}

fn describe_failure(err: &SentinelError) -> String {
    match err {
        SentinelError::UnstructuredResponse { raw_output } => {
            format!("{err}: {}", truncate(raw_output.trim(), 200))
        }
        other => other.to_string(),
    }
}
