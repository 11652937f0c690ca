//! CLI command implementations.

pub mod analyze;
pub mod check;

use anyhow::{Context, Result};
use sentinel_core::report::write_csv_file;
use sentinel_core::{EngineConfig, ExtractionFailure, FlagEngine, SessionReport, VendorMatching};
use tracing::info;

use crate::exit_codes::{ExitCode, DATA_ERROR};
use crate::{output, EngineArgs, Format, OutputArgs};

/// Build the engine from `SENTINEL_*` variables overridden by flags.
pub fn build_engine(args: &EngineArgs) -> Result<FlagEngine> {
    let mut config = EngineConfig::from_env()?;

    if let Some(v) = args.same_layout {
        config.same_layout_threshold = v;
    }
    if let Some(v) = args.different_layout {
        config.different_layout_threshold = v;
    }
    if let Some(threshold) = args.vendor_fuzzy {
        config.vendor_matching = VendorMatching::Fuzzy { threshold };
    }
    if let Some(kind) = &args.similarity {
        config.similarity = kind.parse()?;
    }

    Ok(FlagEngine::new(config)?)
}

/// Emit the session report in the requested format and decide the exit code.
pub fn finish(
    engine: &FlagEngine,
    failures: &[ExtractionFailure],
    args: &OutputArgs,
    quiet: bool,
) -> Result<ExitCode> {
    let report = SessionReport::build(engine, failures);

    if let Some(path) = &args.csv {
        write_csv_file(&report.rows, path)
            .with_context(|| format!("Failed to write CSV report: {}", path.display()))?;
        info!(path = %path.display(), rows = report.rows.len(), "Wrote CSV report");
    }

    match args.format {
        Format::Json => {
            let json =
                serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
            println!("{json}");
        }
        Format::Table => {
            if !quiet {
                output::print_report(&report, args.csv.as_deref());
            }
        }
    }

    if args.strict && report.has_red_flags() {
        return Ok(ExitCode::error(
            DATA_ERROR,
            format!(
                "{} of {} records raised red flags",
                report.summary.red, report.summary.records
            ),
        ));
    }
    Ok(ExitCode::success())
}
