//! Check command implementation.

use std::path::PathBuf;

use anyhow::Result;
use tracing::debug;

use super::{build_engine, finish};
use crate::exit_codes::ExitCode;
use crate::utils::load_records;
use crate::{EngineArgs, OutputArgs};

/// Execute the check command: ingest pre-extracted records in file order.
pub fn execute(
    files: Vec<PathBuf>,
    engine_args: EngineArgs,
    output: OutputArgs,
    quiet: bool,
) -> Result<ExitCode> {
    let mut engine = build_engine(&engine_args)?;

    for path in &files {
        let records = load_records(path)?;
        debug!(path = %path.display(), records = records.len(), "Loaded records");
        for fields in records {
            engine.ingest(fields);
        }
    }

    finish(&engine, &[], &output, quiet)
}
