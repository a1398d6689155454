//! Apply command implementation.
//!
//! Runs a script over a batch of records and reports the trace.

use super::common::{read_records, read_script, write_records};
use crate::formatters::format_output;
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{error, info};
use warden_core::cli::{ExitCode, OutputFormat};
use warden_core::{EnginePolicy, ExecutionTrace, Record};
use warden_runtime::BatchOrchestrator;

/// Arguments of the apply command.
#[derive(Debug, Clone)]
pub struct ApplyArgs {
    /// Script file
    pub script: PathBuf,
    /// Records file (JSON array or NDJSON)
    pub records: PathBuf,
    /// File receiving the transformed records; printed with the report when absent
    pub output: Option<PathBuf>,
    /// Exit with [`ExitCode::RECORD_FAILURES`] if any record failed
    pub strict: bool,
}

/// Report printed after a batch.
#[derive(Debug, Clone, Serialize)]
pub struct ApplyReport {
    /// Where the transformed records were written
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// Transformed records, when not written to a file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records: Option<Vec<Record>>,
    /// Batch trace
    pub trace: ExecutionTrace,
}

/// Report printed when the script is rejected.
#[derive(Debug, Clone, Serialize)]
pub struct RejectionReport {
    /// Script path as given
    pub script: String,
    /// Rejection reason
    pub reason: String,
}

/// Runs the apply command.
///
/// Exit codes: [`ExitCode::INVALID_INPUT`] for unreadable records,
/// [`ExitCode::SCRIPT_REJECTED`] for a rejected script, and
/// [`ExitCode::RECORD_FAILURES`] when `strict` is set and a record failed.
///
/// # Errors
///
/// Returns an error if the script cannot be read, the policy is invalid, or
/// the output cannot be written.
pub async fn run(
    args: ApplyArgs,
    policy: EnginePolicy,
    output_format: OutputFormat,
) -> Result<ExitCode> {
    let source = read_script(&args.script).await?;

    let records = match read_records(&args.records).await {
        Ok(records) => records,
        Err(err) => {
            error!("{err:#}");
            eprintln!("error: {err:#}");
            return Ok(ExitCode::INVALID_INPUT);
        }
    };

    let orchestrator = BatchOrchestrator::new(policy).context("invalid policy")?;

    let output = match orchestrator.apply(&source, &records).await {
        Ok(output) => output,
        Err(reason) => {
            let report = RejectionReport {
                script: args.script.display().to_string(),
                reason: reason.to_string(),
            };
            println!("{}", format_output(&report, output_format)?);
            return Ok(ExitCode::SCRIPT_REJECTED);
        }
    };

    let failed = output.trace.failed;
    let report = if let Some(path) = &args.output {
        write_records(path, &output.records).await?;
        info!(path = %path.display(), records = output.records.len(), "records written");
        ApplyReport {
            output: Some(path.display().to_string()),
            records: None,
            trace: output.trace,
        }
    } else {
        ApplyReport {
            output: None,
            records: Some(output.records),
            trace: output.trace,
        }
    };

    println!("{}", format_output(&report, output_format)?);

    Ok(if args.strict && failed > 0 {
        ExitCode::RECORD_FAILURES
    } else {
        ExitCode::SUCCESS
    })
}
