//! Validate command implementation.
//!
//! Runs the static checks on a script without touching any record.

use super::common::read_script;
use crate::formatters::format_output;
use anyhow::Result;
use serde::Serialize;
use std::path::Path;
use tracing::info;
use warden_core::cli::{ExitCode, OutputFormat};
use warden_core::{EnginePolicy, Script};
use warden_runtime::Validator;

/// Outcome of validating one script.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ValidationReport {
    /// Script path as given
    pub script: String,
    /// Script fingerprint
    pub digest: String,
    /// Script size in bytes
    pub size_bytes: usize,
    /// Whether the script passed
    pub valid: bool,
    /// Rejection reason, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Builds the report for `source` under `policy`.
#[must_use]
pub fn check(script_path: &str, source: &str, policy: &EnginePolicy) -> ValidationReport {
    let script = Script::new(source);
    let validator = Validator::with_limits(policy.max_script_bytes(), policy.guards());
    let reason = validator.validate(&script).err().map(|e| e.to_string());

    ValidationReport {
        script: script_path.to_string(),
        digest: script.digest().to_string(),
        size_bytes: script.size(),
        valid: reason.is_none(),
        reason,
    }
}

/// Runs the validate command.
///
/// Exits with [`ExitCode::SCRIPT_REJECTED`] if the script is rejected.
///
/// # Errors
///
/// Returns an error if the script cannot be read or the report cannot be
/// formatted.
pub async fn run(
    script_path: &Path,
    policy: &EnginePolicy,
    output_format: OutputFormat,
) -> Result<ExitCode> {
    let source = read_script(script_path).await?;
    let report = check(&script_path.display().to_string(), &source, policy);

    info!(digest = %report.digest, valid = report.valid, "script validated");
    println!("{}", format_output(&report, output_format)?);

    Ok(if report.valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::SCRIPT_REJECTED
    })
}
