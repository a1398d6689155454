//! Policy command implementation.
//!
//! Shows the effective engine policy and where it came from. With the text
//! format the policy is printed as TOML, ready to be saved as a policy file.

use super::common::{LoadedPolicy, PolicySource};
use crate::formatters::format_output;
use anyhow::Result;
use serde::Serialize;
use warden_core::cli::{ExitCode, OutputFormat};
use warden_core::{BackendKind, EnginePolicy};
use warden_runtime::RESTRICTED_AVAILABLE;

/// Effective policy report.
#[derive(Debug, Clone, Serialize)]
pub struct PolicyReport {
    /// Origin of the policy
    pub source: PolicySource,
    /// Backend scripts will run on
    pub backend: BackendKind,
    /// Whether the restricted backend is compiled in
    pub restricted_available: bool,
    /// The policy itself
    pub policy: EnginePolicy,
}

impl PolicyReport {
    /// Builds the report for a loaded policy.
    #[must_use]
    pub fn new(loaded: LoadedPolicy) -> Self {
        let backend = if RESTRICTED_AVAILABLE && loaded.policy.prefer_restricted() {
            BackendKind::Restricted
        } else {
            BackendKind::Basic
        };

        Self {
            source: loaded.source,
            backend,
            restricted_available: RESTRICTED_AVAILABLE,
            policy: loaded.policy,
        }
    }
}

/// Runs the policy command.
///
/// # Errors
///
/// Returns an error if the report cannot be formatted.
pub fn run(loaded: LoadedPolicy, output_format: OutputFormat) -> Result<ExitCode> {
    let report = PolicyReport::new(loaded);

    let rendered = match output_format {
        OutputFormat::Text => format!(
            "# source: {}\n# backend: {}\n{}",
            report.source,
            report.backend,
            report.policy.to_toml_string()?
        ),
        OutputFormat::Json | OutputFormat::Pretty => format_output(&report, output_format)?,
    };
    println!("{rendered}");

    Ok(ExitCode::SUCCESS)
}
