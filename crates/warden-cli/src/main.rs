//! Script warden CLI.
//!
//! Validates user transformation scripts and applies them to batches of
//! records in the sandboxed engine.
//!
//! # Examples
//!
//! ```bash
//! # Check a script without running it
//! warden validate flag.rhai
//!
//! # Apply a script to NDJSON records, writing the result to a file
//! warden apply flag.rhai signals.ndjson --output out.json --strict
//!
//! # Show the effective policy as TOML
//! warden --format text policy
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use warden_cli::commands::{self, apply::ApplyArgs, common};
use warden_core::cli::{ExitCode, OutputFormat};

/// Script warden - sandboxed record transformation scripts.
#[derive(Parser, Debug)]
#[command(name = "warden")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (json, text, pretty)
    #[arg(long = "format", global = true, default_value = "pretty")]
    format: String,

    /// Policy file (TOML); defaults to the user config policy when present
    #[arg(long, global = true, env = "WARDEN_POLICY")]
    policy: Option<PathBuf>,

    /// Override the per-record timeout in milliseconds
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check a script against the policy without running it.
    Validate {
        /// Script file
        script: PathBuf,
    },

    /// Apply a script to a batch of records.
    ///
    /// Records are read as a JSON array of objects or as NDJSON. Failed
    /// records are kept unchanged and listed in the trace.
    Apply {
        /// Script file
        script: PathBuf,

        /// Records file (JSON array or NDJSON)
        records: PathBuf,

        /// Write transformed records to this file instead of the report
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Exit with code 4 if any record failed
        #[arg(long)]
        strict: bool,
    },

    /// Show the effective policy and its source.
    Policy,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let output_format = cli
        .format
        .parse::<OutputFormat>()
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    let exit_code = execute_command(cli, output_format).await?;

    std::process::exit(exit_code.as_i32());
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn execute_command(cli: Cli, output_format: OutputFormat) -> Result<ExitCode> {
    let loaded = common::load_policy(cli.policy.as_deref(), cli.timeout_ms).await?;
    tracing::debug!(source = %loaded.source, "policy loaded");

    match cli.command {
        Commands::Validate { script } => {
            commands::validate::run(&script, &loaded.policy, output_format).await
        }
        Commands::Apply {
            script,
            records,
            output,
            strict,
        } => {
            let args = ApplyArgs {
                script,
                records,
                output,
                strict,
            };
            commands::apply::run(args, loaded.policy, output_format).await
        }
        Commands::Policy => commands::policy::run(loaded, output_format),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing_validate() {
        let cli = Cli::parse_from(["warden", "validate", "flag.rhai"]);
        if let Commands::Validate { script } = cli.command {
            assert_eq!(script, PathBuf::from("flag.rhai"));
        } else {
            panic!("Expected Validate command");
        }
    }

    #[test]
    fn test_cli_parsing_apply() {
        let cli = Cli::parse_from([
            "warden",
            "apply",
            "flag.rhai",
            "signals.ndjson",
            "--output",
            "/tmp/out.json",
            "--strict",
        ]);
        if let Commands::Apply {
            script,
            records,
            output,
            strict,
        } = cli.command
        {
            assert_eq!(script, PathBuf::from("flag.rhai"));
            assert_eq!(records, PathBuf::from("signals.ndjson"));
            assert_eq!(output, Some(PathBuf::from("/tmp/out.json")));
            assert!(strict);
        } else {
            panic!("Expected Apply command");
        }
    }

    #[test]
    fn test_cli_parsing_policy() {
        let cli = Cli::parse_from(["warden", "policy"]);
        assert!(matches!(cli.command, Commands::Policy));
    }

    #[test]
    fn test_cli_global_options() {
        let cli = Cli::parse_from([
            "warden",
            "apply",
            "s.rhai",
            "r.json",
            "--timeout-ms",
            "250",
            "--policy",
            "p.toml",
            "-v",
        ]);
        assert_eq!(cli.timeout_ms, Some(250));
        assert_eq!(cli.policy, Some(PathBuf::from("p.toml")));
        assert!(cli.verbose);
    }

    #[test]
    fn test_cli_output_format_default() {
        let cli = Cli::parse_from(["warden", "policy"]);
        assert_eq!(cli.format, "pretty");
    }

    #[test]
    fn test_cli_output_format_custom() {
        let cli = Cli::parse_from(["warden", "--format", "json", "policy"]);
        assert_eq!(cli.format, "json");
    }

    #[test]
    fn test_apply_requires_records() {
        let result = Cli::try_parse_from(["warden", "apply", "s.rhai"]);
        assert!(result.is_err());
    }
}
