//! Common utilities shared across CLI commands.
//!
//! Loading scripts, records and the engine policy from disk.

use anyhow::{Context, Result, bail};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use warden_core::{EnginePolicy, Record};

/// Where the effective policy came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "path", rename_all = "lowercase")]
pub enum PolicySource {
    /// Explicit `--policy` file
    File(PathBuf),
    /// Policy file in the user config directory
    UserConfig(PathBuf),
    /// Built-in standard profile
    Builtin,
}

impl fmt::Display for PolicySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) | Self::UserConfig(path) => write!(f, "{}", path.display()),
            Self::Builtin => f.write_str("built-in standard profile"),
        }
    }
}

/// Policy plus its origin.
#[derive(Debug, Clone)]
pub struct LoadedPolicy {
    /// Effective policy
    pub policy: EnginePolicy,
    /// Origin of the policy
    pub source: PolicySource,
}

/// Returns `<config dir>/warden/policy.toml`, if a config directory exists.
#[must_use]
pub fn user_policy_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("warden").join("policy.toml"))
}

/// Loads the effective policy.
///
/// Resolution order: `explicit` file, then the user policy file when it
/// exists, then the built-in standard profile. `timeout_ms` overrides the
/// per-record budget of whichever policy was loaded.
///
/// # Errors
///
/// Returns an error if a policy file cannot be read or parsed, or if the
/// resulting policy is invalid.
///
/// # Examples
///
/// ```
/// use warden_cli::commands::common::{PolicySource, load_policy};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> anyhow::Result<()> {
/// let dir = std::env::temp_dir();
/// let path = dir.join("warden-doc-policy.toml");
/// std::fs::write(&path, "timeout_ms = 250\n")?;
///
/// let loaded = load_policy(Some(&path), None).await?;
/// assert_eq!(loaded.policy.timeout_ms(), 250);
/// assert_eq!(loaded.source, PolicySource::File(path));
/// # Ok(())
/// # }
/// ```
pub async fn load_policy(explicit: Option<&Path>, timeout_ms: Option<u64>) -> Result<LoadedPolicy> {
    let (policy, source) = if let Some(path) = explicit {
        (read_policy_file(path).await?, PolicySource::File(path.to_path_buf()))
    } else if let Some(path) = user_policy_path().filter(|p| p.is_file()) {
        (read_policy_file(&path).await?, PolicySource::UserConfig(path))
    } else {
        (EnginePolicy::default(), PolicySource::Builtin)
    };

    let policy = match timeout_ms {
        Some(ms) => policy.with_timeout_ms(ms),
        None => policy,
    };
    policy.validate().context("invalid policy")?;

    Ok(LoadedPolicy { policy, source })
}

async fn read_policy_file(path: &Path) -> Result<EnginePolicy> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read policy file {}", path.display()))?;
    EnginePolicy::from_toml_str(&text)
        .with_context(|| format!("failed to parse policy file {}", path.display()))
}

/// Reads a script file.
///
/// # Errors
///
/// Returns an error if the file cannot be read as UTF-8.
pub async fn read_script(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read script {}", path.display()))
}

/// Reads records from a file (see [`parse_records`]).
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub async fn read_records(path: &Path) -> Result<Vec<Record>> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read records {}", path.display()))?;
    parse_records(&text).with_context(|| format!("invalid records in {}", path.display()))
}

/// Parses records from a JSON array of objects or from NDJSON (one object
/// per line, blank lines ignored).
///
/// # Errors
///
/// Returns an error naming the offending element or line.
///
/// # Examples
///
/// ```
/// use warden_cli::commands::common::parse_records;
///
/// let array = parse_records(r#"[{"ticker": "AAA"}, {"ticker": "BBB"}]"#).unwrap();
/// let lines = parse_records("{\"ticker\": \"AAA\"}\n\n{\"ticker\": \"BBB\"}\n").unwrap();
///
/// assert_eq!(array, lines);
/// assert!(parse_records("[1, 2]").is_err());
/// ```
pub fn parse_records(text: &str) -> Result<Vec<Record>> {
    if text.trim_start().starts_with('[') {
        let values: Vec<serde_json::Value> =
            serde_json::from_str(text).context("records must be a JSON array")?;
        return values
            .into_iter()
            .enumerate()
            .map(|(index, value)| into_record(value, || format!("element {index}")))
            .collect();
    }

    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(number, line)| {
            let value = serde_json::from_str(line)
                .with_context(|| format!("line {}: invalid JSON", number + 1))?;
            into_record(value, || format!("line {}", number + 1))
        })
        .collect()
}

fn into_record(value: serde_json::Value, location: impl FnOnce() -> String) -> Result<Record> {
    match value {
        serde_json::Value::Object(record) => Ok(record),
        other => bail!("{}: expected an object, found {other}", location()),
    }
}

/// Writes records as a pretty-printed JSON array.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub async fn write_records(path: &Path, records: &[Record]) -> Result<()> {
    let json = serde_json::to_string_pretty(records)?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("failed to write {}", path.display()))
}
