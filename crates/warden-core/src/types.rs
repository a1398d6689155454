//! Domain types shared by the engine crates.
//!
//! - [`Record`]: one structured data item a script transforms
//! - [`Script`]: immutable user-submitted source text
//! - [`ScriptDigest`]: stable fingerprint used to refer to a script in logs
//! - [`BackendKind`]: which execution backend compiled a script

use serde::{Deserialize, Serialize};
use std::fmt;

/// One structured data item: a string-keyed map of JSON values.
///
/// Records must carry the configured identifier field (`ticker` by default),
/// which survives every transformation unchanged.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Immutable user-submitted transformation script.
///
/// The size limit is enforced by the validator, not at construction, so that
/// oversized scripts are reported through the normal rejection path.
///
/// # Examples
///
/// ```
/// use warden_core::Script;
///
/// let script = Script::new("record.score = 1.0;");
/// assert_eq!(script.size(), 19);
/// assert!(!script.is_blank());
/// assert_eq!(script.digest().as_str().len(), 64);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Script {
    source: String,
}

impl Script {
    /// Wraps raw source text.
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    /// Returns the raw source text.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Returns the size in bytes.
    #[inline]
    #[must_use]
    pub fn size(&self) -> usize {
        self.source.len()
    }

    /// Returns `true` if the script has no non-whitespace content.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.source.trim().is_empty()
    }

    /// Computes the blake3 fingerprint of the source.
    #[must_use]
    pub fn digest(&self) -> ScriptDigest {
        ScriptDigest(blake3::hash(self.source.as_bytes()).to_hex().to_string())
    }
}

impl From<&str> for Script {
    fn from(source: &str) -> Self {
        Self::new(source)
    }
}

impl From<String> for Script {
    fn from(source: String) -> Self {
        Self::new(source)
    }
}

/// Hex-encoded blake3 hash of a script's source.
///
/// Logs and traces refer to scripts by digest so that untrusted source text
/// never reaches the host's log sinks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScriptDigest(String);

impl ScriptDigest {
    /// Returns the full hex digest.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the first 12 hex characters, for log lines.
    #[must_use]
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for ScriptDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Execution backend that produced a compiled unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Static validation plus runtime guards.
    Restricted,
    /// Static validation only (reduced assurance).
    Basic,
}

impl BackendKind {
    /// Returns the backend name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Restricted => "restricted",
            Self::Basic => "basic",
        }
    }

    /// Returns `true` for the restricted backend.
    #[must_use]
    pub const fn is_restricted(&self) -> bool {
        matches!(self, Self::Restricted)
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
