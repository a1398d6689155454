//! Engine policy configuration.
//!
//! Every budget the engine enforces lives here rather than being hardcoded:
//! script size, per-record timeout, console capture bounds, trace sample
//! caps, the identifier field, and the restricted backend's runtime guards.
//!
//! Policies deserialize from TOML; missing keys fall back to the standard
//! profile.
//!
//! # Examples
//!
//! ```
//! use warden_core::config::{EnginePolicy, PolicyProfile};
//! use std::time::Duration;
//!
//! let policy = EnginePolicy::default();
//! assert_eq!(policy.max_script_bytes(), 10_000);
//! assert_eq!(policy.timeout(), Duration::from_secs(5));
//!
//! let strict = EnginePolicy::from_profile(PolicyProfile::Strict);
//! assert!(strict.timeout() < policy.timeout());
//! ```

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Predefined policy profiles.
///
/// - **Strict**: short budgets for untrusted, high-volume submissions
/// - **Standard**: the reference policy (default)
/// - **Relaxed**: longer budgets for vetted scripts over large records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyProfile {
    /// Tight limits.
    ///
    /// - Script size: 4,000 bytes
    /// - Timeout: 1 second
    /// - Operations: 1,000,000
    /// - Call depth: 8
    Strict,

    /// Reference limits (recommended).
    ///
    /// - Script size: 10,000 bytes
    /// - Timeout: 5 seconds
    /// - Operations: unlimited (timeout-based protection)
    /// - Call depth: 16
    #[default]
    Standard,

    /// Relaxed limits.
    ///
    /// - Script size: 64,000 bytes
    /// - Timeout: 30 seconds
    /// - Operations: unlimited
    /// - Call depth: 32
    Relaxed,
}

impl PolicyProfile {
    /// Returns the profile name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Standard => "standard",
            Self::Relaxed => "relaxed",
        }
    }
}

impl fmt::Display for PolicyProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PolicyProfile {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "standard" => Ok(Self::Standard),
            "relaxed" => Ok(Self::Relaxed),
            _ => Err(Error::InvalidArgument(format!(
                "invalid policy profile: '{s}' (expected: strict, standard, or relaxed)"
            ))),
        }
    }
}

/// Runtime guards applied by the restricted backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardLimits {
    /// Maximum interpreter operations per record (`None` = unlimited)
    pub max_operations: Option<u64>,
    /// Maximum string length in bytes
    pub max_string_bytes: usize,
    /// Maximum array length
    pub max_array_len: usize,
    /// Maximum map size
    pub max_map_len: usize,
    /// Maximum function call nesting
    pub max_call_depth: usize,
    /// Maximum expression nesting at global level
    pub max_expr_depth: usize,
    /// Maximum expression nesting inside functions
    pub max_fn_expr_depth: usize,
}

impl GuardLimits {
    /// Default string limit: 1 MiB
    pub const DEFAULT_MAX_STRING_BYTES: usize = 1024 * 1024;

    /// Default array and map limit
    pub const DEFAULT_MAX_COLLECTION_LEN: usize = 10_000;

    /// Default call depth
    pub const DEFAULT_MAX_CALL_DEPTH: usize = 16;

    fn strict() -> Self {
        Self {
            max_operations: Some(1_000_000),
            max_string_bytes: 64 * 1024,
            max_array_len: 1_000,
            max_map_len: 1_000,
            max_call_depth: 8,
            max_expr_depth: 32,
            max_fn_expr_depth: 16,
        }
    }

    fn relaxed() -> Self {
        Self {
            max_operations: None,
            max_string_bytes: 16 * 1024 * 1024,
            max_array_len: 100_000,
            max_map_len: 100_000,
            max_call_depth: 32,
            max_expr_depth: 128,
            max_fn_expr_depth: 64,
        }
    }
}

impl Default for GuardLimits {
    fn default() -> Self {
        Self {
            max_operations: None,
            max_string_bytes: Self::DEFAULT_MAX_STRING_BYTES,
            max_array_len: Self::DEFAULT_MAX_COLLECTION_LEN,
            max_map_len: Self::DEFAULT_MAX_COLLECTION_LEN,
            max_call_depth: Self::DEFAULT_MAX_CALL_DEPTH,
            max_expr_depth: 64,
            max_fn_expr_depth: 32,
        }
    }
}

/// Policy for one engine instance.
///
/// # Examples
///
/// ```
/// use warden_core::config::EnginePolicy;
/// use std::time::Duration;
///
/// let policy = EnginePolicy::builder()
///     .timeout(Duration::from_millis(250))
///     .identifier_field("id")
///     .tracked_fields(["score", "label"])
///     .build();
///
/// assert_eq!(policy.timeout(), Duration::from_millis(250));
/// assert_eq!(policy.identifier_field(), "id");
/// assert!(policy.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnginePolicy {
    max_script_bytes: usize,
    timeout_ms: u64,
    max_console_lines: usize,
    max_line_chars: usize,
    max_samples: usize,
    max_errors: usize,
    identifier_field: String,
    tracked_fields: Option<Vec<String>>,
    prefer_restricted: bool,
    guards: GuardLimits,
}

impl EnginePolicy {
    /// Default maximum script size: 10,000 bytes
    pub const DEFAULT_MAX_SCRIPT_BYTES: usize = 10_000;

    /// Default per-record timeout: 5 seconds
    pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;

    /// Default captured console lines
    pub const DEFAULT_MAX_CONSOLE_LINES: usize = 100;

    /// Default characters kept per console line
    pub const DEFAULT_MAX_LINE_CHARS: usize = 500;

    /// Default before/after samples kept in a trace
    pub const DEFAULT_MAX_SAMPLES: usize = 5;

    /// Default per-record errors kept in a trace
    pub const DEFAULT_MAX_ERRORS: usize = 100;

    /// Default identifier field
    pub const DEFAULT_IDENTIFIER_FIELD: &'static str = "ticker";

    /// Creates a new policy builder.
    #[inline]
    #[must_use]
    pub fn builder() -> EnginePolicyBuilder {
        EnginePolicyBuilder::default()
    }

    /// Creates a policy from a predefined profile.
    ///
    /// # Examples
    ///
    /// ```
    /// use warden_core::config::{EnginePolicy, PolicyProfile};
    ///
    /// let standard = EnginePolicy::from_profile(PolicyProfile::Standard);
    /// assert_eq!(standard, EnginePolicy::default());
    ///
    /// let strict = EnginePolicy::from_profile(PolicyProfile::Strict);
    /// assert_eq!(strict.guards().max_operations, Some(1_000_000));
    /// ```
    #[must_use]
    pub fn from_profile(profile: PolicyProfile) -> Self {
        match profile {
            PolicyProfile::Strict => Self::builder()
                .max_script_bytes(4_000)
                .timeout(Duration::from_secs(1))
                .max_console_lines(20)
                .guards(GuardLimits::strict())
                .build(),
            PolicyProfile::Standard => Self::default(),
            PolicyProfile::Relaxed => Self::builder()
                .max_script_bytes(64_000)
                .timeout(Duration::from_secs(30))
                .max_console_lines(1_000)
                .guards(GuardLimits::relaxed())
                .build(),
        }
    }

    /// Parses a policy from TOML text.
    ///
    /// The result is validated before it is returned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if the text is not valid TOML, has
    /// fields of the wrong type, or describes an invalid policy.
    ///
    /// # Examples
    ///
    /// ```
    /// use warden_core::config::EnginePolicy;
    ///
    /// let policy = EnginePolicy::from_toml_str(r#"
    ///     timeout_ms = 2000
    ///     identifier_field = "symbol"
    ///
    ///     [guards]
    ///     max_call_depth = 4
    /// "#).unwrap();
    ///
    /// assert_eq!(policy.timeout_ms(), 2000);
    /// assert_eq!(policy.identifier_field(), "symbol");
    /// assert_eq!(policy.guards().max_call_depth, 4);
    /// assert_eq!(policy.max_script_bytes(), 10_000);
    /// ```
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let policy: Self = toml::from_str(text).map_err(|e| Error::ConfigError {
            message: format!("invalid policy file: {e}"),
        })?;
        policy.validate()?;
        Ok(policy)
    }

    /// Serializes the policy as TOML.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if serialization fails.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::ConfigError {
            message: format!("failed to serialize policy: {e}"),
        })
    }

    /// Checks that every budget is usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] naming the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("max_script_bytes", self.max_script_bytes),
            ("max_line_chars", self.max_line_chars),
            ("guards.max_call_depth", self.guards.max_call_depth),
            ("guards.max_expr_depth", self.guards.max_expr_depth),
            ("guards.max_fn_expr_depth", self.guards.max_fn_expr_depth),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(Error::ConfigError {
                    message: format!("{name} must be greater than zero"),
                });
            }
        }

        if self.timeout_ms == 0 {
            return Err(Error::ConfigError {
                message: "timeout_ms must be greater than zero".to_string(),
            });
        }

        if self.identifier_field.trim().is_empty() {
            return Err(Error::ConfigError {
                message: "identifier_field cannot be empty".to_string(),
            });
        }

        if let Some(fields) = &self.tracked_fields
            && fields.iter().any(|f| f.trim().is_empty())
        {
            return Err(Error::ConfigError {
                message: "tracked_fields cannot contain empty names".to_string(),
            });
        }

        Ok(())
    }

    /// Returns the maximum script size in bytes.
    #[inline]
    #[must_use]
    pub const fn max_script_bytes(&self) -> usize {
        self.max_script_bytes
    }

    /// Returns the per-record wall-clock budget.
    #[inline]
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Returns the per-record budget in milliseconds.
    #[inline]
    #[must_use]
    pub const fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    /// Returns the maximum number of captured console lines.
    #[inline]
    #[must_use]
    pub const fn max_console_lines(&self) -> usize {
        self.max_console_lines
    }

    /// Returns the maximum characters kept per console line.
    #[inline]
    #[must_use]
    pub const fn max_line_chars(&self) -> usize {
        self.max_line_chars
    }

    /// Returns the number of before/after samples kept.
    #[inline]
    #[must_use]
    pub const fn max_samples(&self) -> usize {
        self.max_samples
    }

    /// Returns the number of per-record errors kept.
    #[inline]
    #[must_use]
    pub const fn max_errors(&self) -> usize {
        self.max_errors
    }

    /// Returns the identifier field name.
    #[inline]
    #[must_use]
    pub fn identifier_field(&self) -> &str {
        &self.identifier_field
    }

    /// Returns the fields compared to decide whether a record was modified.
    ///
    /// `None` means every field except the identifier.
    #[inline]
    #[must_use]
    pub fn tracked_fields(&self) -> Option<&[String]> {
        self.tracked_fields.as_deref()
    }

    /// Returns whether the restricted backend is preferred when available.
    #[inline]
    #[must_use]
    pub const fn prefer_restricted(&self) -> bool {
        self.prefer_restricted
    }

    /// Returns the restricted backend's runtime guards.
    #[inline]
    #[must_use]
    pub const fn guards(&self) -> &GuardLimits {
        &self.guards
    }

    /// Returns a copy with a different timeout.
    #[must_use]
    pub const fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

impl Default for EnginePolicy {
    fn default() -> Self {
        Self {
            max_script_bytes: Self::DEFAULT_MAX_SCRIPT_BYTES,
            timeout_ms: Self::DEFAULT_TIMEOUT_MS,
            max_console_lines: Self::DEFAULT_MAX_CONSOLE_LINES,
            max_line_chars: Self::DEFAULT_MAX_LINE_CHARS,
            max_samples: Self::DEFAULT_MAX_SAMPLES,
            max_errors: Self::DEFAULT_MAX_ERRORS,
            identifier_field: Self::DEFAULT_IDENTIFIER_FIELD.to_string(),
            tracked_fields: None,
            prefer_restricted: true,
            guards: GuardLimits::default(),
        }
    }
}

/// Builder for [`EnginePolicy`].
///
/// Unset values fall back to the standard profile.
#[derive(Debug, Default)]
pub struct EnginePolicyBuilder {
    max_script_bytes: Option<usize>,
    timeout: Option<Duration>,
    max_console_lines: Option<usize>,
    max_line_chars: Option<usize>,
    max_samples: Option<usize>,
    max_errors: Option<usize>,
    identifier_field: Option<String>,
    tracked_fields: Option<Vec<String>>,
    prefer_restricted: Option<bool>,
    guards: Option<GuardLimits>,
}

impl EnginePolicyBuilder {
    /// Sets the maximum script size in bytes.
    #[must_use]
    pub const fn max_script_bytes(mut self, bytes: usize) -> Self {
        self.max_script_bytes = Some(bytes);
        self
    }

    /// Sets the per-record wall-clock budget.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the maximum number of captured console lines.
    #[must_use]
    pub const fn max_console_lines(mut self, lines: usize) -> Self {
        self.max_console_lines = Some(lines);
        self
    }

    /// Sets the maximum characters kept per console line.
    #[must_use]
    pub const fn max_line_chars(mut self, chars: usize) -> Self {
        self.max_line_chars = Some(chars);
        self
    }

    /// Sets the number of before/after samples kept.
    #[must_use]
    pub const fn max_samples(mut self, samples: usize) -> Self {
        self.max_samples = Some(samples);
        self
    }

    /// Sets the number of per-record errors kept.
    #[must_use]
    pub const fn max_errors(mut self, errors: usize) -> Self {
        self.max_errors = Some(errors);
        self
    }

    /// Sets the identifier field name.
    #[must_use]
    pub fn identifier_field(mut self, field: impl Into<String>) -> Self {
        self.identifier_field = Some(field.into());
        self
    }

    /// Restricts modification tracking to the given fields.
    #[must_use]
    pub fn tracked_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tracked_fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Sets whether the restricted backend is preferred.
    #[must_use]
    pub const fn prefer_restricted(mut self, prefer: bool) -> Self {
        self.prefer_restricted = Some(prefer);
        self
    }

    /// Sets the restricted backend's runtime guards.
    #[must_use]
    pub fn guards(mut self, guards: GuardLimits) -> Self {
        self.guards = Some(guards);
        self
    }

    /// Builds the policy.
    ///
    /// Timeouts are stored with millisecond precision; sub-millisecond
    /// budgets round up to one millisecond.
    #[must_use]
    pub fn build(self) -> EnginePolicy {
        let defaults = EnginePolicy::default();
        let timeout_ms = self.timeout.map_or(defaults.timeout_ms, |t| {
            u64::try_from(t.as_millis()).unwrap_or(u64::MAX).max(1)
        });

        EnginePolicy {
            max_script_bytes: self.max_script_bytes.unwrap_or(defaults.max_script_bytes),
            timeout_ms,
            max_console_lines: self.max_console_lines.unwrap_or(defaults.max_console_lines),
            max_line_chars: self.max_line_chars.unwrap_or(defaults.max_line_chars),
            max_samples: self.max_samples.unwrap_or(defaults.max_samples),
            max_errors: self.max_errors.unwrap_or(defaults.max_errors),
            identifier_field: self.identifier_field.unwrap_or(defaults.identifier_field),
            tracked_fields: self.tracked_fields.or(defaults.tracked_fields),
            prefer_restricted: self.prefer_restricted.unwrap_or(defaults.prefer_restricted),
            guards: self.guards.unwrap_or(defaults.guards),
        }
    }
}
