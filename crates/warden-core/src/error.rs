//! Error types for the script warden engine.
//!
//! The engine distinguishes two failure classes:
//!
//! - [`ValidationError`]: script-level, raised before any record is touched.
//!   It aborts the whole batch.
//! - [`ExecutionError`]: record-level, recovered by the batch orchestrator,
//!   which keeps the original record and reports the failure in the trace.
//!
//! [`Error`] is the crate-wide error used for configuration and I/O-style
//! failures around the engine.
//!
//! # Examples
//!
//! ```
//! use warden_core::{Error, Result};
//!
//! fn check_timeout(ms: u64) -> Result<()> {
//!     if ms == 0 {
//!         return Err(Error::ConfigError {
//!             message: "timeout must be positive".to_string(),
//!         });
//!     }
//!     Ok(())
//! }
//!
//! let err = check_timeout(0).unwrap_err();
//! assert!(err.is_config_error());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Formats an optional source line as ` (line N)`.
struct LineSuffix<'a>(&'a Option<usize>);

impl fmt::Display for LineSuffix<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self.0 {
            Some(line) => write!(f, " (line {line})"),
            None => Ok(()),
        }
    }
}

/// Script-level rejection.
///
/// Every variant is produced before the script runs against any record.
/// The display text is the human-readable reason shown to the script
/// author and always names the offending construct.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The script contains no code.
    #[error("script is empty")]
    Empty,

    /// The script exceeds the configured size limit.
    #[error("script is {size} bytes, exceeding the {limit} byte limit")]
    TooLarge {
        /// Script size in bytes
        size: usize,
        /// Configured maximum in bytes
        limit: usize,
    },

    /// The script failed to parse.
    #[error("syntax error: {message}")]
    Syntax {
        /// Parser message, including the position
        message: String,
    },

    /// A forbidden statement or expression kind.
    #[error("forbidden construct: {construct}{}", LineSuffix(.line))]
    ForbiddenConstruct {
        /// Description of the construct, e.g. `import statement`
        construct: String,
        /// Source line, when known
        line: Option<usize>,
    },

    /// A call to a forbidden function.
    #[error("forbidden call: {name}(){}", LineSuffix(.line))]
    ForbiddenCall {
        /// Called function name
        name: String,
        /// Source line, when known
        line: Option<usize>,
    },

    /// Access to a forbidden attribute or property.
    #[error("forbidden attribute access: {name}{}", LineSuffix(.line))]
    ForbiddenAttribute {
        /// Attribute name
        name: String,
        /// Source line, when known
        line: Option<usize>,
    },

    /// The execution backend refused to compile the script.
    #[error("compilation failed: {message}")]
    Compile {
        /// Backend message
        message: String,
    },
}

impl ValidationError {
    /// Returns `true` if the script was rejected by the static checker
    /// rather than by the parser or size limits.
    ///
    /// # Examples
    ///
    /// ```
    /// use warden_core::ValidationError;
    ///
    /// let err = ValidationError::ForbiddenCall { name: "eval".into(), line: Some(1) };
    /// assert!(err.is_policy_violation());
    /// assert!(!ValidationError::Empty.is_policy_violation());
    /// ```
    #[must_use]
    pub const fn is_policy_violation(&self) -> bool {
        matches!(
            self,
            Self::ForbiddenConstruct { .. }
                | Self::ForbiddenCall { .. }
                | Self::ForbiddenAttribute { .. }
        )
    }

    /// Returns `true` if this is a parse failure.
    #[must_use]
    pub const fn is_syntax_error(&self) -> bool {
        matches!(self, Self::Syntax { .. })
    }
}

/// Classification tag for an [`ExecutionError`], as reported in traces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionErrorKind {
    /// The wall-clock budget elapsed.
    Timeout,
    /// The script raised an error.
    Exception,
    /// The script produced something other than a map.
    InvalidReturnType,
    /// The output lacks the identifier field.
    MissingRequiredField,
}

impl ExecutionErrorKind {
    /// Returns the stable string tag.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Exception => "exception",
            Self::InvalidReturnType => "invalid-return-type",
            Self::MissingRequiredField => "missing-required-field",
        }
    }
}

impl fmt::Display for ExecutionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record-level failure.
///
/// The orchestrator never propagates these: the original record is kept and
/// the error lands in the trace.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    /// The script did not finish within the budget.
    #[error("script timed out after {budget_ms}ms")]
    Timeout {
        /// Budget in milliseconds
        budget_ms: u64,
    },

    /// The script raised an error while running.
    #[error("script raised: {message}")]
    Exception {
        /// Interpreter message
        message: String,
    },

    /// The output is not a map, or holds a value with no JSON form.
    #[error("script must produce a map of JSON values, got {type_name}")]
    InvalidReturnType {
        /// Type of the value produced
        type_name: String,
    },

    /// A record lacks the identifier field.
    #[error("record is missing required field '{field}'")]
    MissingRequiredField {
        /// Identifier field name
        field: String,
    },
}

impl ExecutionError {
    /// Returns the classification tag.
    ///
    /// # Examples
    ///
    /// ```
    /// use warden_core::{ExecutionError, ExecutionErrorKind};
    ///
    /// let err = ExecutionError::Timeout { budget_ms: 5000 };
    /// assert_eq!(err.kind(), ExecutionErrorKind::Timeout);
    /// assert_eq!(err.kind().as_str(), "timeout");
    /// ```
    #[must_use]
    pub const fn kind(&self) -> ExecutionErrorKind {
        match self {
            Self::Timeout { .. } => ExecutionErrorKind::Timeout,
            Self::Exception { .. } => ExecutionErrorKind::Exception,
            Self::InvalidReturnType { .. } => ExecutionErrorKind::InvalidReturnType,
            Self::MissingRequiredField { .. } => ExecutionErrorKind::MissingRequiredField,
        }
    }

    /// Returns `true` if this is a timeout.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Main error type for the engine's surrounding operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The script was rejected.
    #[error("script rejected: {0}")]
    Validation(#[from] ValidationError),

    /// Configuration error.
    ///
    /// Raised when a policy is invalid or cannot be loaded.
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the configuration problem
        message: String,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {message}")]
    SerializationError {
        /// Description of the serialization failure
        message: String,
        /// Underlying serde error
        #[source]
        source: Option<serde_json::Error>,
    },

    /// Invalid argument error.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl Error {
    /// Returns `true` if this wraps a script rejection.
    #[must_use]
    pub const fn is_validation_error(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns `true` if this is a configuration error.
    ///
    /// # Examples
    ///
    /// ```
    /// use warden_core::Error;
    ///
    /// let err = Error::ConfigError {
    ///     message: "bad budget".to_string(),
    /// };
    /// assert!(err.is_config_error());
    /// ```
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(self, Self::ConfigError { .. })
    }

    /// Returns `true` if this is a serialization error.
    #[must_use]
    pub const fn is_serialization_error(&self) -> bool {
        matches!(self, Self::SerializationError { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(source: serde_json::Error) -> Self {
        Self::SerializationError {
            message: source.to_string(),
            source: Some(source),
        }
    }
}

/// Type alias for Results using the engine's [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_messages_name_the_construct() {
        let err = ValidationError::ForbiddenConstruct {
            construct: "import statement".to_string(),
            line: Some(3),
        };
        assert_eq!(err.to_string(), "forbidden construct: import statement (line 3)");

        let err = ValidationError::ForbiddenCall {
            name: "eval".to_string(),
            line: None,
        };
        assert_eq!(err.to_string(), "forbidden call: eval()");

        let err = ValidationError::TooLarge {
            size: 10_001,
            limit: 10_000,
        };
        assert!(err.to_string().contains("10001"));
    }

    #[test]
    fn test_policy_violation_classification() {
        assert!(
            ValidationError::ForbiddenAttribute {
                name: "__class__".to_string(),
                line: Some(1)
            }
            .is_policy_violation()
        );
        assert!(
            !ValidationError::Syntax {
                message: "x".into()
            }
            .is_policy_violation()
        );
        assert!(
            ValidationError::Syntax {
                message: "x".into()
            }
            .is_syntax_error()
        );
    }

    #[test]
    fn test_execution_error_kinds() {
        let cases = [
            (ExecutionError::Timeout { budget_ms: 1 }, "timeout"),
            (
                ExecutionError::Exception {
                    message: "boom".into(),
                },
                "exception",
            ),
            (
                ExecutionError::InvalidReturnType {
                    type_name: "i64".into(),
                },
                "invalid-return-type",
            ),
            (
                ExecutionError::MissingRequiredField {
                    field: "ticker".into(),
                },
                "missing-required-field",
            ),
        ];

        for (err, tag) in cases {
            assert_eq!(err.kind().as_str(), tag);
            assert_eq!(
                serde_json::to_value(err.kind()).unwrap(),
                serde_json::Value::String(tag.to_string())
            );
        }
        assert!(ExecutionError::Timeout { budget_ms: 1 }.is_timeout());
    }

    #[test]
    fn test_error_from_validation() {
        let err: Error = ValidationError::Empty.into();
        assert!(err.is_validation_error());
        assert_eq!(err.to_string(), "script rejected: script is empty");
    }

    #[test]
    fn test_error_from_serde() {
        let parse = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: Error = parse.into();
        assert!(err.is_serialization_error());
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
        assert_send_sync::<ValidationError>();
        assert_send_sync::<ExecutionError>();
    }
}
