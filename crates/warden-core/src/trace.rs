//! Diagnostic trace of a batch run.
//!
//! An [`ExecutionTrace`] is assembled by the batch orchestrator and handed
//! back with the transformed records. It is serializable so that callers can
//! store or display it as-is.
//!
//! # Examples
//!
//! ```
//! use warden_core::trace::ExecutionTrace;
//! use warden_core::{BackendKind, Script};
//!
//! let trace = ExecutionTrace::new(Script::new("record.x = 1;").digest(), BackendKind::Restricted);
//! assert_eq!(trace.processed, 0);
//! assert!(trace.is_clean());
//! ```

use crate::error::{ExecutionError, ExecutionErrorKind};
use crate::types::{BackendKind, ScriptDigest};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// One field that differs between input and output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange {
    /// Field name
    pub field: String,
    /// Value before the script ran (`None` if absent)
    pub before: Option<Value>,
    /// Value after the script ran (`None` if removed)
    pub after: Option<Value>,
}

/// Before/after diff for one modified record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleDiff {
    /// Position of the record in the batch
    pub index: usize,
    /// Identifier value of the record
    pub identifier: Value,
    /// Changed fields, in field-name order
    pub changes: Vec<FieldChange>,
}

/// Failure of one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordError {
    /// Position of the record in the batch
    pub index: usize,
    /// Identifier value of the record (`null` if it had none)
    pub identifier: Value,
    /// Failure class
    pub kind: ExecutionErrorKind,
    /// Human-readable message
    pub message: String,
}

impl RecordError {
    /// Builds an entry from an execution failure.
    #[must_use]
    pub fn new(index: usize, identifier: Value, error: &ExecutionError) -> Self {
        Self {
            index,
            identifier,
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

/// Diagnostic summary of one `apply` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionTrace {
    /// Unique id of this batch run
    pub batch_id: Uuid,
    /// When the batch started
    pub started_at: DateTime<Utc>,
    /// Fingerprint of the script
    pub script_digest: ScriptDigest,
    /// Backend that compiled the script
    pub backend: BackendKind,
    /// Captured print output, in order
    pub console: Vec<String>,
    /// Print lines dropped once the console budget was full
    pub console_dropped: usize,
    /// Total wall-clock time in milliseconds
    pub elapsed_ms: u64,
    /// Records processed
    pub processed: usize,
    /// Records whose tracked fields changed
    pub modified: usize,
    /// Records that failed (not capped)
    pub failed: usize,
    /// Sample diffs, capped by policy
    pub samples: Vec<SampleDiff>,
    /// Per-record errors, capped by policy
    pub errors: Vec<RecordError>,
}

impl ExecutionTrace {
    /// Creates an empty trace for a batch starting now.
    #[must_use]
    pub fn new(script_digest: ScriptDigest, backend: BackendKind) -> Self {
        Self {
            batch_id: Uuid::new_v4(),
            started_at: Utc::now(),
            script_digest,
            backend,
            console: Vec::new(),
            console_dropped: 0,
            elapsed_ms: 0,
            processed: 0,
            modified: 0,
            failed: 0,
            samples: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Returns `true` if no record failed.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.failed == 0
    }

    /// Returns the number of records that ran successfully.
    #[must_use]
    pub const fn succeeded(&self) -> usize {
        self.processed.saturating_sub(self.failed)
    }
}
