//! Transformation seam used by pipelines.
//!
//! Pipelines depend on [`ScriptTransformer`] rather than on the engine
//! directly, so that tests can substitute a fake.

use crate::error::ValidationError;
use crate::trace::ExecutionTrace;
use crate::types::Record;
use async_trait::async_trait;

/// Output of a successful batch: transformed records plus the trace.
///
/// `records` has the same length and order as the input.
#[derive(Debug, Clone)]
pub struct TransformOutput {
    /// Transformed records (originals for failed items)
    pub records: Vec<Record>,
    /// Diagnostic trace
    pub trace: ExecutionTrace,
}

/// Applies a user script to a batch of records.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use warden_core::traits::{ScriptTransformer, TransformOutput};
/// use warden_core::trace::ExecutionTrace;
/// use warden_core::{BackendKind, Record, Script, ValidationError};
///
/// struct Identity;
///
/// #[async_trait]
/// impl ScriptTransformer for Identity {
///     async fn apply(
///         &self,
///         script: &str,
///         records: &[Record],
///     ) -> Result<TransformOutput, ValidationError> {
///         let mut trace = ExecutionTrace::new(Script::new(script).digest(), BackendKind::Basic);
///         trace.processed = records.len();
///         Ok(TransformOutput { records: records.to_vec(), trace })
///     }
/// }
/// ```
#[async_trait]
pub trait ScriptTransformer: Send + Sync {
    /// Validates and compiles `script` once, then runs it on each record.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] if the script is rejected. No record is
    /// processed in that case. Per-record failures are reported in the
    /// trace instead.
    async fn apply(
        &self,
        script: &str,
        records: &[Record],
    ) -> Result<TransformOutput, ValidationError>;
}
