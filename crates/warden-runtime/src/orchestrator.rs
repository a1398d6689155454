//! Batch driver: compile once, run per record, collect the trace.

use crate::capture::OutputCapture;
use crate::compiler::Compiler;
use crate::library::SafeRuntimeLibrary;
use crate::sandbox::{ExecutionHost, HostStats};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use warden_core::{
    EnginePolicy, ExecutionTrace, FieldChange, Record, RecordError, SampleDiff, Script,
    ScriptTransformer, TransformOutput, ValidationError,
};

/// Applies user scripts to batches of records.
///
/// Records are processed sequentially. A record-level failure keeps the
/// original record and is reported in the trace; only a rejected script
/// fails the whole call.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use warden_core::{EnginePolicy, Record};
/// use warden_runtime::BatchOrchestrator;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let orchestrator = BatchOrchestrator::new(EnginePolicy::default())?;
///
/// let records: Vec<Record> = serde_json::from_value(json!([
///     {"ticker": "AAA", "score": 0.9},
///     {"ticker": "BBB", "score": 0.1},
/// ]))?;
///
/// let output = orchestrator
///     .apply("result = record; result[\"flag\"] = record[\"score\"] > 0.5;", &records)
///     .await?;
///
/// assert_eq!(output.records[0]["flag"], json!(true));
/// assert_eq!(output.records[1]["flag"], json!(false));
/// assert_eq!(output.trace.modified, 2);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct BatchOrchestrator {
    policy: EnginePolicy,
    compiler: Compiler,
    host: ExecutionHost,
}

impl BatchOrchestrator {
    /// Creates an orchestrator for `policy`.
    ///
    /// # Errors
    ///
    /// Returns [`warden_core::Error::ConfigError`] if the policy is invalid.
    pub fn new(policy: EnginePolicy) -> warden_core::Result<Self> {
        policy.validate()?;

        let compiler = Compiler::new(&policy);
        let host = ExecutionHost::new(Arc::new(SafeRuntimeLibrary::new()), &policy);

        Ok(Self {
            policy,
            compiler,
            host,
        })
    }

    /// Returns the active policy.
    #[must_use]
    pub const fn policy(&self) -> &EnginePolicy {
        &self.policy
    }

    /// Returns the execution counters across all batches.
    #[must_use]
    pub fn stats(&self) -> HostStats {
        self.host.stats()
    }

    /// Checks `script` without compiling or running it.
    ///
    /// # Errors
    ///
    /// Returns the first policy violation found.
    pub fn validate(&self, script: &str) -> Result<(), ValidationError> {
        self.compiler.validator().validate(&Script::new(script))
    }

    /// Compiles `script` once and runs it against every record.
    ///
    /// The returned records have the same length and order as `records`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] if the script is rejected; no record is
    /// run in that case.
    pub async fn apply(
        &self,
        script: &str,
        records: &[Record],
    ) -> Result<TransformOutput, ValidationError> {
        let started = Instant::now();
        let unit = self.compiler.compile(&Script::new(script))?;

        let mut trace = ExecutionTrace::new(unit.digest().clone(), unit.backend());
        info!(
            batch_id = %trace.batch_id,
            digest = %unit.digest().short(),
            backend = %unit.backend(),
            records = records.len(),
            "batch started"
        );

        let capture = OutputCapture::new(
            self.policy.max_console_lines(),
            self.policy.max_line_chars(),
        );
        let mut output = Vec::with_capacity(records.len());

        for (index, record) in records.iter().enumerate() {
            trace.processed += 1;

            match self.host.run(&unit, record, &capture).await {
                Ok(transformed) => {
                    let changes = self.diff(record, &transformed);
                    debug!(index, changed_fields = changes.len(), "record transformed");

                    if !changes.is_empty() {
                        trace.modified += 1;
                        if trace.samples.len() < self.policy.max_samples() {
                            trace.samples.push(SampleDiff {
                                index,
                                identifier: self.identifier_of(record),
                                changes,
                            });
                        }
                    }
                    output.push(transformed);
                }
                Err(err) => {
                    warn!(index, kind = %err.kind(), "record failed, keeping original");

                    trace.failed += 1;
                    if trace.errors.len() < self.policy.max_errors() {
                        trace
                            .errors
                            .push(RecordError::new(index, self.identifier_of(record), &err));
                    }
                    output.push(record.clone());
                }
            }
        }

        trace.console = capture.lines();
        trace.console_dropped = capture.dropped();
        trace.elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        info!(
            batch_id = %trace.batch_id,
            processed = trace.processed,
            modified = trace.modified,
            failed = trace.failed,
            elapsed_ms = trace.elapsed_ms,
            "batch finished"
        );

        Ok(TransformOutput {
            records: output,
            trace,
        })
    }

    fn identifier_of(&self, record: &Record) -> Value {
        record
            .get(self.policy.identifier_field())
            .cloned()
            .unwrap_or(Value::Null)
    }

    /// Fields that differ between `before` and `after`, in name order.
    ///
    /// Compares the tracked fields when configured, otherwise every field
    /// present on either side. The identifier is never compared.
    fn diff(&self, before: &Record, after: &Record) -> Vec<FieldChange> {
        let identifier = self.policy.identifier_field();
        let fields: BTreeSet<&str> = match self.policy.tracked_fields() {
            Some(tracked) => tracked.iter().map(String::as_str).collect(),
            None => before.keys().chain(after.keys()).map(String::as_str).collect(),
        };

        fields
            .into_iter()
            .filter(|field| *field != identifier)
            .filter_map(|field| {
                let (old, new) = (before.get(field), after.get(field));
                (old != new).then(|| FieldChange {
                    field: field.to_string(),
                    before: old.cloned(),
                    after: new.cloned(),
                })
            })
            .collect()
    }
}

#[async_trait]
impl ScriptTransformer for BatchOrchestrator {
    async fn apply(
        &self,
        script: &str,
        records: &[Record],
    ) -> Result<TransformOutput, ValidationError> {
        Self::apply(self, script, records).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn records(value: Value) -> Vec<Record> {
        serde_json::from_value(value).unwrap()
    }

    fn orchestrator() -> BatchOrchestrator {
        BatchOrchestrator::new(EnginePolicy::default()).unwrap()
    }

    #[test]
    fn test_invalid_policy_rejected() {
        let policy = EnginePolicy::builder().max_line_chars(0).build();
        let err = BatchOrchestrator::new(policy).unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_diff_reports_added_changed_and_removed() {
        let orchestrator = orchestrator();
        let before = records(json!([{"ticker": "AAA", "a": 1, "b": 2, "c": 3}])).remove(0);
        let after = records(json!([{"ticker": "ZZZ", "a": 1, "b": 5, "d": 4}])).remove(0);

        let changes = orchestrator.diff(&before, &after);
        let fields: Vec<_> = changes.iter().map(|c| c.field.as_str()).collect();

        assert_eq!(fields, vec!["b", "c", "d"]);
        assert_eq!(changes[1].after, None);
        assert_eq!(changes[2].before, None);
    }

    #[test]
    fn test_diff_limited_to_tracked_fields() {
        let policy = EnginePolicy::builder().tracked_fields(["score"]).build();
        let orchestrator = BatchOrchestrator::new(policy).unwrap();
        let before = records(json!([{"ticker": "AAA", "score": 1, "note": "x"}])).remove(0);
        let after = records(json!([{"ticker": "AAA", "score": 1, "note": "y"}])).remove(0);

        assert!(orchestrator.diff(&before, &after).is_empty());
    }

    #[tokio::test]
    async fn test_unchanged_records_not_counted() {
        let input = records(json!([{"ticker": "AAA", "score": 0.5}]));
        let output = orchestrator().apply("let x = 1;", &input).await.unwrap();

        assert_eq!(output.records, input);
        assert_eq!(output.trace.processed, 1);
        assert_eq!(output.trace.modified, 0);
        assert!(output.trace.samples.is_empty());
    }

    #[tokio::test]
    async fn test_samples_and_errors_capped() {
        let policy = EnginePolicy::builder().max_samples(2).max_errors(1).build();
        let orchestrator = BatchOrchestrator::new(policy).unwrap();
        let input = records(json!([
            {"ticker": "A", "n": 1},
            {"ticker": "B", "n": 2},
            {"ticker": "C", "n": 3},
            {"ticker": "D"},
            {"ticker": "E"},
        ]));

        let output = orchestrator
            .apply("record.n = record.n + 1;", &input)
            .await
            .unwrap();

        assert_eq!(output.trace.modified, 3);
        assert_eq!(output.trace.samples.len(), 2);
        assert_eq!(output.trace.failed, 2);
        assert_eq!(output.trace.errors.len(), 1);
        assert_eq!(output.trace.errors[0].identifier, json!("D"));
        assert_eq!(output.records[3], input[3]);
    }

    #[tokio::test]
    async fn test_console_shared_across_records() {
        let input = records(json!([{"ticker": "A"}, {"ticker": "B"}]));
        let output = orchestrator()
            .apply("print(record.ticker);", &input)
            .await
            .unwrap();

        assert_eq!(output.trace.console, vec!["A".to_string(), "B".to_string()]);
        assert_eq!(output.trace.console_dropped, 0);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let output = orchestrator().apply("record.x = 1;", &[]).await.unwrap();
        assert!(output.records.is_empty());
        assert!(output.trace.is_clean());
        assert_eq!(orchestrator().stats().runs, 0);
    }
}
