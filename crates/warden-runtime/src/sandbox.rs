//! Isolated execution of one compiled unit against one record.
//!
//! Every run gets a fresh engine, a fresh scope and a deep copy of the
//! record. The script runs on a blocking worker thread. Its only way back is
//! a one-shot channel, and the host stops listening once the budget expires.
//!
//! # Cancellation
//!
//! When the budget expires the host raises a cancel flag that the engine's
//! progress hook polls between operations, so a runaway loop is torn down
//! shortly after the timeout. Output printed after cancellation is
//! discarded. A worker stuck inside a single native call keeps its thread
//! until that call returns; its result is never observed.
//!
//! # Output binding
//!
//! The record produced by a run is the `result` binding when the script
//! assigned it, and the (possibly mutated) `record` binding otherwise. The
//! value of the script's last statement is ignored, so a trailing
//! `record.remove("tmp")` or `tags.pop()` keeps the mutations.
//!
//! The output is converted back to JSON by [`to_json`]; values with no JSON
//! form fail the record. The identifier field of the output is always reset
//! to the input's value.

use crate::capture::OutputCapture;
use crate::compiler::{CompiledUnit, base_engine};
use crate::convert::{Unrepresentable, to_json};
use crate::library::SafeRuntimeLibrary;
use crate::security::RuntimeGuards;
use rhai::serde::to_dynamic;
use rhai::{AST, Dynamic, Engine, EvalAltResult, Scope};
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::warn;
use warden_core::{EnginePolicy, ExecutionError, Record};

/// Name of the binding holding the working copy of the record.
pub const RECORD_BINDING: &str = "record";

/// Name of the optional explicit output binding.
pub const RESULT_BINDING: &str = "result";

/// Result of one run: the transformed record or a typed failure.
pub type ExecutionOutcome = Result<Record, ExecutionError>;

/// Counters accumulated by an [`ExecutionHost`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostStats {
    /// Runs started
    pub runs: u64,
    /// Runs that hit the time budget
    pub timeouts: u64,
    /// Runs that ended in any failure, timeouts included
    pub failures: u64,
}

/// Runs compiled units in isolated workers under a time budget.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use serde_json::json;
/// use warden_core::{EnginePolicy, Script};
/// use warden_runtime::{Compiler, ExecutionHost, OutputCapture, SafeRuntimeLibrary};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let policy = EnginePolicy::default();
/// let unit = Compiler::new(&policy)
///     .compile(&Script::new("record.score = record.score * 2.0;"))
///     .unwrap();
///
/// let host = ExecutionHost::new(Arc::new(SafeRuntimeLibrary::new()), &policy);
/// let capture = OutputCapture::new(10, 100);
/// let serde_json::Value::Object(record) = json!({"ticker": "AAA", "score": 0.25}) else {
///     unreachable!()
/// };
///
/// let output = host.run(&unit, &record, &capture).await.unwrap();
/// assert_eq!(output["score"], json!(0.5));
/// assert_eq!(record["score"], json!(0.25));
/// # }
/// ```
pub struct ExecutionHost {
    library: Arc<SafeRuntimeLibrary>,
    timeout: Duration,
    identifier_field: String,

    runs: AtomicU64,
    timeouts: AtomicU64,
    failures: AtomicU64,
}

impl std::fmt::Debug for ExecutionHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionHost")
            .field("timeout", &self.timeout)
            .field("identifier_field", &self.identifier_field)
            .field("runs", &self.runs.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl ExecutionHost {
    /// Creates a host using the budget and identifier field of `policy`.
    #[must_use]
    pub fn new(library: Arc<SafeRuntimeLibrary>, policy: &EnginePolicy) -> Self {
        Self {
            library,
            timeout: policy.timeout(),
            identifier_field: policy.identifier_field().to_string(),
            runs: AtomicU64::new(0),
            timeouts: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    /// Returns the per-run wall-clock budget.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns a snapshot of the run counters.
    #[must_use]
    pub fn stats(&self) -> HostStats {
        HostStats {
            runs: self.runs.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }

    /// Runs `unit` against a deep copy of `record`.
    ///
    /// Print output goes to `capture`. The caller's `record` is never
    /// modified and the call never waits longer than the budget.
    pub async fn run(
        &self,
        unit: &CompiledUnit,
        record: &Record,
        capture: &OutputCapture,
    ) -> ExecutionOutcome {
        self.runs.fetch_add(1, Ordering::Relaxed);

        let outcome = self.run_inner(unit, record, capture).await;
        if outcome.is_err() {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
        outcome
    }

    async fn run_inner(
        &self,
        unit: &CompiledUnit,
        record: &Record,
        capture: &OutputCapture,
    ) -> ExecutionOutcome {
        let Some(identifier) = record.get(&self.identifier_field).cloned() else {
            return Err(self.missing_identifier());
        };

        let cancel = Arc::new(AtomicBool::new(false));
        let job = WorkerJob {
            ast: unit.ast(),
            guards: unit.guards().cloned(),
            library: Arc::clone(&self.library),
            record: record.clone(),
            capture: capture.clone(),
            cancel: Arc::clone(&cancel),
        };

        let (tx, rx) = oneshot::channel();
        tokio::task::spawn_blocking(move || {
            // the receiver is gone if the run already timed out
            let _ = tx.send(job.run());
        });

        let budget_ms = self.budget_ms();
        match tokio::time::timeout(self.timeout, rx).await {
            Err(_) => {
                cancel.store(true, Ordering::Relaxed);
                self.timeouts.fetch_add(1, Ordering::Relaxed);
                warn!(budget_ms, "script timed out, worker cancelled");
                Err(ExecutionError::Timeout { budget_ms })
            }
            Ok(Err(_)) => Err(ExecutionError::Exception {
                message: "worker stopped without producing a result".to_string(),
            }),
            Ok(Ok(Err(fault))) => Err(fault.into_execution_error(budget_ms)),
            Ok(Ok(Ok(value))) => self.finish(value, identifier),
        }
    }

    fn budget_ms(&self) -> u64 {
        u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX)
    }

    fn missing_identifier(&self) -> ExecutionError {
        ExecutionError::MissingRequiredField {
            field: self.identifier_field.clone(),
        }
    }

    /// Checks the shape of the output and restores the identifier.
    fn finish(&self, value: Value, identifier: Value) -> ExecutionOutcome {
        let Value::Object(mut output) = value else {
            return Err(ExecutionError::InvalidReturnType {
                type_name: json_type_name(&value).to_string(),
            });
        };
        if !output.contains_key(&self.identifier_field) {
            return Err(self.missing_identifier());
        }

        output.insert(self.identifier_field.clone(), identifier);
        Ok(output)
    }
}

const fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "()",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "map",
    }
}

/// Failure inside the worker, before the host classifies it.
#[derive(Debug, Error)]
enum WorkerFault {
    #[error("cancelled")]
    Cancelled,

    #[error("{0}")]
    Raised(String),

    #[error("output is {0}, not a map")]
    NotAMap(&'static str),

    #[error(transparent)]
    Unrepresentable(#[from] Unrepresentable),
}

impl WorkerFault {
    fn into_execution_error(self, budget_ms: u64) -> ExecutionError {
        match self {
            Self::Cancelled => ExecutionError::Timeout { budget_ms },
            Self::Raised(message) => ExecutionError::Exception { message },
            Self::NotAMap(type_name) => ExecutionError::InvalidReturnType {
                type_name: type_name.to_string(),
            },
            Self::Unrepresentable(err) => ExecutionError::InvalidReturnType {
                type_name: err.to_string(),
            },
        }
    }
}

/// Everything a worker owns for one run.
struct WorkerJob {
    ast: Arc<AST>,
    guards: Option<RuntimeGuards>,
    library: Arc<SafeRuntimeLibrary>,
    record: Record,
    capture: OutputCapture,
    cancel: Arc<AtomicBool>,
}

impl WorkerJob {
    fn run(self) -> Result<Value, WorkerFault> {
        let engine = self.engine();

        let record = to_dynamic(&self.record).map_err(|e| WorkerFault::Raised(e.to_string()))?;
        let mut scope = Scope::new();
        scope.push_dynamic(RECORD_BINDING, record);
        scope.push_dynamic(RESULT_BINDING, Dynamic::UNIT);

        engine
            .run_ast_with_scope(&mut scope, &self.ast)
            .map_err(|err| match *err {
                EvalAltResult::ErrorTerminated(..) => WorkerFault::Cancelled,
                other => WorkerFault::Raised(other.to_string()),
            })?;

        let output = select_output(&scope);
        if !output.is_map() {
            return Err(WorkerFault::NotAMap(output.type_name()));
        }
        to_json(&output).map_err(WorkerFault::from)
    }

    /// Builds the per-run engine: library, guards and hooks bound to this
    /// run's capture and cancel flag.
    fn engine(&self) -> Engine {
        let mut engine = base_engine(self.guards.as_ref());
        self.library.install(&mut engine);

        let (capture, cancel) = (self.capture.clone(), Arc::clone(&self.cancel));
        engine.on_print(move |text| {
            if !cancel.load(Ordering::Relaxed) {
                capture.write(text);
            }
        });

        let (capture, cancel) = (self.capture.clone(), Arc::clone(&self.cancel));
        engine.on_debug(move |text, _, _| {
            if !cancel.load(Ordering::Relaxed) {
                capture.write(text);
            }
        });

        let cancel = Arc::clone(&self.cancel);
        engine.on_progress(move |_| cancel.load(Ordering::Relaxed).then_some(Dynamic::UNIT));

        engine
    }
}

fn select_output(scope: &Scope<'_>) -> Dynamic {
    scope
        .get_value::<Dynamic>(RESULT_BINDING)
        .filter(|value| !value.is_unit())
        .or_else(|| scope.get_value::<Dynamic>(RECORD_BINDING))
        .unwrap_or(Dynamic::UNIT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::Compiler;
    use serde_json::json;
    use warden_core::Script;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    fn setup(policy: &EnginePolicy, source: &str) -> (ExecutionHost, CompiledUnit) {
        let unit = Compiler::new(policy).compile(&Script::new(source)).unwrap();
        let host = ExecutionHost::new(Arc::new(SafeRuntimeLibrary::new()), policy);
        (host, unit)
    }

    async fn run(source: &str, input: Value) -> ExecutionOutcome {
        let policy = EnginePolicy::default();
        let (host, unit) = setup(&policy, source);
        host.run(&unit, &record(input), &OutputCapture::new(10, 100))
            .await
    }

    #[tokio::test]
    async fn test_mutated_record_is_output() {
        let output = run("record.score = record.score * 2.0;", json!({"ticker": "AAA", "score": 0.25}))
            .await
            .unwrap();
        assert_eq!(Value::Object(output), json!({"ticker": "AAA", "score": 0.5}));
    }

    #[tokio::test]
    async fn test_result_binding_takes_precedence() {
        let output = run(
            "record.ignored = true; result = #{ticker: record.ticker, fresh: 1};",
            json!({"ticker": "AAA"}),
        )
        .await
        .unwrap();
        assert_eq!(Value::Object(output), json!({"ticker": "AAA", "fresh": 1}));
    }

    #[tokio::test]
    async fn test_trailing_value_keeps_mutations() {
        let output = run(
            "record.score = 1.0; record.remove(\"tmp\")",
            json!({"ticker": "AAA", "score": 0.9, "tmp": "x"}),
        )
        .await
        .unwrap();
        assert_eq!(Value::Object(output), json!({"ticker": "AAA", "score": 1.0}));

        let output = run("record.tags = [1, 2]; record.tags.pop()", json!({"ticker": "AAA"}))
            .await
            .unwrap();
        assert_eq!(output.get("tags"), Some(&json!([1])));
    }

    #[tokio::test]
    async fn test_returned_value_is_not_output() {
        let output = run("record.v = 1; return #{ticker: \"AAA\", v: 2};", json!({"ticker": "AAA"}))
            .await
            .unwrap();
        assert_eq!(output.get("v"), Some(&json!(1)));
    }

    #[tokio::test]
    async fn test_unrepresentable_output() {
        let err = run("record.ratio = math::NAN;", json!({"ticker": "AAA"}))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "script must produce a map of JSON values, got non-finite float in field 'ratio'"
        );

        let err = run("record.span = 1..3;", json!({"ticker": "AAA"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::InvalidReturnType { ref type_name } if type_name.ends_with("in field 'span'")));
    }

    #[tokio::test]
    async fn test_identifier_is_restored() {
        let output = run("record.ticker = \"ZZZ\";", json!({"ticker": "AAA"}))
            .await
            .unwrap();
        assert_eq!(output.get("ticker"), Some(&json!("AAA")));
    }

    #[tokio::test]
    async fn test_non_map_output() {
        let err = run("result = 42;", json!({"ticker": "AAA"})).await.unwrap_err();
        assert!(matches!(err, ExecutionError::InvalidReturnType { ref type_name } if type_name == "i64"));
    }

    #[tokio::test]
    async fn test_output_without_identifier() {
        let err = run("result = #{score: 1.0};", json!({"ticker": "AAA"}))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ExecutionError::MissingRequiredField {
                field: "ticker".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_input_without_identifier_is_not_run() {
        let policy = EnginePolicy::default();
        let (host, unit) = setup(&policy, "print(\"ran\");");
        let capture = OutputCapture::new(10, 100);

        let err = host
            .run(&unit, &record(json!({"score": 1.0})), &capture)
            .await
            .unwrap_err();

        assert!(matches!(err, ExecutionError::MissingRequiredField { .. }));
        assert!(capture.is_empty());
    }

    #[tokio::test]
    async fn test_thrown_error_becomes_exception() {
        let err = run("throw \"bad record\";", json!({"ticker": "AAA"}))
            .await
            .unwrap_err();
        match err {
            ExecutionError::Exception { message } => assert!(message.contains("bad record")),
            other => panic!("expected exception, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_print_goes_to_capture() {
        let policy = EnginePolicy::default();
        let (host, unit) = setup(&policy, "print(`ticker ${record.ticker}`); debug(\"d\");");
        let capture = OutputCapture::new(10, 100);

        host.run(&unit, &record(json!({"ticker": "AAA"})), &capture)
            .await
            .unwrap();

        let lines = capture.lines();
        assert_eq!(lines[0], "ticker AAA");
        assert_eq!(lines.len(), 2);
    }

    #[tokio::test]
    async fn test_timeout_and_stats() {
        let policy = EnginePolicy::builder()
            .timeout(Duration::from_millis(100))
            .build();
        let (host, unit) = setup(&policy, "while true {}");

        let err = host
            .run(&unit, &record(json!({"ticker": "AAA"})), &OutputCapture::new(1, 10))
            .await
            .unwrap_err();

        assert_eq!(err, ExecutionError::Timeout { budget_ms: 100 });
        assert_eq!(
            host.stats(),
            HostStats {
                runs: 1,
                timeouts: 1,
                failures: 1
            }
        );
    }

    #[test]
    fn test_output_selection_order() {
        let mut scope = Scope::new();
        scope.push_dynamic(RECORD_BINDING, Dynamic::from(1_i64));
        scope.push_dynamic(RESULT_BINDING, Dynamic::UNIT);

        assert_eq!(select_output(&scope).as_int(), Ok(1));

        scope.set_value(RESULT_BINDING, 3_i64);
        assert_eq!(select_output(&scope).as_int(), Ok(3));
    }
}
