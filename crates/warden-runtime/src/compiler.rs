//! Turns validated scripts into executable units.
//!
//! The compiler always re-validates, then picks a backend:
//!
//! - **restricted**: the engine carries [`RuntimeGuards`] on top of the static
//!   checks. Requires the `restricted` cargo feature and
//!   `prefer_restricted = true` in the policy.
//! - **basic**: a plain engine that relies on static validation alone. This
//!   is a reduced-assurance mode and is logged as such.
//!
//! # Examples
//!
//! ```
//! use warden_core::{EnginePolicy, Script};
//! use warden_runtime::Compiler;
//!
//! let compiler = Compiler::new(&EnginePolicy::default());
//! let unit = compiler.compile(&Script::new("record.score *= 2.0;")).unwrap();
//!
//! assert_eq!(unit.uses_restricted_backend(), warden_runtime::RESTRICTED_AVAILABLE);
//! ```

use crate::security::RuntimeGuards;
use crate::validator::Validator;
use rhai::module_resolvers::DummyModuleResolver;
use rhai::{AST, Engine, OptimizationLevel};
use std::sync::Arc;
use tracing::{debug, warn};
use warden_core::{BackendKind, EnginePolicy, Script, ScriptDigest, ValidationError};

/// Whether the restricted backend is compiled into this build.
pub const RESTRICTED_AVAILABLE: bool = cfg!(feature = "restricted");

/// Validated, executable form of a script.
///
/// Owned by one batch run. The syntax tree sits behind an [`Arc`] only so
/// that the execution worker can hold it while the host waits.
#[derive(Clone)]
pub struct CompiledUnit {
    ast: Arc<AST>,
    backend: BackendKind,
    guards: Option<RuntimeGuards>,
    digest: ScriptDigest,
}

impl std::fmt::Debug for CompiledUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledUnit")
            .field("backend", &self.backend)
            .field("digest", &self.digest.short())
            .field("guards", &self.guards)
            .finish_non_exhaustive()
    }
}

impl CompiledUnit {
    /// Returns the backend that produced this unit.
    #[must_use]
    pub const fn backend(&self) -> BackendKind {
        self.backend
    }

    /// Returns `true` if runtime guards are enforced.
    #[must_use]
    pub const fn uses_restricted_backend(&self) -> bool {
        self.backend.is_restricted()
    }

    /// Returns the fingerprint of the source script.
    #[must_use]
    pub const fn digest(&self) -> &ScriptDigest {
        &self.digest
    }

    /// Returns the guards the unit must run with, if any.
    #[must_use]
    pub const fn guards(&self) -> Option<&RuntimeGuards> {
        self.guards.as_ref()
    }

    pub(crate) fn ast(&self) -> Arc<AST> {
        Arc::clone(&self.ast)
    }
}

/// Script compiler.
#[derive(Debug)]
pub struct Compiler {
    validator: Validator,
    guards: RuntimeGuards,
    prefer_restricted: bool,
}

impl Compiler {
    /// Creates a compiler for `policy`.
    #[must_use]
    pub fn new(policy: &EnginePolicy) -> Self {
        Self {
            validator: Validator::with_limits(policy.max_script_bytes(), policy.guards()),
            guards: RuntimeGuards::new(policy.guards().clone()),
            prefer_restricted: policy.prefer_restricted(),
        }
    }

    /// Returns the validator run before every compilation.
    #[must_use]
    pub const fn validator(&self) -> &Validator {
        &self.validator
    }

    /// Returns the backend [`compile`](Self::compile) will select.
    #[must_use]
    pub const fn backend(&self) -> BackendKind {
        if RESTRICTED_AVAILABLE && self.prefer_restricted {
            BackendKind::Restricted
        } else {
            BackendKind::Basic
        }
    }

    /// Validates and compiles `script`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] if validation fails, or
    /// [`ValidationError::Compile`] if the backend refuses the script.
    pub fn compile(&self, script: &Script) -> Result<CompiledUnit, ValidationError> {
        self.validator.validate(script)?;

        let digest = script.digest();
        let backend = self.backend();
        let guards = backend.is_restricted().then(|| self.guards.clone());

        if !backend.is_restricted() {
            warn!(
                digest = %digest.short(),
                "basic backend selected, relying on static validation only"
            );
        }

        let ast = base_engine(guards.as_ref())
            .compile(script.as_str())
            .map_err(|e| ValidationError::Compile {
                message: e.to_string(),
            })?;

        debug!(digest = %digest.short(), %backend, "script compiled");

        Ok(CompiledUnit {
            ast: Arc::new(ast),
            backend,
            guards,
            digest,
        })
    }
}

/// Creates an engine with no library, no module loading and, when given,
/// the runtime guards installed.
pub(crate) fn base_engine(guards: Option<&RuntimeGuards>) -> Engine {
    let mut engine = Engine::new_raw();
    engine.set_optimization_level(OptimizationLevel::None);
    engine.set_module_resolver(DummyModuleResolver::new());
    if let Some(guards) = guards {
        guards.apply(&mut engine);
    }
    engine
}
