//! Forbidden names and runtime guards.
//!
//! The static sets here are consulted by the [`Validator`](crate::validator::Validator)
//! against names parsed out of the script. [`RuntimeGuards`] are the
//! restricted backend's second line of defence, applied to every engine it
//! builds.
//!
//! # Examples
//!
//! ```
//! use warden_runtime::security::{is_dunder, is_forbidden_attribute, is_forbidden_call};
//!
//! assert!(is_forbidden_call("eval"));
//! assert!(is_forbidden_call("getattr"));
//! assert!(!is_forbidden_call("len"));
//!
//! assert!(is_forbidden_attribute("__globals__"));
//! assert!(is_forbidden_attribute("__anything_else__"));
//! assert!(!is_forbidden_attribute("score"));
//!
//! assert!(is_dunder("__init__"));
//! assert!(!is_dunder("____"));
//! ```

use rhai::Engine;
use warden_core::GuardLimits;

/// Call targets rejected at validation time.
pub const FORBIDDEN_CALLS: &[&str] = &[
    // dynamic evaluation and function-pointer indirection
    "eval",
    "exec",
    "compile",
    "Fn",
    "call",
    "curry",
    "__import__",
    // introspection
    "globals",
    "locals",
    "vars",
    "dir",
    "getattr",
    "setattr",
    "hasattr",
    "delattr",
    "type_of",
    "is_def_var",
    "is_def_fn",
    "is_shared",
    "get_fn_metadata_list",
    // type and metaclass machinery
    "type",
    "super",
    "object",
    "classmethod",
    "staticmethod",
    "memoryview",
    // filesystem, process, environment
    "open",
    "read_file",
    "write_file",
    "getenv",
    "env",
    "system",
    "exit",
    "quit",
    "sleep",
    // interactive and debugger entry points
    "input",
    "breakpoint",
    "help",
];

/// Array functions that also accept a callback given as a function name.
///
/// A string literal passed to one of these is checked like a direct call,
/// so `map(xs, "type_of")` is rejected the same way as `type_of(x)`.
pub const CALLBACK_FUNCTIONS: &[&str] = &[
    "map", "filter", "reduce", "reduce_rev", "some", "all", "find", "find_map", "index_of",
    "retain", "drain", "sort", "dedup", "for_each",
];

/// Attribute and property names rejected at validation time.
///
/// Any name of the form `__x__` is rejected as well, listed here or not.
pub const FORBIDDEN_ATTRIBUTES: &[&str] = &[
    "__code__",
    "__globals__",
    "__closure__",
    "__builtins__",
    "__class__",
    "__bases__",
    "__base__",
    "__subclasses__",
    "__mro__",
    "__dict__",
    "__func__",
    "__self__",
    "__module__",
    "__getattribute__",
    "mro",
    "func_code",
    "func_globals",
    "gi_frame",
    "gi_code",
    "cr_frame",
    "cr_code",
    "ag_frame",
    "f_globals",
    "f_locals",
    "f_builtins",
    "f_back",
    "tb_frame",
    "co_code",
];

/// Keywords switched off in engines built with runtime guards.
///
/// Scripts that reach the restricted backend never contain these, since the
/// validator rejects them first.
const DISABLED_KEYWORDS: &[&str] = &[
    "import",
    "export",
    "eval",
    "Fn",
    "call",
    "curry",
    "is_def_var",
    "is_def_fn",
    "is_shared",
    "type_of",
];

/// Returns `true` for names that begin and end with a double underscore.
#[must_use]
pub fn is_dunder(name: &str) -> bool {
    name.len() > 4 && name.starts_with("__") && name.ends_with("__")
}

/// Returns `true` if calling `name` is forbidden.
#[must_use]
pub fn is_forbidden_call(name: &str) -> bool {
    FORBIDDEN_CALLS.contains(&name) || is_dunder(name)
}

/// Returns `true` if accessing attribute `name` is forbidden.
#[must_use]
pub fn is_forbidden_attribute(name: &str) -> bool {
    FORBIDDEN_ATTRIBUTES.contains(&name) || is_dunder(name)
}

/// Runtime guards enforced by the restricted backend.
///
/// Bounds string, array and map growth (guarded subscript and iteration),
/// call and expression depth, and optionally the operation count. It also
/// disables the dangerous keywords and refuses dunder variable lookups.
///
/// # Examples
///
/// ```
/// use warden_core::GuardLimits;
/// use warden_runtime::security::RuntimeGuards;
///
/// let guards = RuntimeGuards::new(GuardLimits::default());
/// assert_eq!(guards.limits().max_call_depth, 16);
/// ```
#[derive(Debug, Clone)]
pub struct RuntimeGuards {
    limits: GuardLimits,
}

impl RuntimeGuards {
    /// Creates guards from policy limits.
    #[must_use]
    pub const fn new(limits: GuardLimits) -> Self {
        Self { limits }
    }

    /// Returns the configured limits.
    #[must_use]
    pub const fn limits(&self) -> &GuardLimits {
        &self.limits
    }

    /// Installs the guards on `engine`.
    pub(crate) fn apply(&self, engine: &mut Engine) {
        let limits = &self.limits;

        // zero means unlimited to the interpreter
        engine.set_max_operations(limits.max_operations.unwrap_or(0));
        engine.set_max_string_size(limits.max_string_bytes);
        engine.set_max_array_size(limits.max_array_len);
        engine.set_max_map_size(limits.max_map_len);
        engine.set_max_call_levels(limits.max_call_depth);
        engine.set_max_expr_depths(limits.max_expr_depth, limits.max_fn_expr_depth);
        engine.set_max_modules(0);

        for keyword in DISABLED_KEYWORDS {
            engine.disable_symbol(*keyword);
        }

        engine.on_var(|name, _, _| {
            if is_dunder(name) {
                Err(format!("access to '{name}' is not allowed").into())
            } else {
                Ok(None)
            }
        });
    }
}
