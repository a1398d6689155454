//! Static analysis of user scripts.
//!
//! The validator parses a script without running it and walks every node of
//! the syntax tree. Interpreter nodes are first lowered into the closed
//! [`Construct`] enum; the policy decision is an exhaustive match over that
//! enum, so a new kind of construct cannot slip through without an explicit
//! allow/deny decision here.
//!
//! # Examples
//!
//! ```
//! use warden_core::{Script, ValidationError};
//! use warden_runtime::Validator;
//!
//! let validator = Validator::new(10_000);
//!
//! assert!(validator.validate(&Script::new("record.score = record.score * 2.0;")).is_ok());
//!
//! let err = validator.validate(&Script::new("import \"os\" as os;")).unwrap_err();
//! assert!(matches!(err, ValidationError::ForbiddenConstruct { .. }));
//! assert!(err.to_string().contains("import statement"));
//! ```

use crate::security::{CALLBACK_FUNCTIONS, is_forbidden_attribute, is_forbidden_call};
use rhai::{AST, ASTNode, Engine, Expr, FnCallExpr, OptimizationLevel, Position, Stmt};
use tracing::debug;
use warden_core::{GuardLimits, Script, ValidationError};

/// Syntax the policy has an opinion about.
///
/// Everything else lowers to [`Construct::Neutral`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Construct<'a> {
    /// `import` statement
    Import,
    /// `export` statement
    Export,
    /// A closure capturing a variable of an enclosing scope
    CapturedBinding,
    /// Plain function call
    Call(&'a str),
    /// Method call (`x.name(..)`)
    MethodCall(&'a str),
    /// Function named by a string literal where a callback is expected
    /// (`map(xs, "name")`)
    NamedCallback(&'a str),
    /// Property access (`x.name`)
    Property(&'a str),
    /// Subscript with a string literal key (`x["name"]`)
    StringIndex(&'a str),
    /// Anything else
    Neutral,
}

impl<'a> Construct<'a> {
    fn of(node: &ASTNode<'a>) -> Self {
        #[allow(unreachable_patterns)]
        match node {
            ASTNode::Stmt(stmt) => Self::of_stmt(*stmt),
            ASTNode::Expr(expr) => Self::of_expr(*expr),
            _ => Self::Neutral,
        }
    }

    fn of_stmt(stmt: &'a Stmt) -> Self {
        match stmt {
            Stmt::Import(..) => Self::Import,
            Stmt::Export(..) => Self::Export,
            Stmt::Share(..) => Self::CapturedBinding,
            Stmt::FnCall(call, _) => Self::of_call(call, Self::Call),
            _ => Self::Neutral,
        }
    }

    fn of_expr(expr: &'a Expr) -> Self {
        match expr {
            Expr::FnCall(call, _) => Self::of_call(call, Self::Call),
            Expr::MethodCall(call, _) => Self::of_call(call, Self::MethodCall),
            Expr::Property(property, _) => Self::Property(property.2.as_str()),
            Expr::Index(index, ..) => match &index.rhs {
                Expr::StringConstant(key, _) => Self::StringIndex(key.as_str()),
                _ => Self::Neutral,
            },
            _ => Self::Neutral,
        }
    }

    fn of_call(call: &'a FnCallExpr, plain: fn(&'a str) -> Self) -> Self {
        let name = call.name.as_str();
        if CALLBACK_FUNCTIONS.contains(&name) {
            let named = call.args.iter().find_map(|arg| match arg {
                Expr::StringConstant(target, _) => Some(target.as_str()),
                _ => None,
            });
            if let Some(target) = named {
                return Self::NamedCallback(target);
            }
        }
        plain(name)
    }
}

fn position_of(node: &ASTNode<'_>) -> Position {
    #[allow(unreachable_patterns)]
    match node {
        ASTNode::Stmt(stmt) => stmt.position(),
        ASTNode::Expr(expr) => expr.position(),
        _ => Position::NONE,
    }
}

const CAPTURED_BINDING: &str = "closure capturing an outer variable \
    (closures may only use their parameters; use a `for` loop or pass the value \
    to a function instead)";

/// Decides whether one node is allowed.
fn check(construct: Construct<'_>, line: Option<usize>) -> Result<(), ValidationError> {
    let forbidden = |construct: &str| {
        Err(ValidationError::ForbiddenConstruct {
            construct: construct.to_string(),
            line,
        })
    };

    match construct {
        Construct::Import => forbidden("import statement"),
        Construct::Export => forbidden("export statement"),
        Construct::CapturedBinding => forbidden(CAPTURED_BINDING),
        Construct::Call(name) | Construct::MethodCall(name) | Construct::NamedCallback(name)
            if is_forbidden_call(name) =>
        {
            Err(ValidationError::ForbiddenCall {
                name: name.to_string(),
                line,
            })
        }
        Construct::Property(name) | Construct::StringIndex(name)
            if is_forbidden_attribute(name) =>
        {
            Err(ValidationError::ForbiddenAttribute {
                name: name.to_string(),
                line,
            })
        }
        Construct::Call(_)
        | Construct::MethodCall(_)
        | Construct::NamedCallback(_)
        | Construct::Property(_)
        | Construct::StringIndex(_)
        | Construct::Neutral => Ok(()),
    }
}

/// Static script checker.
///
/// Holds a parse-only interpreter: no library is registered and the
/// optimizer is off, so nothing in the script is evaluated, not even
/// constant expressions.
pub struct Validator {
    engine: Engine,
    max_script_bytes: usize,
}

impl std::fmt::Debug for Validator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Validator")
            .field("max_script_bytes", &self.max_script_bytes)
            .finish_non_exhaustive()
    }
}

impl Validator {
    /// Creates a validator accepting scripts up to `max_script_bytes`.
    #[must_use]
    pub fn new(max_script_bytes: usize) -> Self {
        Self::with_limits(max_script_bytes, &GuardLimits::default())
    }

    /// Creates a validator whose parser nesting limits follow `limits`.
    #[must_use]
    pub fn with_limits(max_script_bytes: usize, limits: &GuardLimits) -> Self {
        let mut engine = Engine::new_raw();
        engine.set_optimization_level(OptimizationLevel::None);
        engine.set_max_expr_depths(limits.max_expr_depth, limits.max_fn_expr_depth);

        Self {
            engine,
            max_script_bytes,
        }
    }

    /// Returns the size limit in bytes.
    #[must_use]
    pub const fn max_script_bytes(&self) -> usize {
        self.max_script_bytes
    }

    /// Checks `script` against the policy.
    ///
    /// Size and emptiness are checked before parsing. The first violation
    /// found is returned.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] naming the offending construct.
    pub fn validate(&self, script: &Script) -> Result<(), ValidationError> {
        if script.is_blank() {
            return Err(ValidationError::Empty);
        }
        if script.size() > self.max_script_bytes {
            return Err(ValidationError::TooLarge {
                size: script.size(),
                limit: self.max_script_bytes,
            });
        }

        let ast = self
            .engine
            .compile(script.as_str())
            .map_err(|e| ValidationError::Syntax {
                message: e.to_string(),
            })?;

        let result = check_ast(&ast);
        if let Err(err) = &result {
            debug!(digest = %script.digest().short(), reason = %err, "script rejected");
        }
        result
    }
}

fn check_ast(ast: &AST) -> Result<(), ValidationError> {
    let mut violation = None;

    let completed = ast.walk(&mut |path: &[ASTNode<'_>]| {
        let Some(node) = path.last() else {
            return true;
        };
        match check(Construct::of(node), position_of(node).line()) {
            Ok(()) => true,
            Err(err) => {
                violation = Some(err);
                false
            }
        }
    });
    debug_assert_eq!(completed, violation.is_none());

    violation.map_or(Ok(()), Err)
}
