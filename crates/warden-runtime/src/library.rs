//! The fixed set of primitives reachable from scripts.
//!
//! Scripts see three things:
//!
//! 1. The interpreter's pure packages: arithmetic, logic, strings, arrays
//!    (including `map`/`filter`), maps and range iteration. The language-core
//!    package is left out, which keeps `sleep`, `type_of` and friends
//!    unreachable.
//! 2. [`BUILTIN_FUNCTIONS`]: conversion and collection helpers with
//!    familiar names (`len`, `int`, `sorted`, `zip`, ...) and a fixed-point
//!    `decimal` constructor.
//! 3. The `math::` namespace ([`MATH_FUNCTIONS`], [`MATH_CONSTANTS`]).
//!
//! The literals `true`, `false` and `()` serve as the boolean and null
//! constants. Exponentiation is available as `**` and `pow`.
//!
//! Every function is pure: none touches the filesystem, clock, environment
//! or host state.

// native functions receive their arguments by value
#![allow(clippy::needless_pass_by_value)]

use rhai::packages::{
    ArithmeticPackage, BasicArrayPackage, BasicIteratorPackage, BasicMapPackage,
    BasicStringPackage, LogicPackage, MoreStringPackage, Package,
};
use rhai::{
    Array, Dynamic, Engine, EvalAltResult, FLOAT, INT, ImmutableString, Map, Module, Shared,
};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::num::FpCategory;
use std::str::FromStr;

type RhaiResultOf<T> = Result<T, Box<EvalAltResult>>;

/// Global helper functions registered by the library.
pub const BUILTIN_FUNCTIONS: &[&str] = &[
    "len", "abs", "min", "max", "round", "int", "float", "str", "bool", "list", "dict", "sum",
    "any", "all", "sorted", "enumerate", "zip", "pow", "decimal",
];

/// Functions in the `math::` namespace.
pub const MATH_FUNCTIONS: &[&str] = &[
    "sqrt", "exp", "ln", "log", "log10", "log2", "sin", "cos", "tan", "asin", "acos", "atan",
    "atan2", "sinh", "cosh", "tanh", "hypot", "pow", "floor", "ceil", "trunc", "fabs",
    "is_finite", "is_nan", "is_infinite",
];

/// Constants in the `math::` namespace.
pub const MATH_CONSTANTS: &[&str] = &["PI", "E", "TAU", "SQRT_2", "LN_2", "LN_10", "INF", "NAN"];

const UNARY_MATH: &[(&str, fn(FLOAT) -> FLOAT)] = &[
    ("sqrt", FLOAT::sqrt),
    ("exp", FLOAT::exp),
    ("ln", FLOAT::ln),
    ("log10", FLOAT::log10),
    ("log2", FLOAT::log2),
    ("sin", FLOAT::sin),
    ("cos", FLOAT::cos),
    ("tan", FLOAT::tan),
    ("asin", FLOAT::asin),
    ("acos", FLOAT::acos),
    ("atan", FLOAT::atan),
    ("sinh", FLOAT::sinh),
    ("cosh", FLOAT::cosh),
    ("tanh", FLOAT::tanh),
    ("floor", FLOAT::floor),
    ("ceil", FLOAT::ceil),
    ("trunc", FLOAT::trunc),
    ("fabs", FLOAT::abs),
];

const BINARY_MATH: &[(&str, fn(FLOAT, FLOAT) -> FLOAT)] = &[
    ("atan2", FLOAT::atan2),
    ("hypot", FLOAT::hypot),
    ("pow", FLOAT::powf),
    ("log", FLOAT::log),
];

/// Primitives exposed to every script.
///
/// Modules are built once and shared; installing them into a fresh engine
/// only clones reference-counted handles.
///
/// # Examples
///
/// ```
/// use rhai::Engine;
/// use warden_runtime::SafeRuntimeLibrary;
///
/// let library = SafeRuntimeLibrary::new();
/// let mut engine = Engine::new_raw();
/// library.install(&mut engine);
///
/// assert_eq!(engine.eval::<i64>("len([1, 2, 3]) + sum([1, 2])").unwrap(), 6);
/// assert_eq!(engine.eval::<f64>("math::sqrt(16.0)").unwrap(), 4.0);
/// ```
#[derive(Clone)]
pub struct SafeRuntimeLibrary {
    packages: Vec<Shared<Module>>,
    builtins: Shared<Module>,
    math: Shared<Module>,
}

impl std::fmt::Debug for SafeRuntimeLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SafeRuntimeLibrary")
            .field("packages", &self.packages.len())
            .field("builtins", &BUILTIN_FUNCTIONS)
            .field("math", &MATH_FUNCTIONS)
            .finish_non_exhaustive()
    }
}

impl Default for SafeRuntimeLibrary {
    fn default() -> Self {
        Self::new()
    }
}

impl SafeRuntimeLibrary {
    /// Builds the library modules.
    #[must_use]
    pub fn new() -> Self {
        let packages = vec![
            ArithmeticPackage::new().as_shared_module(),
            LogicPackage::new().as_shared_module(),
            BasicStringPackage::new().as_shared_module(),
            MoreStringPackage::new().as_shared_module(),
            BasicArrayPackage::new().as_shared_module(),
            BasicMapPackage::new().as_shared_module(),
            BasicIteratorPackage::new().as_shared_module(),
        ];

        Self {
            packages,
            builtins: Shared::new(builtins_module()),
            math: Shared::new(math_module()),
        }
    }

    /// Registers every module with `engine`.
    pub fn install(&self, engine: &mut Engine) {
        for package in &self.packages {
            engine.register_global_module(package.clone());
        }
        engine.register_global_module(self.builtins.clone());
        engine.register_static_module("math", self.math.clone());
    }
}

fn builtins_module() -> Module {
    let mut module = Module::new();

    module.set_native_fn("len", len);

    module.set_native_fn("abs", |x: INT| -> RhaiResultOf<INT> {
        x.checked_abs().ok_or_else(|| "integer overflow in abs()".into())
    });
    module.set_native_fn("abs", |x: FLOAT| Ok(x.abs()));

    module.set_native_fn("min", |a: INT, b: INT| Ok(a.min(b)));
    module.set_native_fn("min", |a: FLOAT, b: FLOAT| Ok(a.min(b)));
    module.set_native_fn("min", |a: INT, b: FLOAT| Ok(int_to_float(a).min(b)));
    module.set_native_fn("min", |a: FLOAT, b: INT| Ok(a.min(int_to_float(b))));
    module.set_native_fn("min", |items: Array| extreme(items, "min", true));
    module.set_native_fn("max", |a: INT, b: INT| Ok(a.max(b)));
    module.set_native_fn("max", |a: FLOAT, b: FLOAT| Ok(a.max(b)));
    module.set_native_fn("max", |a: INT, b: FLOAT| Ok(int_to_float(a).max(b)));
    module.set_native_fn("max", |a: FLOAT, b: INT| Ok(a.max(int_to_float(b))));
    module.set_native_fn("max", |items: Array| extreme(items, "max", false));

    module.set_native_fn("round", |x: INT| Ok(x));
    module.set_native_fn("round", |x: FLOAT| float_to_int(x.round_ties_even(), "round"));
    module.set_native_fn("round", |x: INT, _digits: INT| Ok(x));
    module.set_native_fn("round", round_digits);

    module.set_native_fn("int", to_int);
    module.set_native_fn("float", to_float);
    module.set_native_fn("str", |value: Dynamic| Ok(value.to_string()));
    module.set_native_fn("bool", |value: Dynamic| Ok(truthy(&value)));

    module.set_native_fn("list", || Ok(Array::new()));
    module.set_native_fn("list", to_list);
    module.set_native_fn("dict", || Ok(Map::new()));
    module.set_native_fn("dict", to_dict);

    module.set_native_fn("sum", sum);
    module.set_native_fn("any", |items: Array| Ok(items.iter().any(truthy)));
    module.set_native_fn("all", |items: Array| Ok(items.iter().all(truthy)));
    module.set_native_fn("sorted", |items: Array| sorted(items, false));
    module.set_native_fn("sorted", sorted);
    module.set_native_fn("enumerate", enumerate);
    module.set_native_fn("zip", |a: Array, b: Array| -> RhaiResultOf<Array> {
        Ok(a.into_iter()
            .zip(b)
            .map(|(x, y)| Dynamic::from_array(vec![x, y]))
            .collect::<Array>())
    });

    module.set_native_fn("pow", pow_int);
    module.set_native_fn("pow", |base: FLOAT, exp: FLOAT| Ok(base.powf(exp)));
    module.set_native_fn("pow", |base: INT, exp: FLOAT| Ok(int_to_float(base).powf(exp)));
    module.set_native_fn("pow", |base: FLOAT, exp: INT| {
        Ok(base.powf(int_to_float(exp)))
    });

    module.set_native_fn("decimal", to_decimal);

    module
}

fn math_module() -> Module {
    let mut module = Module::new();

    module.set_var("PI", std::f64::consts::PI);
    module.set_var("E", std::f64::consts::E);
    module.set_var("TAU", std::f64::consts::TAU);
    module.set_var("SQRT_2", std::f64::consts::SQRT_2);
    module.set_var("LN_2", std::f64::consts::LN_2);
    module.set_var("LN_10", std::f64::consts::LN_10);
    module.set_var("INF", FLOAT::INFINITY);
    module.set_var("NAN", FLOAT::NAN);

    for &(name, f) in UNARY_MATH {
        module.set_native_fn(name, move |x: FLOAT| Ok(f(x)));
        module.set_native_fn(name, move |x: INT| Ok(f(int_to_float(x))));
    }
    for &(name, f) in BINARY_MATH {
        module.set_native_fn(name, move |x: FLOAT, y: FLOAT| Ok(f(x, y)));
        module.set_native_fn(name, move |x: INT, y: INT| {
            Ok(f(int_to_float(x), int_to_float(y)))
        });
        module.set_native_fn(name, move |x: INT, y: FLOAT| Ok(f(int_to_float(x), y)));
        module.set_native_fn(name, move |x: FLOAT, y: INT| Ok(f(x, int_to_float(y))));
    }

    module.set_native_fn("is_finite", |x: FLOAT| Ok(x.is_finite()));
    module.set_native_fn("is_finite", |_: INT| Ok(true));
    module.set_native_fn("is_nan", |x: FLOAT| Ok(x.is_nan()));
    module.set_native_fn("is_nan", |_: INT| Ok(false));
    module.set_native_fn("is_infinite", |x: FLOAT| Ok(x.is_infinite()));
    module.set_native_fn("is_infinite", |_: INT| Ok(false));

    module
}

#[allow(clippy::cast_precision_loss)]
const fn int_to_float(x: INT) -> FLOAT {
    x as FLOAT
}

#[allow(clippy::cast_possible_truncation)]
fn float_to_int(x: FLOAT, caller: &str) -> RhaiResultOf<INT> {
    // INT::MAX is not representable; the upper bound is exclusive
    if x.is_finite() && x >= int_to_float(INT::MIN) && x < int_to_float(INT::MAX) {
        Ok(x as INT)
    } else {
        Err(format!("{caller}() cannot convert {x} to an integer").into())
    }
}

fn count(n: usize) -> RhaiResultOf<INT> {
    INT::try_from(n).map_err(|_| "length does not fit in an integer".into())
}

fn as_number(value: &Dynamic) -> Option<FLOAT> {
    value
        .as_int()
        .map(int_to_float)
        .or_else(|_| value.as_float())
        .ok()
}

/// Truthiness with the usual scripting conventions: `()`, `false`, zero,
/// and empty strings or collections are false.
fn truthy(value: &Dynamic) -> bool {
    if value.is_unit() {
        false
    } else if let Ok(b) = value.as_bool() {
        b
    } else if let Ok(i) = value.as_int() {
        i != 0
    } else if let Ok(f) = value.as_float() {
        f.classify() != FpCategory::Zero
    } else if let Ok(d) = value.as_decimal() {
        !d.is_zero()
    } else if let Some(s) = value.read_lock::<ImmutableString>() {
        !s.is_empty()
    } else if let Some(a) = value.read_lock::<Array>() {
        !a.is_empty()
    } else if let Some(m) = value.read_lock::<Map>() {
        !m.is_empty()
    } else {
        true
    }
}

fn len(value: Dynamic) -> RhaiResultOf<INT> {
    if let Some(s) = value.read_lock::<ImmutableString>() {
        return count(s.chars().count());
    }
    if let Some(a) = value.read_lock::<Array>() {
        return count(a.len());
    }
    if let Some(m) = value.read_lock::<Map>() {
        return count(m.len());
    }
    Err(format!("object of type '{}' has no len()", value.type_name()).into())
}

fn extreme(items: Array, caller: &str, smallest: bool) -> RhaiResultOf<Dynamic> {
    let mut best: Option<(FLOAT, Dynamic)> = None;
    for item in items {
        let Some(n) = as_number(&item) else {
            return Err(format!("{caller}() expects numbers, got {}", item.type_name()).into());
        };
        let replace = best
            .as_ref()
            .is_none_or(|(current, _)| if smallest { n < *current } else { n > *current });
        if replace {
            best = Some((n, item));
        }
    }
    best.map(|(_, item)| item)
        .ok_or_else(|| format!("{caller}() arg is an empty sequence").into())
}

fn round_digits(x: FLOAT, digits: INT) -> RhaiResultOf<FLOAT> {
    let digits = i32::try_from(digits).map_err(|_| "round() digits out of range")?;
    let scale = 10f64.powi(digits);
    Ok((x * scale).round_ties_even() / scale)
}

fn to_int(value: Dynamic) -> RhaiResultOf<INT> {
    if let Ok(i) = value.as_int() {
        return Ok(i);
    }
    if let Ok(f) = value.as_float() {
        return float_to_int(f.trunc(), "int");
    }
    if let Ok(b) = value.as_bool() {
        return Ok(INT::from(b));
    }
    if let Ok(d) = value.as_decimal() {
        return d
            .trunc()
            .to_i64()
            .ok_or_else(|| format!("int() cannot convert {d} to an integer").into());
    }
    if let Some(s) = value.read_lock::<ImmutableString>() {
        return s
            .trim()
            .parse::<INT>()
            .map_err(|_| format!("invalid literal for int(): '{}'", s.as_str()).into());
    }
    Err(format!("int() cannot convert {}", value.type_name()).into())
}

fn to_float(value: Dynamic) -> RhaiResultOf<FLOAT> {
    if let Ok(f) = value.as_float() {
        return Ok(f);
    }
    if let Ok(i) = value.as_int() {
        return Ok(int_to_float(i));
    }
    if let Ok(b) = value.as_bool() {
        return Ok(if b { 1.0 } else { 0.0 });
    }
    if let Ok(d) = value.as_decimal() {
        return d
            .to_f64()
            .ok_or_else(|| format!("float() cannot convert {d}").into());
    }
    if let Some(s) = value.read_lock::<ImmutableString>() {
        return s
            .trim()
            .parse::<FLOAT>()
            .map_err(|_| format!("could not convert string to float: '{}'", s.as_str()).into());
    }
    Err(format!("float() cannot convert {}", value.type_name()).into())
}

fn to_decimal(value: Dynamic) -> RhaiResultOf<Decimal> {
    if let Ok(d) = value.as_decimal() {
        return Ok(d);
    }
    if let Ok(i) = value.as_int() {
        return Ok(Decimal::from(i));
    }
    if let Ok(f) = value.as_float() {
        return Decimal::try_from(f).map_err(|e| format!("decimal() cannot convert {f}: {e}").into());
    }
    if let Some(s) = value.read_lock::<ImmutableString>() {
        return Decimal::from_str(s.trim())
            .map_err(|e| format!("invalid literal for decimal(): '{}': {e}", s.as_str()).into());
    }
    Err(format!("decimal() cannot convert {}", value.type_name()).into())
}

fn to_list(value: Dynamic) -> RhaiResultOf<Array> {
    if let Some(a) = value.read_lock::<Array>() {
        return Ok(a.clone());
    }
    if let Some(s) = value.read_lock::<ImmutableString>() {
        return Ok(s.chars().map(|c| Dynamic::from(c.to_string())).collect());
    }
    if let Some(m) = value.read_lock::<Map>() {
        return Ok(m.keys().map(|k| Dynamic::from(k.to_string())).collect());
    }
    Err(format!("list() cannot convert {}", value.type_name()).into())
}

fn to_dict(value: Dynamic) -> RhaiResultOf<Map> {
    if let Some(m) = value.read_lock::<Map>() {
        return Ok(m.clone());
    }
    let Some(pairs) = value.read_lock::<Array>() else {
        return Err(format!("dict() cannot convert {}", value.type_name()).into());
    };

    let mut map = Map::new();
    for pair in pairs.iter() {
        let entry = pair
            .read_lock::<Array>()
            .filter(|entry| entry.len() == 2)
            .ok_or("dict() expects a list of [key, value] pairs")?;
        map.insert(entry[0].to_string().into(), entry[1].clone());
    }
    Ok(map)
}

fn sum(items: Array) -> RhaiResultOf<Dynamic> {
    let mut int_total: INT = 0;
    let mut float_total: Option<FLOAT> = None;

    for item in &items {
        if let Ok(i) = item.as_int() {
            match float_total.as_mut() {
                Some(total) => *total += int_to_float(i),
                None => {
                    int_total = int_total
                        .checked_add(i)
                        .ok_or("integer overflow in sum()")?;
                }
            }
        } else if let Ok(f) = item.as_float() {
            float_total = Some(float_total.unwrap_or_else(|| int_to_float(int_total)) + f);
        } else {
            return Err(format!("sum() expects numbers, got {}", item.type_name()).into());
        }
    }

    Ok(float_total.map_or_else(|| Dynamic::from(int_total), Dynamic::from))
}

fn sorted(mut items: Array, reverse: bool) -> RhaiResultOf<Array> {
    if items.iter().all(|item| as_number(item).is_some()) {
        items.sort_by(|a, b| {
            let a = as_number(a).unwrap_or(FLOAT::NAN);
            let b = as_number(b).unwrap_or(FLOAT::NAN);
            a.total_cmp(&b)
        });
    } else if items.iter().all(Dynamic::is_string) {
        items.sort_by_cached_key(ToString::to_string);
    } else {
        return Err("sorted() expects all numbers or all strings".into());
    }

    if reverse {
        items.reverse();
    }
    Ok(items)
}

fn enumerate(items: Array) -> RhaiResultOf<Array> {
    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| Ok(Dynamic::from_array(vec![Dynamic::from(count(i)?), item])))
        .collect()
}

fn pow_int(base: INT, exp: INT) -> RhaiResultOf<INT> {
    let exp = u32::try_from(exp).map_err(|_| "pow() exponent must be a non-negative integer")?;
    base.checked_pow(exp)
        .ok_or_else(|| "integer overflow in pow()".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> Engine {
        let mut engine = Engine::new_raw();
        SafeRuntimeLibrary::new().install(&mut engine);
        engine
    }

    #[test]
    fn test_len_and_conversions() {
        let engine = engine();
        assert_eq!(engine.eval::<INT>(r#"len("héllo")"#).unwrap(), 5);
        assert_eq!(engine.eval::<INT>("len(#{a: 1, b: 2})").unwrap(), 2);
        assert_eq!(engine.eval::<INT>(r#"int(" 42 ")"#).unwrap(), 42);
        assert_eq!(engine.eval::<INT>("int(3.9)").unwrap(), 3);
        assert_eq!(engine.eval::<INT>("int(-3.9)").unwrap(), -3);
        assert!((engine.eval::<FLOAT>(r#"float("2.5")"#).unwrap() - 2.5).abs() < 1e-12);
        assert_eq!(engine.eval::<String>("str(42)").unwrap(), "42");
        assert!(engine.eval::<INT>("len(42)").is_err());
        assert!(engine.eval::<INT>(r#"int("abc")"#).is_err());
    }

    #[test]
    fn test_conversion_errors_name_the_literal() {
        let engine = engine();
        for (expr, literal) in [
            (r#"int("abc")"#, "'abc'"),
            (r#"float("x1")"#, "'x1'"),
            (r#"decimal("1.2.3")"#, "'1.2.3'"),
        ] {
            let err = engine.eval::<Dynamic>(expr).unwrap_err();
            assert!(err.to_string().contains(literal), "{expr}: {err}");
        }
    }

    #[test]
    fn test_truthiness() {
        let engine = engine();
        for (expr, expected) in [
            ("bool(())", false),
            ("bool(0)", false),
            ("bool(0.0)", false),
            (r#"bool("")"#, false),
            ("bool([])", false),
            ("bool(#{})", false),
            ("bool(1)", true),
            (r#"bool("x")"#, true),
            ("bool([0])", true),
        ] {
            assert_eq!(engine.eval::<bool>(expr).unwrap(), expected, "{expr}");
        }
        assert!(engine.eval::<bool>("any([0, (), 3])").unwrap());
        assert!(!engine.eval::<bool>("all([1, 0])").unwrap());
    }

    #[test]
    fn test_min_max_round() {
        let engine = engine();
        assert_eq!(engine.eval::<INT>("min(3, 7)").unwrap(), 3);
        assert!((engine.eval::<FLOAT>("max(3, 7.5)").unwrap() - 7.5).abs() < 1e-12);
        assert_eq!(engine.eval::<INT>("max([4, 9, 2])").unwrap(), 9);
        assert!(engine.eval::<Dynamic>("min([])").is_err());
        assert_eq!(engine.eval::<INT>("round(2.5)").unwrap(), 2);
        assert_eq!(engine.eval::<INT>("round(3.5)").unwrap(), 4);
        assert!((engine.eval::<FLOAT>("round(3.14159, 2)").unwrap() - 3.14).abs() < 1e-12);
        assert_eq!(engine.eval::<INT>("abs(-5)").unwrap(), 5);
    }

    #[test]
    fn test_collections() {
        let engine = engine();
        assert_eq!(engine.eval::<INT>("sum([1, 2, 3])").unwrap(), 6);
        assert!((engine.eval::<FLOAT>("sum([1, 2.5])").unwrap() - 3.5).abs() < 1e-12);
        assert!(engine.eval::<Dynamic>(r#"sum([1, "a"])"#).is_err());

        let sorted = engine.eval::<Array>("sorted([3, 1.5, 2])").unwrap();
        assert!((sorted[0].as_float().unwrap() - 1.5).abs() < 1e-12);
        assert_eq!(sorted[2].as_int().unwrap(), 3);

        let names = engine.eval::<Array>(r#"sorted(["b", "c", "a"], true)"#).unwrap();
        assert_eq!(names[0].to_string(), "c");
        assert!(engine.eval::<Array>(r#"sorted([1, "a"])"#).is_err());

        let pairs = engine.eval::<Array>(r#"enumerate(["x", "y"])"#).unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(engine.eval::<INT>(r#"enumerate(["x", "y"])[1][0]"#).unwrap(), 1);
        assert_eq!(engine.eval::<INT>("zip([1, 2, 3], [4, 5])[1][1]").unwrap(), 5);

        assert_eq!(engine.eval::<INT>("len(list(\"abc\"))").unwrap(), 3);
        assert_eq!(engine.eval::<INT>("len(dict([[\"a\", 1], [\"b\", 2]]))").unwrap(), 2);
        assert_eq!(engine.eval::<INT>("len(filter([1, 2, 3, 4], |x| x > 2))").unwrap(), 2);
        assert_eq!(engine.eval::<INT>("sum(map([1, 2, 3], |x| x * 2))").unwrap(), 12);
    }

    #[test]
    fn test_pow_and_math() {
        let engine = engine();
        assert_eq!(engine.eval::<INT>("pow(2, 10)").unwrap(), 1024);
        assert!(engine.eval::<INT>("pow(2, -1)").is_err());
        assert!(engine.eval::<INT>("pow(10, 40)").is_err());
        assert!((engine.eval::<FLOAT>("math::sqrt(2) * math::sqrt(2)").unwrap() - 2.0).abs() < 1e-9);
        assert!((engine.eval::<FLOAT>("math::PI").unwrap() - std::f64::consts::PI).abs() < 1e-12);
        assert!((engine.eval::<FLOAT>("math::floor(2.7)").unwrap() - 2.0).abs() < 1e-12);
        assert!((engine.eval::<FLOAT>("math::log(8.0, 2.0)").unwrap() - 3.0).abs() < 1e-9);
        assert!(engine.eval::<bool>("math::is_nan(math::NAN)").unwrap());
        assert!(!engine.eval::<bool>("math::is_finite(math::INF)").unwrap());
        assert!(engine.eval::<bool>("math::is_finite(3)").unwrap());
    }

    #[test]
    fn test_decimal_is_exact() {
        let engine = engine();
        let total = engine
            .eval::<Decimal>(r#"decimal("0.10") + decimal("0.20")"#)
            .unwrap();
        assert_eq!(total, Decimal::from_str("0.30").unwrap());
        assert!(engine.eval::<Decimal>(r#"decimal("not a number")"#).is_err());
    }

    #[test]
    fn test_host_facilities_are_unreachable() {
        let engine = engine();
        assert!(engine.eval::<Dynamic>("sleep(1)").is_err());
        assert!(engine.eval::<Dynamic>("timestamp()").is_err());
        assert!(engine.eval::<Dynamic>(r#"open("/etc/passwd")"#).is_err());
    }
}
