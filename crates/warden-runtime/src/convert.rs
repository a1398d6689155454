//! Conversion of script values back into JSON.
//!
//! Records enter a script through `rhai::serde::to_dynamic`. The way back is
//! walked by hand so that every interpreter value gets an explicit decision:
//!
//! - decimals become JSON numbers when the number is exact, strings otherwise
//!   (integers wider than `i64` arrive as decimals and leave as `u64`);
//! - characters become one-character strings and blobs become byte arrays;
//! - non-finite floats, ranges, function pointers and any other value with no
//!   JSON counterpart are refused with the path of the offending field.
//!
//! # Examples
//!
//! ```
//! use rhai::{Dynamic, Map};
//! use rust_decimal::Decimal;
//! use serde_json::json;
//! use warden_runtime::convert::to_json;
//!
//! let mut map = Map::new();
//! map.insert("total".into(), Dynamic::from_decimal(Decimal::new(30, 2)));
//! map.insert("range".into(), Dynamic::from(1_i64..3));
//!
//! let err = to_json(&Dynamic::from_map(map.clone())).unwrap_err();
//! assert_eq!(err.path, "range");
//!
//! map.remove("range");
//! assert_eq!(to_json(&Dynamic::from_map(map)).unwrap(), json!({"total": 0.3}));
//! ```

use rhai::{Array, Blob, Dynamic, ImmutableString, Map};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde_json::{Number, Value};
use std::str::FromStr;
use thiserror::Error;

/// Type name reported for `NaN` and the infinities.
pub const NON_FINITE_FLOAT: &str = "non-finite float";

/// A script value with no JSON counterpart.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{type_name} in field '{path}'")]
pub struct Unrepresentable {
    /// Location inside the output, e.g. `scores[2]` or `meta.range`
    pub path: String,
    /// Interpreter type name of the value
    pub type_name: String,
}

/// Converts a script value into JSON.
///
/// # Errors
///
/// Returns [`Unrepresentable`] for the first value, in field order, that has
/// no JSON form.
pub fn to_json(value: &Dynamic) -> Result<Value, Unrepresentable> {
    convert(value, "")
}

fn convert(value: &Dynamic, path: &str) -> Result<Value, Unrepresentable> {
    if value.is_unit() {
        return Ok(Value::Null);
    }
    if let Ok(b) = value.as_bool() {
        return Ok(Value::Bool(b));
    }
    if let Ok(i) = value.as_int() {
        return Ok(Value::from(i));
    }
    if let Ok(f) = value.as_float() {
        return Number::from_f64(f)
            .map(Value::Number)
            .ok_or_else(|| unrepresentable(path, NON_FINITE_FLOAT));
    }
    if let Ok(d) = value.as_decimal() {
        return Ok(decimal_to_json(d));
    }
    if let Ok(c) = value.as_char() {
        return Ok(Value::String(c.to_string()));
    }
    if let Some(s) = value.read_lock::<ImmutableString>() {
        return Ok(Value::String(s.as_str().to_string()));
    }
    if let Some(items) = value.read_lock::<Array>() {
        return items
            .iter()
            .enumerate()
            .map(|(i, item)| convert(item, &format!("{path}[{i}]")))
            .collect();
    }
    if let Some(bytes) = value.read_lock::<Blob>() {
        return Ok(bytes.iter().copied().map(Value::from).collect());
    }
    if let Some(map) = value.read_lock::<Map>() {
        let mut object = serde_json::Map::with_capacity(map.len());
        for (key, item) in map.iter() {
            let child = if path.is_empty() {
                key.to_string()
            } else {
                format!("{path}.{key}")
            };
            object.insert(key.to_string(), convert(item, &child)?);
        }
        return Ok(Value::Object(object));
    }

    Err(unrepresentable(path, value.type_name()))
}

fn unrepresentable(path: &str, type_name: &str) -> Unrepresentable {
    Unrepresentable {
        path: path.to_string(),
        type_name: type_name.to_string(),
    }
}

/// Exact JSON form of a decimal: an integer when integral and in range, a
/// float when the float prints back to the same value, a string otherwise.
fn decimal_to_json(d: Decimal) -> Value {
    if d.fract().is_zero() {
        if let Some(i) = d.to_i64() {
            return Value::from(i);
        }
        if let Some(u) = d.to_u64() {
            return Value::from(u);
        }
    }

    d.to_f64()
        .filter(|f| Decimal::from_str(&f.to_string()).is_ok_and(|back| back == d))
        .and_then(Number::from_f64)
        .map_or_else(|| Value::String(d.to_string()), Value::Number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(entries: Vec<(&str, Dynamic)>) -> Dynamic {
        let mut map = Map::new();
        for (key, value) in entries {
            map.insert(key.into(), value);
        }
        Dynamic::from_map(map)
    }

    fn decimal(text: &str) -> Decimal {
        Decimal::from_str(text).unwrap()
    }

    #[test]
    fn test_plain_values() {
        let value = map(vec![
            ("n", Dynamic::UNIT),
            ("b", Dynamic::from(true)),
            ("i", Dynamic::from(-3_i64)),
            ("f", Dynamic::from(0.5_f64)),
            ("s", Dynamic::from("abc")),
            ("c", Dynamic::from('x')),
            ("a", Dynamic::from_array(vec![Dynamic::from(1_i64), Dynamic::UNIT])),
            ("blob", Dynamic::from_blob(vec![0, 255])),
        ]);

        assert_eq!(
            to_json(&value).unwrap(),
            json!({
                "n": null, "b": true, "i": -3, "f": 0.5, "s": "abc", "c": "x",
                "a": [1, null], "blob": [0, 255],
            })
        );
    }

    #[test]
    fn test_decimals_stay_exact() {
        assert_eq!(decimal_to_json(decimal("0.30")), json!(0.3));
        assert_eq!(decimal_to_json(decimal("3.00")), json!(3));
        assert_eq!(decimal_to_json(decimal("-12")), json!(-12));
        assert_eq!(
            decimal_to_json(decimal("18446744073709551615")),
            json!(18_446_744_073_709_551_615_u64)
        );
        assert_eq!(
            decimal_to_json(decimal("0.1000000000000000000000000001")),
            json!("0.1000000000000000000000000001")
        );
        assert_eq!(decimal_to_json(decimal("100000000000000000000000000")), json!(1e26));
        assert_eq!(
            decimal_to_json(decimal("123456789012345678901234567")),
            json!("123456789012345678901234567")
        );
    }

    #[test]
    fn test_non_finite_float_is_refused_with_path() {
        let value = map(vec![(
            "stats",
            map(vec![(
                "values",
                Dynamic::from_array(vec![Dynamic::from(1.0_f64), Dynamic::from(f64::NAN)]),
            )]),
        )]);

        let err = to_json(&value).unwrap_err();
        assert_eq!(err.path, "stats.values[1]");
        assert_eq!(err.type_name, NON_FINITE_FLOAT);
        assert_eq!(err.to_string(), "non-finite float in field 'stats.values[1]'");
    }

    #[test]
    fn test_range_is_refused() {
        let err = to_json(&map(vec![("r", Dynamic::from(1_i64..3))])).unwrap_err();
        assert_eq!(err.path, "r");
        assert!(!err.type_name.is_empty());
    }
}
