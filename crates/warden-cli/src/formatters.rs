//! Output formatters for CLI reports.
//!
//! Every report can be rendered three ways: indented JSON, compact
//! single-line JSON (text), or a colorized outline for terminals (pretty).

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use warden_core::cli::OutputFormat;

/// Formats a report according to `format`.
///
/// # Errors
///
/// Returns an error if the report cannot be serialized.
///
/// # Examples
///
/// ```
/// use serde::Serialize;
/// use warden_cli::formatters::format_output;
/// use warden_core::cli::OutputFormat;
///
/// #[derive(Serialize)]
/// struct Summary {
///     processed: usize,
///     failed: usize,
/// }
///
/// let output = format_output(&Summary { processed: 2, failed: 0 }, OutputFormat::Text)?;
/// assert_eq!(output, r#"{"processed":2,"failed":0}"#);
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn format_output<T: Serialize>(data: &T, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(data)?),
        OutputFormat::Text => Ok(serde_json::to_string(data)?),
        OutputFormat::Pretty => pretty::format(data),
    }
}

/// Colorized outline rendering.
pub mod pretty {
    use super::{Colorize, Result, Serialize};
    use serde_json::Value;
    use std::fmt::Write;

    /// Renders `data` as an indented `key: value` outline.
    ///
    /// Sequences are listed with `-` markers; empty containers are shown
    /// inline as `[]` and `{}`.
    ///
    /// # Errors
    ///
    /// Returns an error if `data` cannot be serialized.
    pub fn format<T: Serialize>(data: &T) -> Result<String> {
        let value = serde_json::to_value(data)?;
        let mut out = String::new();
        match &value {
            Value::Object(_) | Value::Array(_) => write_block(&mut out, &value, 0)?,
            scalar => out.push_str(&scalar_text(scalar)),
        }
        Ok(out.trim_end().to_string())
    }

    fn write_block(out: &mut String, value: &Value, depth: usize) -> Result<()> {
        let pad = "  ".repeat(depth);
        match value {
            Value::Object(map) => {
                for (key, item) in map {
                    let key = key.blue().bold();
                    if is_nested(item) {
                        writeln!(out, "{pad}{key}:")?;
                        write_block(out, item, depth + 1)?;
                    } else {
                        writeln!(out, "{pad}{key}: {}", scalar_text(item))?;
                    }
                }
            }
            Value::Array(items) => {
                for item in items {
                    if is_nested(item) {
                        writeln!(out, "{pad}-")?;
                        write_block(out, item, depth + 1)?;
                    } else {
                        writeln!(out, "{pad}- {}", scalar_text(item))?;
                    }
                }
            }
            scalar => writeln!(out, "{pad}{}", scalar_text(scalar))?,
        }
        Ok(())
    }

    fn is_nested(value: &Value) -> bool {
        match value {
            Value::Object(map) => !map.is_empty(),
            Value::Array(items) => !items.is_empty(),
            _ => false,
        }
    }

    fn scalar_text(value: &Value) -> String {
        match value {
            Value::Null => "null".dimmed().to_string(),
            Value::Bool(true) => "true".green().to_string(),
            Value::Bool(false) => "false".red().to_string(),
            Value::Number(n) => n.to_string().cyan().to_string(),
            Value::String(s) => s.clone(),
            Value::Array(_) => "[]".dimmed().to_string(),
            Value::Object(_) => "{}".dimmed().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn plain() {
        colored::control::set_override(false);
    }

    #[test]
    fn test_json_is_indented() {
        let output = format_output(&json!({"valid": true}), OutputFormat::Json).unwrap();
        assert_eq!(output, "{\n  \"valid\": true\n}");
    }

    #[test]
    fn test_text_is_single_line() {
        let output = format_output(&json!({"a": [1, 2], "b": "x"}), OutputFormat::Text).unwrap();
        assert!(!output.contains('\n'));
    }

    #[test]
    fn test_pretty_outline() {
        plain();
        let data = json!({
            "trace": {"processed": 2, "errors": [], "console": ["hi", "there"]},
            "valid": false,
        });

        let output = format_output(&data, OutputFormat::Pretty).unwrap();

        assert_eq!(
            output,
            "trace:\n  console:\n    - hi\n    - there\n  errors: []\n  processed: 2\nvalid: false"
        );
    }

    #[test]
    fn test_pretty_nested_sequence_items() {
        plain();
        let data = json!({"errors": [{"index": 1, "kind": "timeout"}]});

        let output = pretty::format(&data).unwrap();

        assert_eq!(output, "errors:\n  -\n    index: 1\n    kind: timeout");
    }

    #[test]
    fn test_pretty_scalar() {
        plain();
        assert_eq!(pretty::format(&"done").unwrap(), "done");
    }
}
