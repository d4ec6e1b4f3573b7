//! Placeholder binding.
//!
//! A [`PlaceholderBinder`] lives for exactly one generated statement: every
//! `bind` call appends a value and returns the token to splice into the SQL
//! text, and [`PlaceholderBinder::values`] hands the ordered buffer to the
//! driver while resetting the binder.

use crate::Value;
use serde::{Deserialize, Serialize};

/// Character that stands for the bound value inside a templated value
const TEMPLATE_SLOT: char = '?';

/// A value ready to be bound, possibly wrapped in a SQL function template
#[derive(Debug, Clone, PartialEq)]
pub enum BoundValue {
    /// Bound as-is
    Plain(Value),
    /// Bound through a template such as `datetime(?)`; the `?` is replaced by
    /// the rendered token, and WHERE columns are rewritten through the same
    /// template
    Templated { template: String, value: Value },
}

impl BoundValue {
    /// The value handed to the driver
    pub fn value(&self) -> &Value {
        match self {
            BoundValue::Plain(value) | BoundValue::Templated { value, .. } => value,
        }
    }

    pub fn is_null(&self) -> bool {
        self.value().is_null()
    }
}

impl From<Value> for BoundValue {
    fn from(value: Value) -> Self {
        BoundValue::Plain(value)
    }
}

/// A parameter as the driver receives it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BoundParam {
    Positional(Value),
    Named { name: String, value: Value },
}

impl BoundParam {
    pub fn value(&self) -> &Value {
        match self {
            BoundParam::Positional(value) | BoundParam::Named { value, .. } => value,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            BoundParam::Positional(_) => None,
            BoundParam::Named { name, .. } => Some(name),
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            BoundParam::Positional(value) | BoundParam::Named { value, .. } => value,
        }
    }
}

impl std::fmt::Display for BoundParam {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BoundParam::Positional(value) => f.write_str(&render_literal(value)),
            BoundParam::Named { name, value } => write!(f, "{}={}", name, render_literal(value)),
        }
    }
}

/// How a dialect spells its placeholders
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// `?` for every value, bound by position
    Question,
    /// `<prefix><format><n>` with a 1-based `n`, e.g. `$1`, `@v1`, `:v1`.
    /// Named styles bind each value under `<format><n>`.
    Numbered {
        prefix: &'static str,
        format: &'static str,
        named: bool,
    },
    /// Values are embedded into the SQL text as literals
    Literal,
}

impl PlaceholderStyle {
    /// Create a fresh binder for one statement
    pub fn binder(self) -> PlaceholderBinder {
        PlaceholderBinder::new(self)
    }
}

/// Ordered bind buffer for one statement
#[derive(Debug, Clone)]
pub struct PlaceholderBinder {
    style: PlaceholderStyle,
    values: Vec<Value>,
}

impl PlaceholderBinder {
    pub fn new(style: PlaceholderStyle) -> Self {
        Self {
            style,
            values: Vec::new(),
        }
    }

    pub fn style(&self) -> PlaceholderStyle {
        self.style
    }

    /// Number of values waiting in the buffer
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Append `value` and return the SQL token that refers to it
    pub fn bind(&mut self, value: impl Into<BoundValue>) -> String {
        let (template, value) = match value.into() {
            BoundValue::Plain(value) => (None, value),
            BoundValue::Templated { template, value } => (Some(template), value),
        };
        let token = match self.style {
            PlaceholderStyle::Question => {
                self.values.push(value);
                "?".to_string()
            }
            PlaceholderStyle::Numbered { prefix, format, .. } => {
                self.values.push(value);
                format!("{}{}{}", prefix, format, self.values.len())
            }
            PlaceholderStyle::Literal => render_literal(&value),
        };
        match template {
            Some(template) => template.replace(TEMPLATE_SLOT, &token),
            None => token,
        }
    }

    /// Take the buffered values in bind order, leaving the binder empty
    pub fn values(&mut self) -> Vec<BoundParam> {
        let values = std::mem::take(&mut self.values);
        match self.style {
            PlaceholderStyle::Numbered {
                format,
                named: true,
                ..
            } => values
                .into_iter()
                .enumerate()
                .map(|(i, value)| BoundParam::Named {
                    name: format!("{}{}", format, i + 1),
                    value,
                })
                .collect(),
            _ => values.into_iter().map(BoundParam::Positional).collect(),
        }
    }

    /// Column reference to compare against `value` in a WHERE clause
    pub fn column_for_where(&self, value: &BoundValue, column: &str) -> String {
        match value {
            BoundValue::Templated { template, .. } => template.replace(TEMPLATE_SLOT, column),
            BoundValue::Plain(_) => column.to_string(),
        }
    }
}

/// Render `value` as a SQL literal
pub fn render_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        Value::Int32(_) | Value::Int64(_) | Value::Float64(_) | Value::Decimal(_) => value.to_string(),
        Value::Bytes(bytes) => {
            let hex: String = bytes.iter().map(|b| format!("{:02X}", b)).collect();
            format!("X'{}'", hex)
        }
        other => quote_string(&other.to_string()),
    }
}

/// Single-quote `text`, doubling embedded quotes
pub fn quote_string(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const DOLLAR: PlaceholderStyle = PlaceholderStyle::Numbered {
        prefix: "$",
        format: "",
        named: false,
    };
    const AT_V: PlaceholderStyle = PlaceholderStyle::Numbered {
        prefix: "@",
        format: "v",
        named: true,
    };

    #[test]
    fn test_question_tokens_and_order() {
        let mut binder = PlaceholderStyle::Question.binder();
        assert_eq!(binder.bind(Value::Int64(1)), "?");
        assert_eq!(binder.bind(Value::String("a".into())), "?");
        assert_eq!(
            binder.values(),
            vec![
                BoundParam::Positional(Value::Int64(1)),
                BoundParam::Positional(Value::String("a".into())),
            ]
        );
    }

    #[test]
    fn test_values_resets_buffer() {
        let mut binder = DOLLAR.binder();
        binder.bind(Value::Int64(1));
        binder.bind(Value::Int64(2));
        assert_eq!(binder.values().len(), 2);
        assert!(binder.values().is_empty());
        // numbering restarts after a reset
        assert_eq!(binder.bind(Value::Int64(3)), "$1");
    }

    #[test]
    fn test_numbered_named_params() {
        let mut binder = AT_V.binder();
        assert_eq!(binder.bind(Value::Int64(10)), "@v1");
        assert_eq!(binder.bind(Value::Int64(20)), "@v2");
        let params = binder.values();
        assert_eq!(params[0].name(), Some("v1"));
        assert_eq!(params[1].name(), Some("v2"));
        assert_eq!(params[1].value(), &Value::Int64(20));
    }

    #[test]
    fn test_templated_value_rewrites_token_and_column() {
        let style = PlaceholderStyle::Numbered {
            prefix: "$",
            format: "v",
            named: true,
        };
        let mut binder = style.binder();
        binder.bind(Value::Int64(1));
        binder.bind(Value::Int64(2));
        let value = BoundValue::Templated {
            template: "datetime(?)".into(),
            value: Value::String("2024-05-25 13:45:33".into()),
        };
        let column = binder.column_for_where(&value, "created");
        let token = binder.bind(value);
        assert_eq!(format!("{} = {}", column, token), "datetime(created) = datetime($v3)");
        assert_eq!(binder.values()[2].value(), &Value::String("2024-05-25 13:45:33".into()));
    }

    #[test]
    fn test_literal_style_embeds_values() {
        let mut binder = PlaceholderStyle::Literal.binder();
        assert_eq!(binder.bind(Value::Int64(10)), "10");
        assert_eq!(binder.bind(Value::String("it's".into())), "'it''s'");
        assert_eq!(binder.bind(Value::Null), "NULL");
        assert!(binder.values().is_empty());
    }

    #[test]
    fn test_bound_param_display() {
        let named = BoundParam::Named {
            name: "v1".into(),
            value: Value::String("FOO".into()),
        };
        assert_eq!(named.to_string(), "v1='FOO'");
        assert_eq!(BoundParam::Positional(Value::Int64(3)).to_string(), "3");
    }
}
