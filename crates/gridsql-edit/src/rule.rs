//! Per-column validation and coercion rules

use gridsql_core::{
    BoundValue, ColumnMeta, DialectEntry, GridsqlError, Result, TypeConverter, Value,
    normalize_type_name,
};

/// Type-name fragments that mark a column as numeric
const NUMERIC_MARKERS: [&str; 8] = [
    "INT", "FLOAT", "DOUBLE", "REAL", "SERIAL", "NUMBER", "NUMERIC", "DECIMAL",
];

/// How a column's text is interpreted
#[derive(Clone, Copy)]
pub enum ColumnKind {
    /// The dialect has a converter for the type
    Temporal(TypeConverter),
    Numeric,
    Text,
}

impl std::fmt::Debug for ColumnKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnKind::Temporal(_) => f.write_str("Temporal"),
            ColumnKind::Numeric => f.write_str("Numeric"),
            ColumnKind::Text => f.write_str("Text"),
        }
    }
}

/// Validation and coercion for one fetched column
#[derive(Debug, Clone)]
pub struct ColumnRule {
    name: String,
    type_name: String,
    nullable: Option<bool>,
    kind: ColumnKind,
    null: String,
}

impl ColumnRule {
    /// Build the rule for `column` as reported by the driver; a dialect
    /// converter takes priority over the numeric markers
    pub fn new(column: &ColumnMeta, dialect: &DialectEntry, null: &str) -> Self {
        let type_name = normalize_type_name(&column.data_type);
        let kind = if let Some(converter) = dialect.type_converter(&type_name) {
            ColumnKind::Temporal(converter)
        } else if type_name == "YEAR" || NUMERIC_MARKERS.iter().any(|m| type_name.contains(m)) {
            ColumnKind::Numeric
        } else {
            ColumnKind::Text
        };
        Self {
            name: column.name.clone(),
            type_name,
            nullable: column.nullable,
            kind,
            null: null.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Normalized upper-case type name
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn kind(&self) -> ColumnKind {
        self.kind
    }

    /// Unknown nullability counts as nullable
    pub fn accepts_null(&self) -> bool {
        self.nullable != Some(false)
    }

    fn fail(&self, reason: impl Into<String>) -> GridsqlError {
        GridsqlError::coercion(&self.name, reason)
    }

    /// Convert grid text into the value to bind
    pub fn coerce(&self, text: &str) -> Result<BoundValue> {
        if text == self.null {
            return if self.accepts_null() {
                Ok(BoundValue::Plain(Value::Null))
            } else {
                Err(self.fail("column is NOT NULL"))
            };
        }
        match self.kind {
            ColumnKind::Temporal(convert) => convert(text).map_err(|e| self.fail(e.to_string())),
            ColumnKind::Numeric => parse_number(text.trim())
                .map(BoundValue::Plain)
                .ok_or_else(|| self.fail("not a number")),
            ColumnKind::Text => Ok(BoundValue::Plain(Value::String(text.to_string()))),
        }
    }

    /// Check a cell edit, returning the text the grid should keep.
    ///
    /// Empty input on temporal and numeric columns means NULL.
    pub fn validate(&self, text: &str) -> Result<String> {
        let text = match self.kind {
            ColumnKind::Temporal(_) | ColumnKind::Numeric if text.trim().is_empty() => {
                self.null.as_str()
            }
            _ => text,
        };
        self.coerce(text)?;
        Ok(text.to_string())
    }
}

/// Integers that fit `i64` bind as such; any other finite float text binds
/// verbatim so precision beyond `f64` survives
fn parse_number(text: &str) -> Option<Value> {
    if let Ok(i) = text.parse::<i64>() {
        return Some(Value::Int64(i));
    }
    match text.parse::<f64>() {
        Ok(f) if f.is_finite() => Some(Value::Decimal(text.to_string())),
        _ => None,
    }
}
