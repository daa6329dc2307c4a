//! Column definitions.

use serde::{Deserialize, Serialize};

/// A column definition within a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    /// Column name (unique within the table).
    pub name: String,
    /// Column data type.
    pub column_type: ColumnType,
    /// Whether NULL values are allowed.
    pub nullable: bool,
    /// Default value (if any).
    pub default: Option<DefaultValue>,
    /// Maximum length for variable-length types.
    pub max_length: Option<u32>,
}

/// Supported column data types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    /// Boolean.
    Boolean,
    /// 32-bit signed integer.
    Int32,
    /// 64-bit signed integer.
    Int64,
    /// 64-bit floating point.
    Float64,
    /// Arbitrary-precision decimal.
    Decimal,
    /// Variable-length text.
    Text,
    /// Variable-length binary.
    Bytes,
    /// UUID.
    Uuid,
    /// Timestamp with time zone.
    DateTime,
}

/// A literal default value for a column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DefaultValue {
    /// Boolean literal.
    Bool(bool),
    /// Integer literal.
    Int(i64),
    /// Floating-point literal.
    Float(f64),
    /// Text literal.
    Text(String),
    /// Raw backend expression (e.g. `now()`).
    Expression(String),
}

impl ColumnDef {
    /// Create a new non-nullable column.
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: false,
            default: None,
            max_length: None,
        }
    }

    /// Create a nullable column.
    pub fn optional(name: impl Into<String>, column_type: ColumnType) -> Self {
        let mut col = Self::new(name, column_type);
        col.nullable = true;
        col
    }

    /// Set the default value.
    pub fn with_default(mut self, default: DefaultValue) -> Self {
        self.default = Some(default);
        self
    }

    /// Set the maximum length.
    pub fn with_max_length(mut self, max_length: u32) -> Self {
        self.max_length = Some(max_length);
        self
    }
}
