//! Column and table schema definitions

use crate::error::{CoreError, CoreResult};
use crate::serde_helpers::default_true;
use crate::value::{Row, Value};
use serde::{Deserialize, Serialize};

/// Logical column type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    #[serde(alias = "text", alias = "varchar")]
    String,
    #[serde(alias = "int", alias = "long", alias = "bigint")]
    Integer,
    #[serde(alias = "float", alias = "double")]
    Decimal,
    #[serde(alias = "bool")]
    Boolean,
    Date,
    Timestamp,
}

impl ColumnType {
    /// Whether a non-null value is acceptable for this column type
    pub fn accepts(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (_, Value::Null)
                | (ColumnType::String, Value::Text(_))
                | (ColumnType::Integer, Value::Int(_))
                | (ColumnType::Decimal, Value::Decimal(_))
                | (ColumnType::Decimal, Value::Int(_))
                | (ColumnType::Boolean, Value::Bool(_))
                | (ColumnType::Date, Value::Date(_))
                | (ColumnType::Timestamp, Value::Timestamp(_))
        )
    }
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnType::String => write!(f, "string"),
            ColumnType::Integer => write!(f, "integer"),
            ColumnType::Decimal => write!(f, "decimal"),
            ColumnType::Boolean => write!(f, "boolean"),
            ColumnType::Date => write!(f, "date"),
            ColumnType::Timestamp => write!(f, "timestamp"),
        }
    }
}

impl std::str::FromStr for ColumnType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_yaml::from_str(s.trim()).map_err(|_| CoreError::UnknownColumnType {
            name: s.to_string(),
        })
    }
}

/// A named, typed column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnDef {
    /// Column name
    pub name: String,

    /// Column type
    #[serde(rename = "type")]
    pub data_type: ColumnType,

    /// Whether NULL (an empty source field) is allowed
    #[serde(default = "default_true")]
    pub nullable: bool,
}

impl ColumnDef {
    pub fn required(name: &str, data_type: ColumnType) -> Self {
        Self {
            name: name.to_string(),
            data_type,
            nullable: false,
        }
    }

    pub fn nullable(name: &str, data_type: ColumnType) -> Self {
        Self {
            name: name.to_string(),
            data_type,
            nullable: true,
        }
    }
}

/// Ordered list of columns describing a table or a source file
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableSchema {
    pub columns: Vec<ColumnDef>,
}

impl TableSchema {
    pub fn new(columns: Vec<ColumnDef>) -> Self {
        Self { columns }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Keep only this schema's columns, filling absent ones with NULL
    pub fn project(&self, row: &Row) -> Row {
        self.columns
            .iter()
            .map(|c| {
                (
                    c.name.clone(),
                    row.get(&c.name).cloned().unwrap_or(Value::Null),
                )
            })
            .collect()
    }

    /// Check value types and nullability of a row against this schema
    pub fn check_row(&self, table: &str, row: &Row) -> CoreResult<()> {
        for col in &self.columns {
            let value = row.get(&col.name).unwrap_or(&Value::Null);
            if value.is_null() && !col.nullable {
                return Err(CoreError::ColumnType {
                    table: table.to_string(),
                    column: col.name.clone(),
                    expected: format!("non-null {}", col.data_type),
                    found: "null".to_string(),
                });
            }
            if !col.data_type.accepts(value) {
                return Err(CoreError::ColumnType {
                    table: table.to_string(),
                    column: col.name.clone(),
                    expected: col.data_type.to_string(),
                    found: value.type_name().to_string(),
                });
            }
        }
        Ok(())
    }
}
