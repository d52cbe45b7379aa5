use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use indexmap::IndexMap;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StatementKind {
    AdHocQuery,
    StoredProcedure,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDefinition {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub title: String,
    pub statement: String,
    pub kind: StatementKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    Text,
    Integer,
    Decimal,
    Boolean,
    DateOnly,
    UniqueId,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterDescriptor {
    pub name: String,
    pub display_name: String,
    pub data_type: DataType,
    pub is_required: bool,
    pub default_value: Option<SqlValue>,
}

/// A loosely-typed value as it arrives from a caller.
#[derive(Debug, Clone, PartialEq)]
pub enum ExternalValue {
    Null,
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Date(NaiveDate),
}

/// A native value ready to be bound to a statement or read back from a row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Text(String),
    Integer(i64),
    Number(f64),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    UniqueId(String),
}

#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub report_id: String,
    pub parameters: HashMap<String, ExternalValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMetadata {
    pub name: String,
    pub data_type: String,
    pub numeric: bool,
}

/// Keys follow the statement's projection order.
pub type ResultRow = IndexMap<String, SqlValue>;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultEnvelope {
    pub columns: Vec<String>,
    pub column_data_types: Vec<ColumnMetadata>,
    pub data: Vec<ResultRow>,
    pub parameters: Vec<ParameterDescriptor>,
    pub total_records: usize,
}

impl DataType {
    pub fn display(&self) -> &'static str {
        match self {
            DataType::Text => "Text",
            DataType::Integer => "Integer",
            DataType::Decimal => "Decimal",
            DataType::Boolean => "Boolean",
            DataType::DateOnly => "DateOnly",
            DataType::UniqueId => "UniqueId",
        }
    }
}

impl ExternalValue {
    /// Unwrap a JSON scalar. Arrays and objects are kept as their JSON text.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => ExternalValue::Null,
            serde_json::Value::Bool(flag) => ExternalValue::Boolean(*flag),
            serde_json::Value::Number(number) => {
                if let Some(int) = number.as_i64() {
                    ExternalValue::Integer(int)
                } else if let Some(float) = number.as_f64() {
                    ExternalValue::Float(float)
                } else {
                    ExternalValue::Text(number.to_string())
                }
            }
            serde_json::Value::String(text) => ExternalValue::Text(text.clone()),
            other => ExternalValue::Text(other.to_string()),
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            ExternalValue::Null => true,
            ExternalValue::Text(text) => text.trim().is_empty(),
            _ => false,
        }
    }
}

impl From<&str> for ExternalValue {
    fn from(value: &str) -> Self {
        ExternalValue::Text(value.to_string())
    }
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }
}

impl ExecutionRequest {
    pub fn new(report_id: &str) -> Self {
        Self {
            report_id: report_id.to_string(),
            parameters: HashMap::new(),
        }
    }

    pub fn with_parameter(mut self, name: &str, value: ExternalValue) -> Self {
        self.parameters.insert(name.to_string(), value);
        self
    }
}
