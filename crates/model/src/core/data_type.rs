use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical column type shared by the source decoder and the table writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Int,
    Float,
    Boolean,
    String,
    Json,
    Timestamp,
    Null,
}

impl DataType {
    /// Smallest type able to hold values of both `self` and `other`.
    pub fn widen(self, other: DataType) -> DataType {
        use DataType::*;
        match (self, other) {
            (a, b) if a == b => a,
            (Null, t) | (t, Null) => t,
            (Int, Float) | (Float, Int) => Float,
            _ => String,
        }
    }

    /// Whether values of `incoming` can be stored in a column of this type
    /// without losing information.
    pub fn accepts(self, incoming: DataType) -> bool {
        use DataType::*;
        match (self, incoming) {
            (a, b) if a == b => true,
            (_, Null) => true,
            (String, _) => true,
            (Float, Int) => true,
            (Json, String) => true,
            _ => false,
        }
    }

    /// Type name as written into table metadata.
    pub fn table_type_name(&self) -> &'static str {
        match self {
            DataType::Int => "long",
            DataType::Float => "double",
            DataType::Boolean => "boolean",
            DataType::Timestamp => "timestamptz",
            DataType::String | DataType::Json | DataType::Null => "string",
        }
    }

    pub fn from_table_type_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "int" | "long" => Some(DataType::Int),
            "float" | "double" => Some(DataType::Float),
            "boolean" => Some(DataType::Boolean),
            "string" => Some(DataType::String),
            "timestamp" | "timestamptz" => Some(DataType::Timestamp),
            _ => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Int => "INT",
            DataType::Float => "FLOAT",
            DataType::Boolean => "BOOLEAN",
            DataType::String => "STRING",
            DataType::Json => "JSON",
            DataType::Timestamp => "TIMESTAMP",
            DataType::Null => "NULL",
        };
        f.write_str(name)
    }
}
