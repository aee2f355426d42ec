//! # Type System
//!
//! Declared column types ([`DataTypeKind`]), the scalar [`Value`]s stored in rows,
//! ordered [`Row`] mappings and the filter [`Condition`]s evaluated against them.
//!
//! Example Usage:
//!
//! ```
//! use ty::{DataTypeKind, Value};
//!
//! let kind: DataTypeKind = "varchar(32)".parse().unwrap();
//! assert_eq!(kind, DataTypeKind::Text);
//!
//! let value = Value::parse_as("42", &DataTypeKind::Integer).unwrap();
//! assert_eq!(value, Value::Integer(42));
//! ```
//!
//! ## Coercion
//!
//! Literals arriving from statements are coerced to the declared type of the column
//! they target. Integers widen to floats, text is parsed, and `NULL` stays `NULL`.

pub mod predicate;
pub mod row;
pub mod value;

pub use predicate::*;
pub use row::*;
pub use value::*;

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum TypeError {
    #[error("expected type {expected}, but found {found}")]
    IncompatibleType { expected: String, found: String },
    #[error("cannot cast `{value}` to {to}")]
    InvalidCast { value: String, to: String },
    #[error("unknown data type `{0}`")]
    UnknownType(String),
    #[error("unknown operator `{0}`")]
    UnknownOperator(String),
}

/// Declared type of a column.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DataTypeKind {
    #[default]
    Integer,
    Float,
    Boolean,
    Text,
}

impl DataTypeKind {
    pub fn name(&self) -> &'static str {
        match self {
            DataTypeKind::Integer => "INTEGER",
            DataTypeKind::Float => "FLOAT",
            DataTypeKind::Boolean => "BOOLEAN",
            DataTypeKind::Text => "TEXT",
        }
    }
}

impl FromStr for DataTypeKind {
    type Err = TypeError;

    /// Accepts the common SQL spellings; a length suffix such as `varchar(255)` is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let base = s.split('(').next().unwrap_or_default().trim();

        match base.to_ascii_lowercase().as_str() {
            "int" | "integer" | "smallint" | "bigint" => Ok(DataTypeKind::Integer),
            "float" | "real" | "double" | "decimal" | "numeric" => Ok(DataTypeKind::Float),
            "bool" | "boolean" => Ok(DataTypeKind::Boolean),
            "text" | "varchar" | "char" | "string" => Ok(DataTypeKind::Text),
            _ => Err(TypeError::UnknownType(s.to_string())),
        }
    }
}

impl fmt::Display for DataTypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
