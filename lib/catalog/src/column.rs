//! # Column Representation
//!
//! This module provides a representation of a column in a table schema: its name,
//! declared type and constraint flags (primary key, unique, foreign-key reference).
//!
//! ## Usage
//!
//! ```
//! use catalog::Column;
//! use ty::DataTypeKind;
//!
//! let id = Column::new("id", DataTypeKind::Integer).primary_key();
//! let owner = Column::new("owner", DataTypeKind::Integer).references("users", "id");
//!
//! assert!(id.is_unique());
//! assert_eq!(owner.foreign_key().as_ref().unwrap().table(), "users");
//! ```

use getset::{CopyGetters, Getters};
use serde::{Deserialize, Serialize};
use std::fmt;
use ty::DataTypeKind;
use typed_builder::TypedBuilder;

/// The target side of a foreign key declared on a column.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Getters,
)]
#[getset(get = "pub")]
pub struct ForeignKeyRef {
    table: String,
    column: String,
}

impl ForeignKeyRef {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }
}

impl fmt::Display for ForeignKeyRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}({})", self.table, self.column)
    }
}

/// Represents a column in a table.
///
/// ```ignore
/// +--------------+--------------+-------------+-----------+----------------+
/// | column_name  | column_type  | primary_key | unique    | foreign_key    |
/// +--------------+--------------+-------------+-----------+----------------+
/// | id           | INTEGER      | true        | (implied) |                |
/// | email        | TEXT         | false       | true      |                |
/// | team_id      | INTEGER      | false       | false     | teams(id)      |
/// +--------------+--------------+-------------+-----------+----------------+
/// ```
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    TypedBuilder,
    Getters,
    CopyGetters,
)]
pub struct Column {
    #[getset(get = "pub")]
    #[builder(setter(into))]
    column_name: String,
    #[getset(get_copy = "pub")]
    column_type: DataTypeKind,
    #[getset(get_copy = "pub")]
    #[builder(default)]
    is_primary_key: bool,
    #[builder(default)]
    is_unique: bool,
    #[getset(get = "pub")]
    #[builder(default)]
    foreign_key: Option<ForeignKeyRef>,
}

impl Column {
    pub fn new(column_name: impl Into<String>, column_type: DataTypeKind) -> Self {
        Column::builder()
            .column_name(column_name)
            .column_type(column_type)
            .build()
    }

    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.is_unique = true;
        self
    }

    pub fn references(mut self, table: impl Into<String>, column: impl Into<String>) -> Self {
        self.foreign_key = Some(ForeignKeyRef::new(table, column));
        self
    }

    /// A primary key column is implicitly unique.
    pub fn is_unique(&self) -> bool {
        self.is_unique || self.is_primary_key
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}", self.column_name, self.column_type)?;
        if self.is_primary_key {
            write!(f, " PRIMARY KEY")?;
        } else if self.is_unique {
            write!(f, " UNIQUE")?;
        }
        if let Some(reference) = &self.foreign_key {
            write!(f, " REFERENCES {}", reference)?;
        }
        Ok(())
    }
}
