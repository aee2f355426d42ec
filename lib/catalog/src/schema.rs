use crate::Column;
use getset::{CopyGetters, Getters};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};
use thiserror::Error;
use tracing::trace;
use typed_builder::TypedBuilder;

/// Suffix of the implicit index created for every foreign-key column.
pub const FOREIGN_KEY_INDEX_SUFFIX: &str = "_fk";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("table `{0}` declares no columns")]
    NoColumns(String),
    #[error("table `{0}` declares no primary key")]
    MissingPrimaryKey(String),
    #[error("table `{table}` declares more than one primary key: {columns:?}")]
    MultiplePrimaryKeys { table: String, columns: Vec<String> },
    #[error("column `{column}` is declared more than once in table `{table}`")]
    DuplicateColumn { table: String, column: String },
    #[error("index `{index}` is declared more than once on table `{table}`")]
    DuplicateIndexName { table: String, index: String },
}

/// Named, ordered list of indexed columns.
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
pub struct Index {
    #[getset(get = "pub")]
    #[builder(setter(into))]
    name: String,
    #[getset(get = "pub")]
    columns: Vec<String>,
    #[getset(get_copy = "pub")]
    #[builder(default)]
    is_unique: bool,
}

impl Index {
    pub fn new(name: impl Into<String>, columns: Vec<String>, is_unique: bool) -> Self {
        Self {
            name: name.into(),
            columns,
            is_unique,
        }
    }

    /// True for the implicit index over the table's primary key alone. The document
    /// id already enforces it, so it has no aggregate index document.
    pub fn is_primary_key_index(&self, primary_key: &str) -> bool {
        self.columns.len() == 1 && self.columns[0] == primary_key
    }
}

impl fmt::Display for Index {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_unique {
            write!(f, "UNIQUE ")?;
        }
        write!(f, "{} ({})", self.name, self.columns.join(", "))
    }
}

/// A foreign key seen from both ends: `source_table.source_column` references
/// `target_table.target_column`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Getters)]
#[getset(get = "pub")]
pub struct ForeignKeyReference {
    source_table: String,
    source_column: String,
    target_table: String,
    target_column: String,
}

impl ForeignKeyReference {
    pub fn new(
        source_table: impl Into<String>,
        source_column: impl Into<String>,
        target_table: impl Into<String>,
        target_column: impl Into<String>,
    ) -> Self {
        Self {
            source_table: source_table.into(),
            source_column: source_column.into(),
            target_table: target_table.into(),
            target_column: target_column.into(),
        }
    }
}

impl fmt::Display for ForeignKeyReference {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}.{} -> {}.{}",
            self.source_table, self.source_column, self.target_table, self.target_column
        )
    }
}

/// [`TableSchema`] is the catalog entry of a table: its ordered column
/// definitions and the indexes declared on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
#[getset(get = "pub")]
pub struct TableSchema {
    name: String,
    columns: Vec<Column>,
    indexes: Vec<Index>,
}

impl TableSchema {
    /// Validates the column list and derives the implicit indexes: one unique index
    /// per primary/unique column named after the column, and one `<column>_fk`
    /// index per foreign-key column.
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Result<Self, SchemaError> {
        let name = name.into();

        if columns.is_empty() {
            return Err(SchemaError::NoColumns(name));
        }

        for (i, column) in columns.iter().enumerate() {
            if columns[..i]
                .iter()
                .any(|c| c.column_name() == column.column_name())
            {
                return Err(SchemaError::DuplicateColumn {
                    table: name,
                    column: column.column_name().clone(),
                });
            }
        }

        let primary_keys: Vec<String> = columns
            .iter()
            .filter(|c| c.is_primary_key())
            .map(|c| c.column_name().clone())
            .collect();
        match primary_keys.len() {
            0 => return Err(SchemaError::MissingPrimaryKey(name)),
            1 => {}
            _ => {
                return Err(SchemaError::MultiplePrimaryKeys {
                    table: name,
                    columns: primary_keys,
                })
            }
        }

        let mut schema = Self {
            name,
            columns,
            indexes: Vec::new(),
        };

        let mut implicit = Vec::new();
        for column in &schema.columns {
            if column.is_unique() {
                implicit.push(Index::new(
                    column.column_name().clone(),
                    vec![column.column_name().clone()],
                    true,
                ));
            }
        }
        for column in &schema.columns {
            if column.foreign_key().is_some() {
                implicit.push(Index::new(
                    format!("{}{}", column.column_name(), FOREIGN_KEY_INDEX_SUFFIX),
                    vec![column.column_name().clone()],
                    false,
                ));
            }
        }

        for index in implicit {
            schema.add_index(index)?;
        }

        trace!(
            "Schema for table `{}` created with {} columns and {} indexes",
            schema.name,
            schema.columns.len(),
            schema.indexes.len()
        );
        Ok(schema)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.column_name() == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.column_name().clone()).collect()
    }

    /// The primary-key column. Always present for schemas built by [`TableSchema::new`].
    pub fn primary_key(&self) -> Option<&Column> {
        self.columns.iter().find(|c| c.is_primary_key())
    }

    pub fn index(&self, name: &str) -> Option<&Index> {
        self.indexes.iter().find(|index| index.name() == name)
    }

    /// Outgoing foreign keys declared on this table's columns.
    pub fn foreign_keys(&self) -> Vec<ForeignKeyReference> {
        self.columns
            .iter()
            .filter_map(|column| {
                column.foreign_key().as_ref().map(|fk| {
                    ForeignKeyReference::new(
                        self.name.clone(),
                        column.column_name().clone(),
                        fk.table().clone(),
                        fk.column().clone(),
                    )
                })
            })
            .collect()
    }

    pub(crate) fn add_index(&mut self, index: Index) -> Result<(), SchemaError> {
        if self.index(index.name()).is_some() {
            return Err(SchemaError::DuplicateIndexName {
                table: self.name.clone(),
                index: index.name().clone(),
            });
        }
        self.indexes.push(index);
        Ok(())
    }

    pub(crate) fn remove_index(&mut self, name: &str) -> Option<Index> {
        let position = self.indexes.iter().position(|index| index.name() == name)?;
        Some(self.indexes.remove(position))
    }
}

impl fmt::Display for TableSchema {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let columns: Vec<String> = self.columns.iter().map(|c| c.to_string()).collect();
        write!(f, "{} ({})", self.name, columns.join(", "))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Getters)]
#[getset(get = "pub")]
pub struct DatabaseSchema {
    name: String,
    tables: BTreeMap<String, TableSchema>,
}

impl DatabaseSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: BTreeMap::new(),
        }
    }

    pub(crate) fn tables_mut(&mut self) -> &mut BTreeMap<String, TableSchema> {
        &mut self.tables
    }
}

/// Root of the persisted metadata document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Getters)]
#[getset(get = "pub")]
pub struct Metadata {
    databases: BTreeMap<String, DatabaseSchema>,
}

impl Metadata {
    pub(crate) fn databases_mut(&mut self) -> &mut BTreeMap<String, DatabaseSchema> {
        &mut self.databases
    }
}
