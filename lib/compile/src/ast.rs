//! Statement descriptors.
//!
//! A [`Statement`] is the structured form of one client request. The dispatcher
//! consumes these directly; the SQL parser is only one way of producing them.

use catalog::Column;
use serde::{Deserialize, Serialize};
use std::fmt;
use ty::{Condition, Row, Value};

/// A `database.table` reference.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TableName {
    pub database: String,
    pub table: String,
}

impl TableName {
    pub fn new(database: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            table: table.into(),
        }
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.table)
    }
}

/// `left_table.left_column = right_table.right_column`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinClause {
    pub left_table: String,
    pub left_column: String,
    pub right_table: String,
    pub right_column: String,
}

impl JoinClause {
    pub fn new(
        left_table: impl Into<String>,
        left_column: impl Into<String>,
        right_table: impl Into<String>,
        right_column: impl Into<String>,
    ) -> Self {
        Self {
            left_table: left_table.into(),
            left_column: left_column.into(),
            right_table: right_table.into(),
            right_column: right_column.into(),
        }
    }

    /// The same clause with its sides exchanged.
    pub fn reversed(&self) -> Self {
        Self::new(
            self.right_table.clone(),
            self.right_column.clone(),
            self.left_table.clone(),
            self.left_column.clone(),
        )
    }
}

impl fmt::Display for JoinClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{} = {}.{}",
            self.left_table, self.left_column, self.right_table, self.right_column
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Projection {
    All,
    Columns(Vec<String>),
}

impl Projection {
    pub fn columns(&self) -> &[String] {
        match self {
            Projection::All => &[],
            Projection::Columns(columns) => columns,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub column: String,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Statement {
    CreateDatabase {
        name: String,
    },
    DropDatabase {
        name: String,
    },
    CreateTable {
        name: TableName,
        columns: Vec<Column>,
    },
    DropTable {
        name: TableName,
    },
    CreateIndex {
        table: TableName,
        name: String,
        columns: Vec<String>,
        unique: bool,
    },
    DropIndex {
        table: TableName,
        name: String,
    },
    Insert {
        table: TableName,
        row: Row,
    },
    Delete {
        table: TableName,
        conditions: Vec<Condition>,
    },
    Update {
        table: TableName,
        assignments: Vec<Assignment>,
        conditions: Vec<Condition>,
    },
    Select {
        table: TableName,
        projection: Projection,
        joins: Vec<JoinClause>,
        conditions: Vec<Condition>,
    },
    ShowDatabases,
    ShowTables {
        database: String,
    },
}

impl Statement {
    /// Short, stable name of the statement kind, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Statement::CreateDatabase { .. } => "CREATE DATABASE",
            Statement::DropDatabase { .. } => "DROP DATABASE",
            Statement::CreateTable { .. } => "CREATE TABLE",
            Statement::DropTable { .. } => "DROP TABLE",
            Statement::CreateIndex { .. } => "CREATE INDEX",
            Statement::DropIndex { .. } => "DROP INDEX",
            Statement::Insert { .. } => "INSERT",
            Statement::Delete { .. } => "DELETE",
            Statement::Update { .. } => "UPDATE",
            Statement::Select { .. } => "SELECT",
            Statement::ShowDatabases => "SHOW DATABASES",
            Statement::ShowTables { .. } => "SHOW TABLES",
        }
    }

    pub fn is_read_only(&self) -> bool {
        matches!(
            self,
            Statement::Select { .. } | Statement::ShowDatabases | Statement::ShowTables { .. }
        )
    }
}
