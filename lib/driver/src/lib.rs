//! # Driver
//!
//! The statement dispatcher. A [`Driver`] owns the record manager and query
//! executor for one catalog and one document store, and runs [`Statement`]s
//! against them. It is shared by reference ([`DriverRef`]) between the shell and
//! every server connection.

mod error;
pub mod shell;

pub use error::DriverError;

use catalog::Catalog;
use common::DbConfig;
use compile::{parse_statement, Projection, Statement};
use execution::{project, QueryError, QueryExecutor, ResultSet};
use getset::Getters;
use std::{fmt, sync::Arc};
use storage::{DocumentStore, FileStore, MemoryStore, RecordManager};
use tracing::{debug, info, instrument, warn};
use ty::{Row, Value};

pub type DriverRef = Arc<Driver>;

pub type Result<T, E = DriverError> = std::result::Result<T, E>;

/// What a successful statement returns to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionResult {
    Message(String),
    Rows(ResultSet),
    /// A `*` projection over an empty result: there are no columns to print.
    NoRows,
}

impl fmt::Display for ExecutionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionResult::Message(message) => write!(f, "{}", message),
            ExecutionResult::Rows(rows) => {
                write!(f, "{}", rows)?;
                match rows.len() {
                    1 => write!(f, "(1 row)"),
                    n => write!(f, "({} rows)", n),
                }
            }
            ExecutionResult::NoRows => write!(f, "(0 rows)"),
        }
    }
}

#[derive(Debug, Getters)]
#[getset(get = "pub")]
pub struct Driver {
    records: Arc<RecordManager>,
    executor: QueryExecutor,
}

impl Driver {
    /// Builds a driver over `catalog` and `store`, replaying any write intents
    /// left behind by an interrupted process.
    pub fn new(catalog: Arc<Catalog>, store: Arc<dyn DocumentStore>) -> Result<Self> {
        let records = Arc::new(RecordManager::new(catalog, store));

        if !records.is_metadata_in_sync()? {
            warn!("Catalog and document store disagree on the physical layout");
        }
        let repaired = records.recover_all()?;
        if repaired > 0 {
            info!("Recovered {} interrupted write(s)", repaired);
        }

        Ok(Self {
            executor: QueryExecutor::new(Arc::clone(&records)),
            records,
        })
    }

    /// A driver whose catalog and documents live only in memory.
    pub fn in_memory() -> Result<Self> {
        Self::new(Arc::new(Catalog::in_memory()), Arc::new(MemoryStore::new()))
    }

    /// Opens the metadata document and store snapshot under the configured data
    /// directory, creating both on first run.
    #[instrument(skip(config), fields(data_dir = %config.data_dir().display()))]
    pub fn open(config: &DbConfig) -> Result<Self> {
        if *config.in_memory() {
            return Self::in_memory();
        }

        std::fs::create_dir_all(config.data_dir())?;
        let catalog = Catalog::open(config.metadata_path())?;
        let store = FileStore::open(config.store_path())?;
        info!("Opened data directory");
        Self::new(Arc::new(catalog), Arc::new(store))
    }

    /// Parses `sql` and executes the statement.
    pub fn execute_sql(&self, sql: &str) -> Result<ExecutionResult> {
        let statement = parse_statement(sql)?;
        self.execute(statement)
    }

    #[instrument(skip(self, statement), fields(kind = statement.kind()))]
    pub fn execute(&self, statement: Statement) -> Result<ExecutionResult> {
        let catalog = self.records.catalog();
        let result = match statement {
            Statement::CreateDatabase { name } => {
                self.records.create_database(&name)?;
                ExecutionResult::Message(format!("Database `{}` created", name))
            }
            Statement::DropDatabase { name } => {
                self.records.drop_database(&name)?;
                ExecutionResult::Message(format!("Database `{}` dropped", name))
            }
            Statement::CreateTable { name, columns } => {
                self.records
                    .create_table(&name.database, &name.table, columns)?;
                ExecutionResult::Message(format!("Table `{}` created", name))
            }
            Statement::DropTable { name } => {
                self.records.drop_table(&name.database, &name.table)?;
                ExecutionResult::Message(format!("Table `{}` dropped", name))
            }
            Statement::CreateIndex {
                table,
                name,
                columns,
                unique,
            } => {
                // An index over a single unique column inherits its uniqueness.
                let unique = unique
                    || match columns.as_slice() {
                        [column] => catalog.is_unique_key(&table.database, &table.table, column)?,
                        _ => false,
                    };
                self.records
                    .create_index(&table.database, &table.table, &name, columns, unique)?;
                ExecutionResult::Message(format!("Index `{}` created on `{}`", name, table))
            }
            Statement::DropIndex { table, name } => {
                self.records
                    .drop_index(&table.database, &table.table, &name)?;
                ExecutionResult::Message(format!("Index `{}` dropped from `{}`", name, table))
            }
            Statement::Insert { table, row } => {
                self.records.insert(&table.database, &table.table, row)?;
                ExecutionResult::Message("1 row inserted".to_string())
            }
            Statement::Delete { table, conditions } => {
                let deleted = self
                    .records
                    .delete(&table.database, &table.table, &conditions)?;
                ExecutionResult::Message(format!("{} row(s) deleted", deleted))
            }
            Statement::Update {
                table,
                assignments,
                conditions,
            } => {
                let updated =
                    self.executor
                        .update(&table.database, &table.table, &assignments, &conditions)?;
                ExecutionResult::Message(format!("{} row(s) updated", updated))
            }
            Statement::Select {
                table,
                projection,
                joins,
                conditions,
            } => match self.executor.query(
                &table.database,
                &table.table,
                &projection,
                &joins,
                &conditions,
            ) {
                Ok(rows) => ExecutionResult::Rows(rows),
                Err(QueryError::UndefinedProjection) => ExecutionResult::NoRows,
                Err(err) => return Err(err.into()),
            },
            Statement::ShowDatabases => listing("database", catalog.list_databases())?,
            Statement::ShowTables { database } => listing("table", catalog.list_tables(&database)?)?,
        };
        debug!("Statement succeeded");
        Ok(result)
    }
}

/// One-column result set of `names`.
fn listing(column: &str, names: Vec<String>) -> Result<ExecutionResult> {
    let rows: Vec<Row> = names
        .into_iter()
        .map(|name| {
            let mut row = Row::with_capacity(1);
            row.insert(column, Value::Text(name));
            row
        })
        .collect();
    let rows = project(&rows, &Projection::Columns(vec![column.to_string()]))?;
    Ok(ExecutionResult::Rows(rows))
}
