//! # Catalog
//!
//! The catalog is the registry of schema and constraint metadata: databases,
//! their tables, each table's ordered columns, constraint flags, foreign-key
//! references and index definitions. Every other component consults it before
//! touching the document store.
//!
//! Metadata is held in memory behind a [`RwLock`] and, for on-disk catalogs,
//! written through to a JSON document on every mutation. A mutation is applied to
//! a copy of the metadata, flushed, and only then published, so a failed call
//! leaves the catalog exactly as it was.
//!
//! ```
//! use catalog::{Catalog, Column};
//! use ty::DataTypeKind;
//!
//! let catalog = Catalog::in_memory();
//! catalog.create_database("shop").unwrap();
//! catalog
//!     .create_table(
//!         "shop",
//!         "items",
//!         vec![
//!             Column::new("id", DataTypeKind::Integer).primary_key(),
//!             Column::new("sku", DataTypeKind::Text).unique(),
//!         ],
//!     )
//!     .unwrap();
//!
//! assert!(catalog.is_unique_key("shop", "items", "sku").unwrap());
//! ```

pub mod column;
pub mod schema;

pub use column::*;
pub use schema::*;

use parking_lot::RwLock;
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::{debug, info, trace, warn};

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0} already exists")]
    DuplicateEntity(String),
    #[error("invalid schema: {0}")]
    InvalidSchema(String),
    #[error("foreign key constraint violation: {0}")]
    ForeignKeyConstraintViolation(String),
    #[error("failed to persist metadata: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize metadata: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<SchemaError> for CatalogError {
    fn from(err: SchemaError) -> Self {
        CatalogError::InvalidSchema(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CatalogError>;

/// Read-only view of what physically exists in a document store. The catalog
/// compares its declared metadata against it in [`Catalog::is_metadata_in_sync`].
pub trait PhysicalLayout {
    type Error;

    fn database_names(&self) -> std::result::Result<Vec<String>, Self::Error>;

    fn collection_names(&self, database: &str) -> std::result::Result<Vec<String>, Self::Error>;

    fn index_names(
        &self,
        database: &str,
        collection: &str,
    ) -> std::result::Result<Vec<String>, Self::Error>;
}

/// Name of the auxiliary collection holding a table's aggregate index documents.
pub fn index_collection(table: &str) -> String {
    format!("{}_index", table)
}

/// Name of the auxiliary collection holding a table's pending insert intents.
pub fn intent_collection(table: &str) -> String {
    format!("{}_intent", table)
}

/// Every store collection backing `table`.
pub fn table_collections(table: &str) -> [String; 3] {
    [table.to_string(), index_collection(table), intent_collection(table)]
}

#[derive(Debug)]
pub struct Catalog {
    metadata: RwLock<Metadata>,
    path: Option<PathBuf>,
}

impl Catalog {
    /// A catalog that is never persisted.
    pub fn in_memory() -> Self {
        Self {
            metadata: RwLock::new(Metadata::default()),
            path: None,
        }
    }

    /// Opens the metadata document at `path`, creating an empty one if none exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let metadata = if path.exists() {
            let contents = fs::read_to_string(&path)?;
            let metadata: Metadata = serde_json::from_str(&contents)?;
            info!(
                "Loaded metadata for {} database(s) from {}",
                metadata.databases().len(),
                path.display()
            );
            metadata
        } else {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let metadata = Metadata::default();
            persist(&path, &metadata)?;
            info!("Created empty metadata document at {}", path.display());
            metadata
        };

        Ok(Self {
            metadata: RwLock::new(metadata),
            path: Some(path),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Applies `f` to a copy of the metadata, flushes it and publishes it. Nothing
    /// changes when `f` or the flush fails.
    fn mutate<T>(&self, f: impl FnOnce(&mut Metadata) -> Result<T>) -> Result<T> {
        let mut guard = self.metadata.write();
        let mut next = guard.clone();
        let out = f(&mut next)?;
        if let Some(path) = &self.path {
            persist(path, &next)?;
        }
        *guard = next;
        Ok(out)
    }

    fn read<T>(&self, f: impl FnOnce(&Metadata) -> Result<T>) -> Result<T> {
        let guard = self.metadata.read();
        f(&guard)
    }

    pub fn snapshot(&self) -> Metadata {
        self.metadata.read().clone()
    }

    pub fn create_database(&self, name: &str) -> Result<()> {
        self.mutate(|metadata| {
            if metadata.databases().contains_key(name) {
                return Err(CatalogError::DuplicateEntity(format!("database `{}`", name)));
            }
            metadata
                .databases_mut()
                .insert(name.to_string(), DatabaseSchema::new(name));
            Ok(())
        })?;
        info!("Created database `{}`", name);
        Ok(())
    }

    pub fn drop_database(&self, name: &str) -> Result<()> {
        self.mutate(|metadata| {
            metadata
                .databases_mut()
                .remove(name)
                .map(|_| ())
                .ok_or_else(|| CatalogError::NotFound(format!("database `{}`", name)))
        })?;
        info!("Dropped database `{}`", name);
        Ok(())
    }

    /// Registers a table. Implicit indexes are derived from the column flags.
    pub fn create_table(&self, db: &str, table: &str, columns: Vec<Column>) -> Result<TableSchema> {
        let schema = self.mutate(|metadata| {
            let database = database_mut(metadata, db)?;
            if database.tables().contains_key(table) {
                return Err(CatalogError::DuplicateEntity(format!(
                    "table `{}.{}`",
                    db, table
                )));
            }

            let collections = table_collections(table);
            let overlapping = database.tables().keys().find(|existing| {
                table_collections(existing)
                    .iter()
                    .any(|collection| collections.contains(collection))
            });
            if let Some(existing) = overlapping {
                return Err(CatalogError::DuplicateEntity(format!(
                    "table `{}.{}` (its collections overlap those of `{}`)",
                    db, table, existing
                )));
            }

            let schema = TableSchema::new(table, columns)?;

            for reference in schema.foreign_keys() {
                let target = if reference.target_table() == table {
                    schema.column(reference.target_column())
                } else {
                    database
                        .tables()
                        .get(reference.target_table())
                        .and_then(|target| target.column(reference.target_column()))
                };
                let Some(target) = target else {
                    return Err(CatalogError::InvalidSchema(format!(
                        "foreign key {} targets a missing table or column",
                        reference
                    )));
                };
                let source_type = schema
                    .column(reference.source_column())
                    .map(|column| column.column_type());
                if source_type != Some(target.column_type()) {
                    return Err(CatalogError::InvalidSchema(format!(
                        "foreign key {} joins columns of different types",
                        reference
                    )));
                }
            }

            database
                .tables_mut()
                .insert(table.to_string(), schema.clone());
            Ok(schema)
        })?;

        info!("Created table `{}.{}`", db, table);
        debug!("{}", schema);
        Ok(schema)
    }

    /// Removes a table. Fails if another table still references it.
    pub fn drop_table(&self, db: &str, table: &str) -> Result<()> {
        self.mutate(|metadata| {
            let database = database_mut(metadata, db)?;
            if !database.tables().contains_key(table) {
                return Err(CatalogError::NotFound(format!("table `{}.{}`", db, table)));
            }

            if let Some(reference) = referencing_keys(database, table)
                .into_iter()
                .find(|r| r.source_table() != table)
            {
                return Err(CatalogError::ForeignKeyConstraintViolation(format!(
                    "table `{}` is referenced by {}",
                    table, reference
                )));
            }

            database.tables_mut().remove(table);
            Ok(())
        })?;
        info!("Dropped table `{}.{}`", db, table);
        Ok(())
    }

    pub fn create_index(
        &self,
        db: &str,
        table: &str,
        index_name: &str,
        columns: Vec<String>,
        is_unique: bool,
    ) -> Result<Index> {
        let index = self.mutate(|metadata| {
            let schema = table_mut(metadata, db, table)?;

            if columns.is_empty() {
                return Err(CatalogError::InvalidSchema(format!(
                    "index `{}` declares no columns",
                    index_name
                )));
            }
            for (i, column) in columns.iter().enumerate() {
                if !schema.has_column(column) {
                    return Err(CatalogError::InvalidSchema(format!(
                        "index `{}` names unknown column `{}`",
                        index_name, column
                    )));
                }
                if columns[..i].contains(column) {
                    return Err(CatalogError::InvalidSchema(format!(
                        "index `{}` names column `{}` twice",
                        index_name, column
                    )));
                }
            }
            if schema.index(index_name).is_some() {
                return Err(CatalogError::DuplicateEntity(format!(
                    "index `{}` on `{}.{}`",
                    index_name, db, table
                )));
            }

            let index = Index::new(index_name, columns, is_unique);
            schema.add_index(index.clone())?;
            Ok(index)
        })?;
        info!("Created index {} on `{}.{}`", index, db, table);
        Ok(index)
    }

    pub fn drop_index(&self, db: &str, table: &str, index_name: &str) -> Result<Index> {
        let index = self.mutate(|metadata| {
            table_mut(metadata, db, table)?
                .remove_index(index_name)
                .ok_or_else(|| {
                    CatalogError::NotFound(format!(
                        "index `{}` on `{}.{}`",
                        index_name, db, table
                    ))
                })
        })?;
        info!("Dropped index `{}` on `{}.{}`", index_name, db, table);
        Ok(index)
    }

    /// Re-registers a previously dropped database with all of its tables.
    pub fn restore_database(&self, database: DatabaseSchema) -> Result<()> {
        self.mutate(|metadata| {
            if metadata.databases().contains_key(database.name()) {
                return Err(CatalogError::DuplicateEntity(format!(
                    "database `{}`",
                    database.name()
                )));
            }
            metadata
                .databases_mut()
                .insert(database.name().clone(), database);
            Ok(())
        })
    }

    /// Re-registers a previously dropped table, indexes included.
    pub fn restore_table(&self, db: &str, schema: TableSchema) -> Result<()> {
        self.mutate(|metadata| {
            let database = database_mut(metadata, db)?;
            if database.tables().contains_key(schema.name()) {
                return Err(CatalogError::DuplicateEntity(format!(
                    "table `{}.{}`",
                    db,
                    schema.name()
                )));
            }
            database.tables_mut().insert(schema.name().clone(), schema);
            Ok(())
        })
    }

    pub fn get_database(&self, db: &str) -> Result<DatabaseSchema> {
        self.read(|metadata| database_ref(metadata, db).cloned())
    }

    pub fn database_exists(&self, db: &str) -> bool {
        self.metadata.read().databases().contains_key(db)
    }

    pub fn get_table(&self, db: &str, table: &str) -> Result<TableSchema> {
        self.read(|metadata| table_ref(metadata, db, table).cloned())
    }

    pub fn get_primary_key_column(&self, db: &str, table: &str) -> Result<Column> {
        self.read(|metadata| {
            table_ref(metadata, db, table)?
                .primary_key()
                .cloned()
                .ok_or_else(|| {
                    CatalogError::InvalidSchema(format!("table `{}.{}` has no primary key", db, table))
                })
        })
    }

    pub fn get_indexes(&self, db: &str, table: &str) -> Result<Vec<Index>> {
        self.read(|metadata| Ok(table_ref(metadata, db, table)?.indexes().clone()))
    }

    /// Outgoing references declared on `table`'s columns.
    pub fn get_foreign_key_references(
        &self,
        db: &str,
        table: &str,
    ) -> Result<Vec<ForeignKeyReference>> {
        self.read(|metadata| Ok(table_ref(metadata, db, table)?.foreign_keys()))
    }

    /// Incoming references: every foreign key in `db` whose target is `table`,
    /// including self-references.
    pub fn get_referencing_keys(&self, db: &str, table: &str) -> Result<Vec<ForeignKeyReference>> {
        self.read(|metadata| {
            table_ref(metadata, db, table)?;
            Ok(referencing_keys(database_ref(metadata, db)?, table))
        })
    }

    pub fn is_unique_key(&self, db: &str, table: &str, column: &str) -> Result<bool> {
        self.read(|metadata| {
            table_ref(metadata, db, table)?
                .column(column)
                .map(|c| c.is_unique())
                .ok_or_else(|| {
                    CatalogError::NotFound(format!("column `{}` in `{}.{}`", column, db, table))
                })
        })
    }

    pub fn list_databases(&self) -> Vec<String> {
        self.metadata.read().databases().keys().cloned().collect()
    }

    pub fn list_tables(&self, db: &str) -> Result<Vec<String>> {
        self.read(|metadata| Ok(database_ref(metadata, db)?.tables().keys().cloned().collect()))
    }

    /// Walks every declared database, table and index and checks it exists in the
    /// store. Stops at the first mismatch.
    pub fn is_metadata_in_sync<L: PhysicalLayout + ?Sized>(
        &self,
        layout: &L,
    ) -> std::result::Result<bool, L::Error> {
        let metadata = self.snapshot();
        let databases = layout.database_names()?;

        for (db, database) in metadata.databases() {
            if !databases.contains(db) {
                warn!("Database `{}` is missing from the store", db);
                return Ok(false);
            }

            let collections = layout.collection_names(db)?;
            for (name, table) in database.tables() {
                if !collections.contains(name) || !collections.contains(&index_collection(name)) {
                    warn!("Collections of table `{}.{}` are missing from the store", db, name);
                    return Ok(false);
                }

                let indexes = layout.index_names(db, name)?;
                if let Some(index) = table
                    .indexes()
                    .iter()
                    .find(|index| !indexes.contains(index.name()))
                {
                    warn!(
                        "Index `{}` of table `{}.{}` is missing from the store",
                        index.name(),
                        db,
                        name
                    );
                    return Ok(false);
                }
            }
        }

        trace!("Metadata is in sync with the store");
        Ok(true)
    }
}

/// Writes `metadata` to a sibling temp file and renames it over `path`.
fn persist(path: &Path, metadata: &Metadata) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(serde_json::to_string_pretty(metadata)?.as_bytes())?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    trace!("Persisted metadata to {}", path.display());
    Ok(())
}

fn referencing_keys(database: &DatabaseSchema, table: &str) -> Vec<ForeignKeyReference> {
    database
        .tables()
        .values()
        .flat_map(|schema| schema.foreign_keys())
        .filter(|reference| reference.target_table() == table)
        .collect()
}

fn database_ref<'a>(metadata: &'a Metadata, db: &str) -> Result<&'a DatabaseSchema> {
    metadata
        .databases()
        .get(db)
        .ok_or_else(|| CatalogError::NotFound(format!("database `{}`", db)))
}

fn database_mut<'a>(metadata: &'a mut Metadata, db: &str) -> Result<&'a mut DatabaseSchema> {
    metadata
        .databases_mut()
        .get_mut(db)
        .ok_or_else(|| CatalogError::NotFound(format!("database `{}`", db)))
}

fn table_ref<'a>(metadata: &'a Metadata, db: &str, table: &str) -> Result<&'a TableSchema> {
    database_ref(metadata, db)?
        .tables()
        .get(table)
        .ok_or_else(|| CatalogError::NotFound(format!("table `{}.{}`", db, table)))
}

fn table_mut<'a>(metadata: &'a mut Metadata, db: &str, table: &str) -> Result<&'a mut TableSchema> {
    database_mut(metadata, db)?
        .tables_mut()
        .get_mut(table)
        .ok_or_else(|| CatalogError::NotFound(format!("table `{}.{}`", db, table)))
}
