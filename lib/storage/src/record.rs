//! # Record Manager
//!
//! Constraint-enforcing CRUD on top of a [`DocumentStore`]. The store only knows
//! documents; this layer adds the relational rules:
//!
//! - every row carries one value per declared column, coerced to its type;
//! - the primary key is the document id, so a collision is a duplicate;
//! - unique indexes are checked by exact tuple membership in the table's
//!   aggregate index documents;
//! - foreign keys are checked on insert (the referenced row must exist) and on
//!   delete (no row may still reference a deleted one).
//!
//! ## Write protocol
//!
//! An insert writes an intent record to `<table>_intent`, then the row, then every
//! index document, and finally removes the intent. A delete records one intent
//! per row before removing rows and pruning index entries. If the process stops
//! in between, [`RecordManager::recover`] finishes the index work from the
//! intents left behind.
//!
//! ## Locking
//!
//! Public operations lock the tables they touch through [`TableLocks`]. Methods
//! taking a `&LockSet` expect the caller to already hold the right locks; they let
//! the query executor compose several operations under one set of locks.

use crate::{
    codec::{self, CodecError, IndexEntries, Intent, IntentKind},
    document::{Document, DocumentStore, StoreError},
    lock::{LockSet, TableLocks},
};
use catalog::{
    index_collection, intent_collection, table_collections, Catalog, CatalogError, Column,
    ForeignKeyReference, Index, TableSchema,
};
use common::traits::encode::{Decodable, Encodable, EncodingError};
use std::{collections::BTreeSet, sync::Arc};
use thiserror::Error;
use tracing::{debug, error, info, instrument, trace, warn};
use ty::{matches_all, Condition, Row, Value};

#[derive(Error, Debug)]
pub enum RecordError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0} already exists")]
    DuplicateEntity(String),
    #[error("invalid schema: {0}")]
    InvalidSchema(String),
    #[error("unique constraint violation: {0}")]
    UniqueConstraintViolation(String),
    #[error("foreign key constraint violation: {0}")]
    ForeignKeyConstraintViolation(String),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl From<EncodingError> for RecordError {
    fn from(err: EncodingError) -> Self {
        RecordError::Codec(err.into())
    }
}

pub type Result<T> = std::result::Result<T, RecordError>;

pub struct RecordManager {
    catalog: Arc<Catalog>,
    store: Arc<dyn DocumentStore>,
    locks: TableLocks,
}

impl std::fmt::Debug for RecordManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordManager")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl RecordManager {
    pub fn new(catalog: Arc<Catalog>, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            catalog,
            store,
            locks: TableLocks::new(),
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn locks(&self) -> &TableLocks {
        &self.locks
    }

    /// Whether the catalog's declared layout exists physically in the store.
    pub fn is_metadata_in_sync(&self) -> Result<bool> {
        Ok(self.catalog.is_metadata_in_sync(self.store.as_ref())?)
    }

    // ----- databases ---------------------------------------------------------

    #[instrument(skip(self))]
    pub fn create_database(&self, db: &str) -> Result<()> {
        self.catalog.create_database(db)?;
        if let Err(err) = self.store.create_database(db) {
            error!("Failed to create database `{}` in the store: {}", db, err);
            self.catalog.drop_database(db)?;
            return Err(err.into());
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn drop_database(&self, db: &str) -> Result<()> {
        let database = self.catalog.get_database(db)?;
        let tables: Vec<&String> = database.tables().keys().collect();
        let _locks = self.locks.acquire(db, tables, std::iter::empty::<&str>());

        self.catalog.drop_database(db)?;
        if let Err(err) = self.store.drop_database(db) {
            error!("Failed to drop database `{}` from the store: {}", db, err);
            self.catalog.restore_database(database.clone())?;
            return Err(err.into());
        }
        Ok(())
    }

    // ----- tables ------------------------------------------------------------

    /// Registers the table and creates its row, `_index` and `_intent`
    /// collections together with every implicit index.
    #[instrument(skip(self, columns))]
    pub fn create_table(&self, db: &str, table: &str, columns: Vec<Column>) -> Result<TableSchema> {
        let _locks = self.locks.write(db, table);
        let schema = self.catalog.create_table(db, table, columns)?;

        let mut created = Vec::with_capacity(3);
        if let Err(err) = self.materialize_table(db, &schema, &mut created) {
            error!("Failed to create table `{}.{}` in the store: {}", db, table, err);
            self.discard_collections(db, &created);
            self.catalog.drop_table(db, table)?;
            return Err(err);
        }
        Ok(schema)
    }

    /// Creates the table's collections, recording each one in `created` as it
    /// succeeds.
    fn materialize_table(
        &self,
        db: &str,
        schema: &TableSchema,
        created: &mut Vec<String>,
    ) -> Result<()> {
        for collection in table_collections(schema.name()) {
            self.store.create_collection(db, &collection)?;
            created.push(collection);
        }

        let rows = Vec::new();
        for index in schema.indexes() {
            self.materialize_index(db, schema, index, &rows)?;
        }
        Ok(())
    }

    fn discard_collections(&self, db: &str, collections: &[String]) {
        for collection in collections {
            if let Err(err) = self.store.drop_collection(db, collection) {
                trace!("Skipping `{}.{}`: {}", db, collection, err);
            }
        }
    }

    #[instrument(skip(self))]
    pub fn drop_table(&self, db: &str, table: &str) -> Result<()> {
        let _locks = self.locks.write(db, table);
        let schema = self.catalog.get_table(db, table)?;

        self.catalog.drop_table(db, table)?;
        for collection in table_collections(table) {
            if let Err(err) = self.store.drop_collection(db, &collection) {
                error!("Failed to drop `{}.{}`: {}", db, collection, err);
                self.catalog.restore_table(db, schema)?;
                return Err(err.into());
            }
        }
        Ok(())
    }

    // ----- indexes -----------------------------------------------------------

    /// Registers the index and builds its aggregate document from the rows already
    /// stored. A unique index over duplicate data is rejected and changes nothing.
    #[instrument(skip(self))]
    pub fn create_index(
        &self,
        db: &str,
        table: &str,
        index_name: &str,
        columns: Vec<String>,
        is_unique: bool,
    ) -> Result<Index> {
        let locks = self.locks.write(db, table);
        let index = self
            .catalog
            .create_index(db, table, index_name, columns, is_unique)?;

        let built = self
            .catalog
            .get_table(db, table)
            .map_err(RecordError::from)
            .and_then(|schema| {
                let rows = self.read_rows(&locks, db, table)?;
                self.materialize_index(db, &schema, &index, &rows)
            });

        if let Err(err) = built {
            warn!("Rolling back index `{}` on `{}.{}`: {}", index_name, db, table, err);
            if let Err(err) = self.store.drop_index(db, table, index_name) {
                trace!("Index `{}` was never registered: {}", index_name, err);
            }
            self.catalog.drop_index(db, table, index_name)?;
            return Err(err);
        }
        Ok(index)
    }

    fn materialize_index(
        &self,
        db: &str,
        schema: &TableSchema,
        index: &Index,
        rows: &[Row],
    ) -> Result<()> {
        let primary_key = primary_key_name(schema)?;

        let mut entries = IndexEntries::new();
        if !index.is_primary_key_index(primary_key) {
            for row in rows {
                let tuple = codec::encode_tuple(row, index.columns());
                let id = row_id(schema, row)?;
                if index.is_unique()
                    && !codec::tuple_has_null(row, index.columns())
                    && entries.contains_tuple(&tuple)
                {
                    return Err(RecordError::UniqueConstraintViolation(format!(
                        "existing rows of `{}` hold duplicate values for unique index `{}`",
                        schema.name(),
                        index.name()
                    )));
                }
                entries.insert(tuple, id);
            }
        }

        self.store
            .create_index(db, schema.name(), index.name(), index.columns())?;
        if !index.is_primary_key_index(primary_key) {
            self.store.replace_one(
                db,
                &index_collection(schema.name()),
                Document::new(index.name().clone(), entries.encode()?),
            )?;
        }
        debug!(
            "Materialized index `{}` on `{}.{}` with {} tuple(s)",
            index.name(),
            db,
            schema.name(),
            entries.len()
        );
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn drop_index(&self, db: &str, table: &str, index_name: &str) -> Result<Index> {
        let _locks = self.locks.write(db, table);
        let index = self.catalog.drop_index(db, table, index_name)?;

        let dropped = self
            .store
            .drop_index(db, table, index_name)
            .and_then(|_| {
                self.store
                    .delete_one(db, &index_collection(table), index_name)
                    .map(|_| ())
            });
        if let Err(err) = dropped {
            error!("Failed to drop index `{}` from the store: {}", index_name, err);
            self.catalog.create_index(
                db,
                table,
                index.name(),
                index.columns().clone(),
                index.is_unique(),
            )?;
            return Err(err.into());
        }
        Ok(index)
    }

    // ----- reads -------------------------------------------------------------

    /// Every row of `table`, decoded, under a shared lock.
    pub fn scan_rows(&self, db: &str, table: &str) -> Result<Vec<Row>> {
        let locks = self.locks.read(db, table);
        self.read_rows(&locks, db, table)
    }

    /// Every row of `table`, decoded. The caller holds a lock on `table`.
    pub fn read_rows(&self, _locks: &LockSet, db: &str, table: &str) -> Result<Vec<Row>> {
        let schema = self.catalog.get_table(db, table)?;
        self.store
            .find_all(db, table)?
            .iter()
            .map(|document| codec::decode_row(&schema, document).map_err(RecordError::from))
            .collect()
    }

    /// Looks up a row by primary key value.
    pub fn find_by_key(&self, db: &str, table: &str, key: &Value) -> Result<Option<Row>> {
        let schema = self.catalog.get_table(db, table)?;
        let _locks = self.locks.read(db, table);
        let Some(id) = coerce_key(&schema, key) else {
            return Ok(None);
        };
        self.store
            .find_one(db, table, &id)?
            .map(|document| codec::decode_row(&schema, &document).map_err(RecordError::from))
            .transpose()
    }

    // ----- insert ------------------------------------------------------------

    /// Tables an insert into `table` reads: the targets of its foreign keys.
    pub fn insert_read_set(&self, db: &str, table: &str) -> Result<Vec<String>> {
        Ok(self
            .catalog
            .get_foreign_key_references(db, table)?
            .into_iter()
            .map(|reference| reference.target_table().clone())
            .collect())
    }

    #[instrument(skip(self, row))]
    pub fn insert(&self, db: &str, table: &str, row: Row) -> Result<()> {
        let reads = self.insert_read_set(db, table)?;
        let locks = self.locks.acquire(db, [table], reads);
        self.insert_row(&locks, db, table, row)
    }

    /// Inserts one row. The caller holds an exclusive lock on `table` and shared
    /// locks on the tables its foreign keys reference.
    pub fn insert_row(&self, locks: &LockSet, db: &str, table: &str, row: Row) -> Result<()> {
        let schema = self.catalog.get_table(db, table)?;
        let row = conform(&schema, row)?;
        let document = codec::encode_row(&schema, &row)?;
        let id = document.id().clone();

        if self.store.find_one(db, table, &id)?.is_some() {
            return Err(RecordError::DuplicateEntity(format!(
                "row with primary key `{}` in `{}.{}`",
                id, db, table
            )));
        }

        let primary_key = primary_key_name(&schema)?;
        let index_coll = index_collection(table);
        let mut pending = Vec::new();
        for index in schema.indexes() {
            if index.is_primary_key_index(primary_key) {
                continue;
            }
            let tuple = codec::encode_tuple(&row, index.columns());
            let entries = self.load_entries(db, &index_coll, index.name())?;
            if index.is_unique()
                && !codec::tuple_has_null(&row, index.columns())
                && entries.contains_tuple(&tuple)
            {
                return Err(RecordError::UniqueConstraintViolation(format!(
                    "duplicate value for ({}) in `{}.{}`",
                    index.columns().join(", "),
                    db,
                    table
                )));
            }
            pending.push((index.name().clone(), tuple, entries));
        }

        self.check_references_exist(locks, db, &schema, &row)?;

        let intent = Intent::insert(&document).to_document()?;
        let intent_id = intent.id().clone();
        self.store
            .replace_one(db, &intent_collection(table), intent)?;

        self.store.insert_one(db, table, document).map_err(|err| match err {
            StoreError::DocumentExists { id, .. } => RecordError::DuplicateEntity(format!(
                "row with primary key `{}` in `{}.{}`",
                id, db, table
            )),
            other => other.into(),
        })?;

        for (name, tuple, mut entries) in pending {
            entries.insert(tuple, id.clone());
            self.store
                .replace_one(db, &index_coll, Document::new(name.clone(), entries.encode()?))
                .map_err(|err| {
                    error!(
                        "Index `{}` of `{}.{}` not updated for row `{}`; intent kept: {}",
                        name, db, table, id, err
                    );
                    err
                })?;
        }

        self.store
            .delete_one(db, &intent_collection(table), &intent_id)?;
        trace!("Inserted row `{}` into `{}.{}`", id, db, table);
        Ok(())
    }

    fn check_references_exist(
        &self,
        locks: &LockSet,
        db: &str,
        schema: &TableSchema,
        row: &Row,
    ) -> Result<()> {
        for reference in schema.foreign_keys() {
            let value = row.get(reference.source_column()).unwrap_or(&Value::Null);
            if value.is_null() {
                continue;
            }

            // A row may reference itself.
            if reference.target_table() == schema.name()
                && row.get(reference.target_column()) == Some(value)
            {
                continue;
            }

            let target = self.catalog.get_table(db, reference.target_table())?;
            let exists = if primary_key_name(&target)? == reference.target_column() {
                match coerce_key(&target, value) {
                    Some(id) => self.store.find_one(db, target.name(), &id)?.is_some(),
                    None => false,
                }
            } else {
                self.read_rows(locks, db, target.name())?
                    .iter()
                    .any(|candidate| candidate.get(reference.target_column()) == Some(value))
            };

            if !exists {
                return Err(RecordError::ForeignKeyConstraintViolation(format!(
                    "{} has no row with value {}",
                    reference, value
                )));
            }
        }
        Ok(())
    }

    // ----- delete ------------------------------------------------------------

    /// Tables a delete from `table` reads: the tables referencing it.
    pub fn delete_read_set(&self, db: &str, table: &str) -> Result<Vec<String>> {
        Ok(self
            .catalog
            .get_referencing_keys(db, table)?
            .into_iter()
            .map(|reference| reference.source_table().clone())
            .collect())
    }

    /// Deletes every row matching all `conditions` and returns how many were removed.
    #[instrument(skip(self, conditions))]
    pub fn delete(&self, db: &str, table: &str, conditions: &[Condition]) -> Result<usize> {
        let reads = self.delete_read_set(db, table)?;
        let locks = self.locks.acquire(db, [table], reads);

        let schema = self.catalog.get_table(db, table)?;
        check_condition_columns(&schema, conditions)?;

        let rows: Vec<Row> = self
            .read_rows(&locks, db, table)?
            .into_iter()
            .filter(|row| matches_all(conditions, row))
            .collect();
        self.delete_rows(&locks, db, table, &rows)
    }

    /// Deletes the given rows after checking that nothing references them. The
    /// caller holds an exclusive lock on `table` and shared locks on the tables
    /// referencing it.
    pub fn delete_rows(&self, locks: &LockSet, db: &str, table: &str, rows: &[Row]) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }

        let schema = self.catalog.get_table(db, table)?;
        let documents: Vec<Document> = rows
            .iter()
            .map(|row| codec::encode_row(&schema, row))
            .collect::<std::result::Result<_, _>>()?;

        self.check_unreferenced(locks, db, table, rows, &documents, |_| true)?;
        self.remove_documents(db, table, &schema, rows, &documents)
    }

    /// Replaces `old` with `new` in place of a delete followed by an insert. Only
    /// referenced columns whose value changes are checked against referencing rows;
    /// the new row passes every insert check. If the insert is rejected the old row
    /// is put back. The caller holds the locks of both [`Self::insert_read_set`] and
    /// [`Self::delete_read_set`], with `table` exclusive.
    pub fn update_row(&self, locks: &LockSet, db: &str, table: &str, old: &Row, new: Row) -> Result<()> {
        let schema = self.catalog.get_table(db, table)?;
        let new = conform(&schema, new)?;
        let old_document = codec::encode_row(&schema, old)?;
        let rows = std::slice::from_ref(old);
        let documents = std::slice::from_ref(&old_document);

        self.check_unreferenced(locks, db, table, rows, documents, |reference| {
            old.get(reference.target_column()) != new.get(reference.target_column())
        })?;
        self.remove_documents(db, table, &schema, rows, documents)?;

        if let Err(err) = self.insert_row(locks, db, table, new) {
            warn!(
                "Update of `{}` in `{}.{}` rejected, restoring the previous row: {}",
                old_document.id(),
                db,
                table,
                err
            );
            self.insert_row(locks, db, table, old.clone())?;
            return Err(err);
        }
        Ok(())
    }

    /// Fails if a row outside `documents` still references a value of `rows`
    /// through one of the foreign keys selected by `check`.
    fn check_unreferenced(
        &self,
        locks: &LockSet,
        db: &str,
        table: &str,
        rows: &[Row],
        documents: &[Document],
        check: impl Fn(&ForeignKeyReference) -> bool,
    ) -> Result<()> {
        let doomed: BTreeSet<&str> = documents.iter().map(|d| d.id().as_str()).collect();

        for reference in self.catalog.get_referencing_keys(db, table)? {
            if !check(&reference) {
                continue;
            }
            let referenced: Vec<&Value> = rows
                .iter()
                .filter_map(|row| row.get(reference.target_column()))
                .filter(|value| !value.is_null())
                .collect();
            if referenced.is_empty() {
                continue;
            }

            let source = self.catalog.get_table(db, reference.source_table())?;
            for candidate in self.read_rows(locks, db, source.name())? {
                if source.name() == table && doomed.contains(row_id(&source, &candidate)?.as_str()) {
                    continue;
                }
                if let Some(value) = candidate.get(reference.source_column()) {
                    if referenced.contains(&value) {
                        return Err(RecordError::ForeignKeyConstraintViolation(format!(
                            "row with {} = {} is still referenced by {}",
                            reference.target_column(),
                            value,
                            reference
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Removes `documents` and their index entries under delete intents.
    fn remove_documents(
        &self,
        db: &str,
        table: &str,
        schema: &TableSchema,
        rows: &[Row],
        documents: &[Document],
    ) -> Result<usize> {
        let intent_coll = intent_collection(table);
        let mut intents = Vec::with_capacity(documents.len());
        for document in documents {
            let intent = Intent::delete(document).to_document()?;
            intents.push(intent.id().clone());
            self.store.replace_one(db, &intent_coll, intent)?;
        }

        let mut deleted = 0;
        for document in documents {
            if self.store.delete_one(db, table, document.id())? {
                deleted += 1;
            }
        }

        let primary_key = primary_key_name(schema)?;
        let index_coll = index_collection(table);
        for index in schema.indexes() {
            if index.is_primary_key_index(primary_key) {
                continue;
            }
            let mut entries = self.load_entries(db, &index_coll, index.name())?;
            for (row, document) in rows.iter().zip(documents) {
                entries.remove(&codec::encode_tuple(row, index.columns()), document.id());
            }
            self.store.replace_one(
                db,
                &index_coll,
                Document::new(index.name().clone(), entries.encode()?),
            )?;
        }

        for intent in intents {
            self.store.delete_one(db, &intent_coll, &intent)?;
        }
        debug!("Deleted {} row(s) from `{}.{}`", deleted, db, table);
        Ok(deleted)
    }

    // ----- recovery ----------------------------------------------------------

    /// Replays the intents left in `table`'s intent collection and returns how
    /// many were repaired. Index updates are idempotent, so replaying an intent
    /// whose work had already completed is harmless.
    #[instrument(skip(self))]
    pub fn recover(&self, db: &str, table: &str) -> Result<usize> {
        let _locks = self.locks.write(db, table);
        let schema = self.catalog.get_table(db, table)?;
        let intent_coll = intent_collection(table);
        let intents = self.store.find_all(db, &intent_coll)?;
        if intents.is_empty() {
            return Ok(0);
        }

        let primary_key = primary_key_name(&schema)?;
        let index_coll = index_collection(table);
        let mut entries: Vec<(Index, IndexEntries)> = Vec::new();
        for index in schema.indexes() {
            if !index.is_primary_key_index(primary_key) {
                let loaded = self.load_entries(db, &index_coll, index.name())?;
                entries.push((index.clone(), loaded));
            }
        }

        for document in &intents {
            let intent = Intent::decode(document.value())?;
            let stored = self.store.find_one(db, table, &intent.id)?;

            match (intent.kind, stored) {
                (IntentKind::Insert, Some(stored)) => {
                    let row = codec::decode_row(&schema, &stored)?;
                    for (index, mapping) in entries.iter_mut() {
                        mapping.insert(codec::encode_tuple(&row, index.columns()), intent.id.clone());
                    }
                }
                (IntentKind::Delete, None) => {
                    for (_, mapping) in entries.iter_mut() {
                        mapping.remove_id(&intent.id);
                    }
                }
                (kind, _) => {
                    trace!("Intent {:?} for row `{}` needs no repair", kind, intent.id);
                }
            }
        }

        for (index, mapping) in &entries {
            self.store.replace_one(
                db,
                &index_coll,
                Document::new(index.name().clone(), mapping.encode()?),
            )?;
        }
        for document in &intents {
            self.store.delete_one(db, &intent_coll, document.id())?;
        }

        info!(
            "Recovered {} pending intent(s) in `{}.{}`",
            intents.len(),
            db,
            table
        );
        Ok(intents.len())
    }

    /// Runs [`RecordManager::recover`] on every table in the catalog.
    pub fn recover_all(&self) -> Result<usize> {
        let mut repaired = 0;
        for db in self.catalog.list_databases() {
            for table in self.catalog.list_tables(&db)? {
                repaired += self.recover(&db, &table)?;
            }
        }
        Ok(repaired)
    }

    fn load_entries(&self, db: &str, collection: &str, index: &str) -> Result<IndexEntries> {
        match self.store.find_one(db, collection, index)? {
            Some(document) => Ok(IndexEntries::decode(document.value())?),
            None => Ok(IndexEntries::new()),
        }
    }
}

fn primary_key_name(schema: &TableSchema) -> Result<&str> {
    schema
        .primary_key()
        .map(|column| column.column_name().as_str())
        .ok_or_else(|| {
            RecordError::InvalidSchema(format!("table `{}` has no primary key", schema.name()))
        })
}

fn row_id(schema: &TableSchema, row: &Row) -> Result<String> {
    let primary_key = primary_key_name(schema)?;
    row.get(primary_key)
        .and_then(codec::encode_key)
        .ok_or_else(|| RecordError::InvalidSchema(format!("primary key `{}` is NULL", primary_key)))
}

/// Document id for `key` coerced to the primary-key type of `schema`.
fn coerce_key(schema: &TableSchema, key: &Value) -> Option<String> {
    let column = schema.primary_key()?;
    key.coerce_to(&column.column_type())
        .ok()
        .as_ref()
        .and_then(codec::encode_key)
}

/// Checks that `row` has exactly the declared columns and coerces every value to
/// its declared type. The result follows declaration order.
pub fn conform(schema: &TableSchema, row: Row) -> Result<Row> {
    if let Some(unknown) = row.columns().find(|c| !schema.has_column(c)) {
        return Err(RecordError::InvalidSchema(format!(
            "unknown column `{}` in `{}`",
            unknown,
            schema.name()
        )));
    }

    let mut conformed = Row::with_capacity(schema.columns().len());
    for column in schema.columns() {
        let value = row.get(column.column_name()).ok_or_else(|| {
            RecordError::InvalidSchema(format!(
                "missing value for column `{}` in `{}`",
                column.column_name(),
                schema.name()
            ))
        })?;
        let value = value.coerce_to(&column.column_type()).map_err(|err| {
            RecordError::InvalidSchema(format!("column `{}`: {}", column.column_name(), err))
        })?;
        if column.is_primary_key() && value.is_null() {
            return Err(RecordError::InvalidSchema(format!(
                "primary key `{}` cannot be NULL",
                column.column_name()
            )));
        }
        conformed.insert(column.column_name().clone(), value);
    }
    Ok(conformed)
}

/// Rejects conditions naming columns `schema` does not have.
pub fn check_condition_columns(schema: &TableSchema, conditions: &[Condition]) -> Result<()> {
    for condition in conditions {
        if !schema.has_column(&condition.column) {
            return Err(RecordError::NotFound(format!(
                "column `{}` in `{}`",
                condition.column,
                schema.name()
            )));
        }
    }
    Ok(())
}
