use crate::document::{Document, DocumentStore, StoreError, StoreResult};
use catalog::PhysicalLayout;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::trace;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionState {
    documents: BTreeMap<String, String>,
    indexes: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseState {
    collections: BTreeMap<String, CollectionState>,
}

/// Full contents of a store. This is also the on-disk snapshot format of
/// [`FileStore`](crate::file::FileStore).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreState {
    databases: BTreeMap<String, DatabaseState>,
}

impl StoreState {
    fn database(&self, database: &str) -> StoreResult<&DatabaseState> {
        self.databases
            .get(database)
            .ok_or_else(|| StoreError::DatabaseNotFound(database.to_string()))
    }

    fn database_mut(&mut self, database: &str) -> StoreResult<&mut DatabaseState> {
        self.databases
            .get_mut(database)
            .ok_or_else(|| StoreError::DatabaseNotFound(database.to_string()))
    }

    fn collection(&self, database: &str, collection: &str) -> StoreResult<&CollectionState> {
        self.database(database)?
            .collections
            .get(collection)
            .ok_or_else(|| StoreError::CollectionNotFound {
                database: database.to_string(),
                collection: collection.to_string(),
            })
    }

    fn collection_mut(
        &mut self,
        database: &str,
        collection: &str,
    ) -> StoreResult<&mut CollectionState> {
        self.database_mut(database)?
            .collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::CollectionNotFound {
                database: database.to_string(),
                collection: collection.to_string(),
            })
    }
}

/// In-process document store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_state(state: StoreState) -> Self {
        Self {
            state: RwLock::new(state),
        }
    }

    pub fn snapshot(&self) -> StoreState {
        self.state.read().clone()
    }
}

impl PhysicalLayout for MemoryStore {
    type Error = StoreError;

    fn database_names(&self) -> StoreResult<Vec<String>> {
        Ok(self.state.read().databases.keys().cloned().collect())
    }

    fn collection_names(&self, database: &str) -> StoreResult<Vec<String>> {
        let state = self.state.read();
        Ok(state.database(database)?.collections.keys().cloned().collect())
    }

    fn index_names(&self, database: &str, collection: &str) -> StoreResult<Vec<String>> {
        let state = self.state.read();
        Ok(state
            .collection(database, collection)?
            .indexes
            .keys()
            .cloned()
            .collect())
    }
}

impl DocumentStore for MemoryStore {
    fn create_database(&self, database: &str) -> StoreResult<()> {
        let mut state = self.state.write();
        if state.databases.contains_key(database) {
            return Err(StoreError::DatabaseExists(database.to_string()));
        }
        state
            .databases
            .insert(database.to_string(), DatabaseState::default());
        trace!("Created database `{}`", database);
        Ok(())
    }

    fn drop_database(&self, database: &str) -> StoreResult<()> {
        self.state
            .write()
            .databases
            .remove(database)
            .map(|_| trace!("Dropped database `{}`", database))
            .ok_or_else(|| StoreError::DatabaseNotFound(database.to_string()))
    }

    fn create_collection(&self, database: &str, collection: &str) -> StoreResult<()> {
        let mut state = self.state.write();
        let db = state.database_mut(database)?;
        if db.collections.contains_key(collection) {
            return Err(StoreError::CollectionExists {
                database: database.to_string(),
                collection: collection.to_string(),
            });
        }
        db.collections
            .insert(collection.to_string(), CollectionState::default());
        trace!("Created collection `{}.{}`", database, collection);
        Ok(())
    }

    fn drop_collection(&self, database: &str, collection: &str) -> StoreResult<()> {
        let mut state = self.state.write();
        state
            .database_mut(database)?
            .collections
            .remove(collection)
            .map(|_| trace!("Dropped collection `{}.{}`", database, collection))
            .ok_or_else(|| StoreError::CollectionNotFound {
                database: database.to_string(),
                collection: collection.to_string(),
            })
    }

    fn insert_one(&self, database: &str, collection: &str, document: Document) -> StoreResult<()> {
        let mut state = self.state.write();
        let coll = state.collection_mut(database, collection)?;
        let (id, value) = document.into_parts();
        if coll.documents.contains_key(&id) {
            return Err(StoreError::DocumentExists {
                collection: collection.to_string(),
                id,
            });
        }
        coll.documents.insert(id, value);
        Ok(())
    }

    fn replace_one(
        &self,
        database: &str,
        collection: &str,
        document: Document,
    ) -> StoreResult<()> {
        let mut state = self.state.write();
        let (id, value) = document.into_parts();
        state
            .collection_mut(database, collection)?
            .documents
            .insert(id, value);
        Ok(())
    }

    fn find_one(
        &self,
        database: &str,
        collection: &str,
        id: &str,
    ) -> StoreResult<Option<Document>> {
        let state = self.state.read();
        Ok(state
            .collection(database, collection)?
            .documents
            .get(id)
            .map(|value| Document::new(id, value.clone())))
    }

    fn find_all(&self, database: &str, collection: &str) -> StoreResult<Vec<Document>> {
        let state = self.state.read();
        Ok(state
            .collection(database, collection)?
            .documents
            .iter()
            .map(|(id, value)| Document::new(id.clone(), value.clone()))
            .collect())
    }

    fn delete_one(&self, database: &str, collection: &str, id: &str) -> StoreResult<bool> {
        let mut state = self.state.write();
        Ok(state
            .collection_mut(database, collection)?
            .documents
            .remove(id)
            .is_some())
    }

    fn create_index(
        &self,
        database: &str,
        collection: &str,
        index: &str,
        columns: &[String],
    ) -> StoreResult<()> {
        let mut state = self.state.write();
        let coll = state.collection_mut(database, collection)?;
        if coll.indexes.contains_key(index) {
            return Err(StoreError::IndexExists {
                collection: collection.to_string(),
                index: index.to_string(),
            });
        }
        coll.indexes.insert(index.to_string(), columns.to_vec());
        Ok(())
    }

    fn drop_index(&self, database: &str, collection: &str, index: &str) -> StoreResult<()> {
        let mut state = self.state.write();
        state
            .collection_mut(database, collection)?
            .indexes
            .remove(index)
            .map(|_| ())
            .ok_or_else(|| StoreError::IndexNotFound {
                collection: collection.to_string(),
                index: index.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions_sorted::assert_eq;

    fn store_with_collection() -> MemoryStore {
        let store = MemoryStore::new();
        store.create_database("d1").unwrap();
        store.create_collection("d1", "t1").unwrap();
        store
    }

    #[test]
    fn test_insert_rejects_duplicate_id() {
        let store = store_with_collection();
        store.insert_one("d1", "t1", Document::new("1", "a")).unwrap();

        let err = store
            .insert_one("d1", "t1", Document::new("1", "b"))
            .unwrap_err();
        assert!(err.is_duplicate());
        assert_eq!(
            store.find_one("d1", "t1", "1").unwrap(),
            Some(Document::new("1", "a"))
        );
    }

    #[test]
    fn test_replace_upserts() {
        let store = store_with_collection();
        store.replace_one("d1", "t1", Document::new("k", "v1")).unwrap();
        store.replace_one("d1", "t1", Document::new("k", "v2")).unwrap();

        assert_eq!(
            store.find_all("d1", "t1").unwrap(),
            vec![Document::new("k", "v2")]
        );
    }

    #[test]
    fn test_delete_reports_removal() {
        let store = store_with_collection();
        store.insert_one("d1", "t1", Document::new("1", "a")).unwrap();

        assert!(store.delete_one("d1", "t1", "1").unwrap());
        assert!(!store.delete_one("d1", "t1", "1").unwrap());
    }

    #[test]
    fn test_missing_namespaces() {
        let store = MemoryStore::new();
        assert!(store.find_all("nope", "t").unwrap_err().is_not_found());
        store.create_database("d1").unwrap();
        assert!(store.find_one("d1", "t", "1").unwrap_err().is_not_found());
        assert!(store.create_database("d1").unwrap_err().is_duplicate());
    }

    #[test]
    fn test_index_registry() {
        let store = store_with_collection();
        store
            .create_index("d1", "t1", "name", &["name".to_string()])
            .unwrap();
        assert!(store
            .create_index("d1", "t1", "name", &["name".to_string()])
            .unwrap_err()
            .is_duplicate());
        assert_eq!(store.index_names("d1", "t1").unwrap(), vec!["name".to_string()]);

        store.drop_index("d1", "t1", "name").unwrap();
        assert!(store.index_names("d1", "t1").unwrap().is_empty());
        assert!(store.drop_index("d1", "t1", "name").unwrap_err().is_not_found());
    }

    #[test]
    fn test_layout_listing() {
        let store = store_with_collection();
        store.create_collection("d1", "t1_index").unwrap();

        assert_eq!(store.database_names().unwrap(), vec!["d1".to_string()]);
        assert_eq!(
            store.collection_names("d1").unwrap(),
            vec!["t1".to_string(), "t1_index".to_string()]
        );
    }
}
