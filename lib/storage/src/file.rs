use crate::{
    document::{Document, DocumentStore, StoreResult},
    memory::{MemoryStore, StoreState},
};
use catalog::PhysicalLayout;
use parking_lot::Mutex;
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};
use tracing::{debug, error, info};

/// A [`MemoryStore`] that writes a JSON snapshot of its full state to disk after
/// every mutating call and reloads it on open.
#[derive(Debug)]
pub struct FileStore {
    inner: MemoryStore,
    path: PathBuf,
    flush_lock: Mutex<()>,
}

impl FileStore {
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();

        let inner = if path.exists() {
            let contents = fs::read_to_string(&path)?;
            let state: StoreState = serde_json::from_str(&contents)?;
            info!("Loaded document store snapshot from {}", path.display());
            MemoryStore::from_state(state)
        } else {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            debug!(
                "No snapshot at {}. Starting with an empty store",
                path.display()
            );
            MemoryStore::new()
        };

        let store = Self {
            inner,
            path,
            flush_lock: Mutex::new(()),
        };
        store.flush()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the current state to a temp file and renames it into place.
    pub fn flush(&self) -> StoreResult<()> {
        let _guard = self.flush_lock.lock();
        let state = self.inner.snapshot();
        let tmp = self.path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(serde_json::to_string(&state)?.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path).map_err(|e| {
            error!("Failed to persist snapshot to {}: {}", self.path.display(), e);
            e
        })?;
        Ok(())
    }

    fn write<T>(&self, f: impl FnOnce(&MemoryStore) -> StoreResult<T>) -> StoreResult<T> {
        let out = f(&self.inner)?;
        self.flush()?;
        Ok(out)
    }
}

impl PhysicalLayout for FileStore {
    type Error = crate::document::StoreError;

    fn database_names(&self) -> StoreResult<Vec<String>> {
        self.inner.database_names()
    }

    fn collection_names(&self, database: &str) -> StoreResult<Vec<String>> {
        self.inner.collection_names(database)
    }

    fn index_names(&self, database: &str, collection: &str) -> StoreResult<Vec<String>> {
        self.inner.index_names(database, collection)
    }
}

impl DocumentStore for FileStore {
    fn create_database(&self, database: &str) -> StoreResult<()> {
        self.write(|store| store.create_database(database))
    }

    fn drop_database(&self, database: &str) -> StoreResult<()> {
        self.write(|store| store.drop_database(database))
    }

    fn create_collection(&self, database: &str, collection: &str) -> StoreResult<()> {
        self.write(|store| store.create_collection(database, collection))
    }

    fn drop_collection(&self, database: &str, collection: &str) -> StoreResult<()> {
        self.write(|store| store.drop_collection(database, collection))
    }

    fn insert_one(&self, database: &str, collection: &str, document: Document) -> StoreResult<()> {
        self.write(|store| store.insert_one(database, collection, document))
    }

    fn replace_one(
        &self,
        database: &str,
        collection: &str,
        document: Document,
    ) -> StoreResult<()> {
        self.write(|store| store.replace_one(database, collection, document))
    }

    fn find_one(
        &self,
        database: &str,
        collection: &str,
        id: &str,
    ) -> StoreResult<Option<Document>> {
        self.inner.find_one(database, collection, id)
    }

    fn find_all(&self, database: &str, collection: &str) -> StoreResult<Vec<Document>> {
        self.inner.find_all(database, collection)
    }

    fn delete_one(&self, database: &str, collection: &str, id: &str) -> StoreResult<bool> {
        self.write(|store| store.delete_one(database, collection, id))
    }

    fn create_index(
        &self,
        database: &str,
        collection: &str,
        index: &str,
        columns: &[String],
    ) -> StoreResult<()> {
        self.write(|store| store.create_index(database, collection, index, columns))
    }

    fn drop_index(&self, database: &str, collection: &str, index: &str) -> StoreResult<()> {
        self.write(|store| store.drop_index(database, collection, index))
    }
}
