use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{FaceError, PersistenceError};
use crate::identity::{EnrolledRecord, Identity};
use crate::Embedding;

/// Durable keeper of enrolled records, keyed by identity id.
///
/// Callers serialize access; implementations need no interior locking.
pub trait RecordStore: Send + Sync {
    fn load_all(&self) -> Result<Vec<EnrolledRecord>, FaceError>;

    fn get(&self, identity_id: &str) -> Result<EnrolledRecord, FaceError>;

    /// Write or overwrite the record for its identity id.
    fn put(&mut self, record: &EnrolledRecord) -> Result<(), FaceError>;

    /// Fails with [`FaceError::NotFound`] when the id is unknown.
    fn delete(&mut self, identity_id: &str) -> Result<(), FaceError>;
}

/// On-disk shape of one record.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredRecord {
    identity_id: String,
    name: String,
    age: u32,
    profession: String,
    embedding: Vec<f32>,
}

impl From<&EnrolledRecord> for StoredRecord {
    fn from(record: &EnrolledRecord) -> Self {
        let identity = record.identity();
        Self {
            identity_id: identity.identity_id().to_owned(),
            name: identity.name().to_owned(),
            age: identity.age(),
            profession: identity.profession().to_owned(),
            embedding: record.embedding().to_vec(),
        }
    }
}

impl StoredRecord {
    fn into_record(self) -> Result<EnrolledRecord, PersistenceError> {
        let StoredRecord {
            identity_id,
            name,
            age,
            profession,
            embedding,
        } = self;
        let corrupt_id = identity_id.clone();
        let corrupt = move |reason: String| PersistenceError::Corrupt {
            identity_id: corrupt_id,
            reason,
        };
        let embedding = match Embedding::from_unit(embedding) {
            Ok(embedding) => embedding,
            Err(e) => return Err(corrupt(e.to_string())),
        };
        let identity =
            Identity::new(identity_id, name, age, profession).map_err(|e| corrupt(e.to_string()))?;
        Ok(EnrolledRecord::restore(identity, embedding))
    }
}

type Collection = BTreeMap<String, StoredRecord>;

/// Encoding of the store file, picked from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreFormat {
    Postcard,
    Json,
}

impl StoreFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => StoreFormat::Json,
            _ => StoreFormat::Postcard,
        }
    }
}

/// Whole-collection file store. Every mutation rewrites the file through a
/// synced sibling temp file and a rename, then syncs the directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
    format: StoreFormat,
}

impl FileStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| PersistenceError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let format = StoreFormat::from_path(&path);
        Ok(Self { path, format })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> StoreFormat {
        self.format
    }

    fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> PersistenceError + '_ {
        move |source| PersistenceError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn read_collection(&self) -> Result<Collection, PersistenceError> {
        if !self.path.exists() {
            return Ok(Collection::new());
        }
        let data = std::fs::read(&self.path).map_err(Self::io_err(&self.path))?;
        let decode_err = |message: String| PersistenceError::Decode {
            path: self.path.clone(),
            message,
        };
        // Every write leaves at least an encoded empty map behind, so a
        // zero-length file is a lost write, not an empty store.
        if data.is_empty() {
            return Err(decode_err("store file is empty".into()));
        }
        let collection: Collection = match self.format {
            StoreFormat::Postcard => {
                postcard::from_bytes(&data).map_err(|e| decode_err(e.to_string()))?
            }
            StoreFormat::Json => {
                serde_json::from_slice(&data).map_err(|e| decode_err(e.to_string()))?
            }
        };
        for (key, record) in &collection {
            if key != &record.identity_id {
                return Err(PersistenceError::Corrupt {
                    identity_id: key.clone(),
                    reason: format!("stored under key {key} but names {}", record.identity_id),
                });
            }
        }
        Ok(collection)
    }

    fn write_collection(&self, collection: &Collection) -> Result<(), PersistenceError> {
        let encode_err = |message: String| PersistenceError::Encode {
            path: self.path.clone(),
            message,
        };
        let data = match self.format {
            StoreFormat::Postcard => {
                postcard::to_allocvec(collection).map_err(|e| encode_err(e.to_string()))?
            }
            StoreFormat::Json => {
                serde_json::to_vec_pretty(collection).map_err(|e| encode_err(e.to_string()))?
            }
        };

        let tmp = self.tmp_path();
        if let Err(e) = self.replace_with(&tmp, &data) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e);
        }
        self.sync_parent()
    }

    fn replace_with(&self, tmp: &Path, data: &[u8]) -> Result<(), PersistenceError> {
        let mut file = File::create(tmp).map_err(Self::io_err(tmp))?;
        file.write_all(data).map_err(Self::io_err(tmp))?;
        file.sync_all().map_err(Self::io_err(tmp))?;
        drop(file);
        std::fs::rename(tmp, &self.path).map_err(Self::io_err(&self.path))
    }

    /// Make the rename itself durable.
    #[cfg(unix)]
    fn sync_parent(&self) -> Result<(), PersistenceError> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        File::open(parent)
            .and_then(|dir| dir.sync_all())
            .map_err(Self::io_err(parent))
    }

    #[cfg(not(unix))]
    fn sync_parent(&self) -> Result<(), PersistenceError> {
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(".tmp");
        PathBuf::from(name)
    }
}

impl RecordStore for FileStore {
    fn load_all(&self) -> Result<Vec<EnrolledRecord>, FaceError> {
        let records = self
            .read_collection()?
            .into_values()
            .map(StoredRecord::into_record)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    fn get(&self, identity_id: &str) -> Result<EnrolledRecord, FaceError> {
        let mut collection = self.read_collection()?;
        let stored = collection
            .remove(identity_id)
            .ok_or_else(|| FaceError::NotFound(identity_id.to_owned()))?;
        Ok(stored.into_record()?)
    }

    fn put(&mut self, record: &EnrolledRecord) -> Result<(), FaceError> {
        let mut collection = self.read_collection()?;
        collection.insert(record.identity_id().to_owned(), StoredRecord::from(record));
        self.write_collection(&collection)?;
        Ok(())
    }

    fn delete(&mut self, identity_id: &str) -> Result<(), FaceError> {
        let mut collection = self.read_collection()?;
        if collection.remove(identity_id).is_none() {
            return Err(FaceError::NotFound(identity_id.to_owned()));
        }
        self.write_collection(&collection)?;
        Ok(())
    }
}

/// Volatile store for tests and throwaway sessions.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    records: BTreeMap<String, EnrolledRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for MemoryStore {
    fn load_all(&self) -> Result<Vec<EnrolledRecord>, FaceError> {
        Ok(self.records.values().cloned().collect())
    }

    fn get(&self, identity_id: &str) -> Result<EnrolledRecord, FaceError> {
        self.records
            .get(identity_id)
            .cloned()
            .ok_or_else(|| FaceError::NotFound(identity_id.to_owned()))
    }

    fn put(&mut self, record: &EnrolledRecord) -> Result<(), FaceError> {
        self.records
            .insert(record.identity_id().to_owned(), record.clone());
        Ok(())
    }

    fn delete(&mut self, identity_id: &str) -> Result<(), FaceError> {
        self.records
            .remove(identity_id)
            .map(|_| ())
            .ok_or_else(|| FaceError::NotFound(identity_id.to_owned()))
    }
}
