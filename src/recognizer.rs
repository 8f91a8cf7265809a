use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::info;

use crate::error::{FaceError, PersistenceError};
use crate::identity::{EnrolledRecord, Identity};
use crate::index::EmbeddingIndex;
use crate::matcher::{MatchResult, Matcher, Threshold};
use crate::storage::RecordStore;
use crate::{CanonicalFace, Embedding, FeatureExtractor};

struct State<S> {
    store: S,
    index: EmbeddingIndex,
}

/// Identity matching engine: extractor, index, matcher and store behind a
/// single reader/writer lock.
///
/// Enroll and delete hold the write lock across the store write and the
/// index update, store first. Recognition takes the read lock and so never
/// sees one without the other.
pub struct FaceRecognizer<S: RecordStore> {
    state: RwLock<State<S>>,
    matcher: Matcher,
    extractor: Box<dyn FeatureExtractor>,
}

impl<S: RecordStore> FaceRecognizer<S> {
    /// Build the engine and hydrate the index from every durable record.
    pub fn open(
        store: S,
        extractor: Box<dyn FeatureExtractor>,
        threshold: Threshold,
    ) -> Result<Self, FaceError> {
        let dimension = extractor.dimension();
        let mut index = EmbeddingIndex::new(dimension);
        for record in store.load_all()? {
            let actual = record.embedding().dimension();
            if actual != dimension {
                return Err(PersistenceError::Corrupt {
                    identity_id: record.identity_id().to_owned(),
                    reason: format!("embedding has {actual} dimensions, expected {dimension}"),
                }
                .into());
            }
            index.upsert(record.identity_id(), record.embedding().clone())?;
        }
        info!("hydrated {} enrolled identities", index.len());

        Ok(Self {
            state: RwLock::new(State { store, index }),
            matcher: Matcher::new(threshold),
            extractor,
        })
    }

    pub fn dimension(&self) -> usize {
        self.extractor.dimension()
    }

    /// Needs no lock; extraction is stateless.
    pub fn extract_embedding(&self, face: &CanonicalFace) -> Result<Embedding, FaceError> {
        Ok(self.extractor.extract(face)?)
    }

    /// Persist then index. A failed write leaves the index untouched.
    /// Enrolling a known id replaces its whole record.
    pub fn enroll(&self, identity: Identity, embedding: Embedding) -> Result<(), FaceError> {
        let record = EnrolledRecord::new(identity, embedding, self.dimension())?;

        let mut state = self.write();
        state.store.put(&record)?;
        // Cannot fail: the record was built against the index's dimension.
        state
            .index
            .upsert(record.identity_id(), record.embedding().clone())?;

        info!("enrolled identity {}", record.identity_id());
        Ok(())
    }

    pub fn recognize(&self, embedding: &Embedding) -> Result<MatchResult, FaceError> {
        let state = self.read();
        self.matcher.recognize(&state.index, embedding)
    }

    /// Remove from the store then the index. A failed delete leaves the
    /// index untouched.
    pub fn delete_identity(&self, identity_id: &str) -> Result<(), FaceError> {
        let mut state = self.write();
        state.store.delete(identity_id)?;
        state.index.remove(identity_id);

        info!("deleted identity {}", identity_id);
        Ok(())
    }

    /// Profiles only; embeddings never leave the engine.
    pub fn list_identities(&self) -> Result<Vec<Identity>, FaceError> {
        let state = self.read();
        let records = state.store.load_all()?;
        Ok(records
            .into_iter()
            .map(EnrolledRecord::into_identity)
            .collect())
    }

    pub fn get(&self, identity_id: &str) -> Result<Identity, FaceError> {
        let state = self.read();
        Ok(state.store.get(identity_id)?.into_identity())
    }

    /// Number of identities currently matchable.
    pub fn enrolled_count(&self) -> usize {
        self.read().index.len()
    }

    pub fn is_enrolled(&self, identity_id: &str) -> bool {
        self.read().index.contains(identity_id)
    }

    // Every mutation is store-first, so a panic mid-operation cannot leave
    // an index entry without a record; the poisoned state is still usable.
    fn read(&self) -> RwLockReadGuard<'_, State<S>> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State<S>> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}
