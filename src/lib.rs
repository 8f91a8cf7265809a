pub mod config;
pub mod error;
pub mod identity;
pub mod index;
pub mod matcher;
pub mod recognizer;
pub mod storage;

// Re-export vision types for convenience
pub use facematch_vision::{
    extractor, face, locator, pipeline, CanonicalFace, Embedding, ExtractError, FaceRegion,
    FeatureExtractor, FlattenExtractor, Pipeline,
};

pub use error::{FaceError, PersistenceError};
pub use identity::{EnrolledRecord, Identity};
pub use index::EmbeddingIndex;
pub use matcher::{MatchResult, Matcher, Threshold};
pub use recognizer::FaceRecognizer;
pub use storage::{FileStore, MemoryStore, RecordStore};
