use std::collections::BTreeMap;

use crate::error::FaceError;
use crate::Embedding;

/// Closest enrolled identity to a query.
#[derive(Debug, Clone, PartialEq)]
pub struct Nearest {
    pub identity_id: String,
    pub distance: f64,
}

/// In-memory identity -> embedding map used for matching.
///
/// Mirrors the durable store; rebuilt from it on startup and never the
/// source of truth. Queries are a full O(n·D) scan. Every entry and every
/// query has the same dimension, fixed at construction.
#[derive(Debug, Clone)]
pub struct EmbeddingIndex {
    dimension: usize,
    // Ordered by id so the scan resolves ties to the smallest id.
    entries: BTreeMap<String, Embedding>,
}

impl EmbeddingIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            entries: BTreeMap::new(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Insert or replace.
    pub fn upsert(
        &mut self,
        identity_id: impl Into<String>,
        embedding: Embedding,
    ) -> Result<(), FaceError> {
        self.check_dimension(&embedding)?;
        self.entries.insert(identity_id.into(), embedding);
        Ok(())
    }

    /// Remove if present.
    pub fn remove(&mut self, identity_id: &str) {
        self.entries.remove(identity_id);
    }

    /// `None` on an empty index. A query of the wrong dimension fails even
    /// then.
    pub fn nearest(&self, query: &Embedding) -> Result<Option<Nearest>, FaceError> {
        self.check_dimension(query)?;
        let mut best: Option<(&str, f64)> = None;
        for (id, stored) in &self.entries {
            let distance = query.distance(stored)?;
            match best {
                Some((_, d)) if d <= distance => {}
                _ => best = Some((id.as_str(), distance)),
            }
        }
        Ok(best.map(|(id, distance)| Nearest {
            identity_id: id.to_owned(),
            distance,
        }))
    }

    pub fn contains(&self, identity_id: &str) -> bool {
        self.entries.contains_key(identity_id)
    }

    pub fn get(&self, identity_id: &str) -> Option<&Embedding> {
        self.entries.get(identity_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn check_dimension(&self, embedding: &Embedding) -> Result<(), FaceError> {
        if embedding.dimension() != self.dimension {
            return Err(FaceError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.dimension(),
            });
        }
        Ok(())
    }
}
