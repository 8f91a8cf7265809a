use serde::Serialize;

use crate::error::FaceError;
use crate::index::EmbeddingIndex;
use crate::Embedding;

pub const DEFAULT_THRESHOLD: f64 = 0.6;

/// Largest Euclidean distance between normalized embeddings still treated
/// as the same identity. Smaller is stricter.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Threshold(f64);

impl Threshold {
    pub fn new(value: f64) -> Result<Self, FaceError> {
        if !value.is_finite() || value <= 0.0 {
            return Err(FaceError::InvalidThreshold(value));
        }
        Ok(Self(value))
    }

    pub fn get(self) -> f64 {
        self.0
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Self(DEFAULT_THRESHOLD)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum MatchResult {
    Match { identity_id: String, confidence: f64 },
    NoMatch,
}

impl MatchResult {
    pub fn is_match(&self) -> bool {
        matches!(self, MatchResult::Match { .. })
    }
}

/// Score in `[0, 100]`: 100 at distance 0, falling linearly to 0 at the
/// threshold.
pub fn confidence(distance: f64, threshold: Threshold) -> f64 {
    (100.0 * (1.0 - distance / threshold.get())).clamp(0.0, 100.0)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Matcher {
    threshold: Threshold,
}

impl Matcher {
    pub fn new(threshold: Threshold) -> Self {
        Self { threshold }
    }

    /// Fails only when `embedding` does not have the index's dimension.
    pub fn recognize(
        &self,
        index: &EmbeddingIndex,
        embedding: &Embedding,
    ) -> Result<MatchResult, FaceError> {
        let Some(nearest) = index.nearest(embedding)? else {
            return Ok(MatchResult::NoMatch);
        };
        log::debug!(
            "nearest {} at distance {:.4} (threshold {:.4})",
            nearest.identity_id,
            nearest.distance,
            self.threshold.get()
        );
        if nearest.distance >= self.threshold.get() {
            return Ok(MatchResult::NoMatch);
        }
        Ok(MatchResult::Match {
            confidence: confidence(nearest.distance, self.threshold),
            identity_id: nearest.identity_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn emb(values: &[f32]) -> Embedding {
        Embedding::normalize(values.to_vec()).unwrap()
    }

    #[rstest]
    #[case(0.0)]
    #[case(-0.1)]
    #[case(f64::NAN)]
    #[case(f64::INFINITY)]
    fn test_threshold_rejects(#[case] value: f64) {
        assert!(matches!(
            Threshold::new(value),
            Err(FaceError::InvalidThreshold(_))
        ));
    }

    #[test]
    fn test_default_threshold() {
        assert_relative_eq!(Threshold::default().get(), 0.6);
    }

    #[rstest]
    #[case(0.0, 100.0)]
    #[case(0.3, 50.0)]
    #[case(0.6, 0.0)]
    #[case(0.9, 0.0)]
    fn test_confidence_values(#[case] distance: f64, #[case] expected: f64) {
        let t = Threshold::new(0.6).unwrap();
        assert_relative_eq!(confidence(distance, t), expected, epsilon = 1e-9);
    }

    #[test]
    fn test_confidence_strictly_decreasing() {
        let t = Threshold::new(0.6).unwrap();
        let steps: Vec<f64> = (0..60).map(|i| i as f64 * 0.01).collect();
        for pair in steps.windows(2) {
            assert!(confidence(pair[0], t) > confidence(pair[1], t));
        }
    }

    #[test]
    fn test_empty_index_is_no_match() {
        let matcher = Matcher::default();
        let index = EmbeddingIndex::new(2);
        assert_eq!(
            matcher.recognize(&index, &emb(&[1.0, 2.0])).unwrap(),
            MatchResult::NoMatch
        );
    }

    #[test]
    fn test_exact_match_has_full_confidence() {
        let matcher = Matcher::default();
        let mut index = EmbeddingIndex::new(3);
        let e = emb(&[0.2, 0.4, 0.6]);
        index.upsert("ada", e.clone()).unwrap();
        assert_eq!(
            matcher.recognize(&index, &e).unwrap(),
            MatchResult::Match {
                identity_id: "ada".into(),
                confidence: 100.0
            }
        );
    }

    #[test]
    fn test_distance_at_threshold_is_no_match() {
        let a = emb(&[1.0, 0.0]);
        let b = emb(&[0.0, 1.0]);
        let mut index = EmbeddingIndex::new(2);
        index.upsert("ada", a.clone()).unwrap();
        let d = a.distance(&b).unwrap();

        let at = Matcher::new(Threshold::new(d).unwrap());
        assert_eq!(at.recognize(&index, &b).unwrap(), MatchResult::NoMatch);

        let just_above = Matcher::new(Threshold::new(d + 1e-9).unwrap());
        match just_above.recognize(&index, &b).unwrap() {
            MatchResult::Match {
                identity_id,
                confidence,
            } => {
                assert_eq!(identity_id, "ada");
                assert!(confidence > 0.0 && confidence < 1e-3, "{confidence}");
            }
            MatchResult::NoMatch => panic!("expected a match just inside the threshold"),
        }
    }

    #[test]
    fn test_mixed_dimension_query_is_an_error() {
        let mut index = EmbeddingIndex::new(2);
        index.upsert("a", emb(&[1.0, 0.0])).unwrap();
        assert!(matches!(
            Matcher::default().recognize(&index, &emb(&[1.0, 0.0, 5.0])),
            Err(FaceError::DimensionMismatch {
                expected: 2,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_match_result_json() {
        let json = serde_json::to_value(MatchResult::Match {
            identity_id: "ada".into(),
            confidence: 42.0,
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"result": "match", "identity_id": "ada", "confidence": 42.0})
        );
        assert_eq!(
            serde_json::to_value(MatchResult::NoMatch).unwrap(),
            serde_json::json!({"result": "no_match"})
        );
    }
}
