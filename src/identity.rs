use serde::Serialize;

use crate::error::FaceError;
use crate::Embedding;

/// Profile of an enrolled person. Never carries the embedding, so it is
/// safe to hand out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    identity_id: String,
    name: String,
    age: u32,
    profession: String,
}

impl Identity {
    pub fn new(
        identity_id: impl Into<String>,
        name: impl Into<String>,
        age: u32,
        profession: impl Into<String>,
    ) -> Result<Self, FaceError> {
        let identity_id = identity_id.into();
        if identity_id.trim().is_empty() {
            return Err(FaceError::InvalidRecord("identity_id is empty".into()));
        }
        if age == 0 {
            return Err(FaceError::InvalidRecord(format!(
                "age of {identity_id} must be positive"
            )));
        }
        Ok(Self {
            identity_id,
            name: name.into(),
            age,
            profession: profession.into(),
        })
    }

    /// Same as [`Identity::new`] with a fresh random v4 UUID as the id.
    pub fn generate(
        name: impl Into<String>,
        age: u32,
        profession: impl Into<String>,
    ) -> Result<Self, FaceError> {
        Self::new(uuid::Uuid::new_v4().to_string(), name, age, profession)
    }

    pub fn identity_id(&self) -> &str {
        &self.identity_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn age(&self) -> u32 {
        self.age
    }

    pub fn profession(&self) -> &str {
        &self.profession
    }
}

/// Identity plus its embedding; the unit of persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrolledRecord {
    identity: Identity,
    embedding: Embedding,
}

impl EnrolledRecord {
    /// `dimension` is the fixed embedding length of the deployment.
    pub fn new(
        identity: Identity,
        embedding: Embedding,
        dimension: usize,
    ) -> Result<Self, FaceError> {
        if embedding.dimension() != dimension {
            return Err(FaceError::DimensionMismatch {
                expected: dimension,
                actual: embedding.dimension(),
            });
        }
        Ok(Self::restore(identity, embedding))
    }

    /// Rebuild a record read back from a store. The deployment dimension is
    /// checked when the recognizer hydrates its index.
    pub(crate) fn restore(identity: Identity, embedding: Embedding) -> Self {
        Self {
            identity,
            embedding,
        }
    }

    pub fn identity_id(&self) -> &str {
        self.identity.identity_id()
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn embedding(&self) -> &Embedding {
        &self.embedding
    }

    pub fn into_identity(self) -> Identity {
        self.identity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("")]
    #[case("   ")]
    fn test_identity_rejects_blank_id(#[case] id: &str) {
        assert!(matches!(
            Identity::new(id, "Ada", 36, "engineer"),
            Err(FaceError::InvalidRecord(_))
        ));
    }

    #[test]
    fn test_identity_rejects_zero_age() {
        assert!(matches!(
            Identity::new("ada", "Ada", 0, "engineer"),
            Err(FaceError::InvalidRecord(_))
        ));
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let a = Identity::generate("Ada", 36, "engineer").unwrap();
        let b = Identity::generate("Ada", 36, "engineer").unwrap();
        assert_ne!(a.identity_id(), b.identity_id());
        assert!(uuid::Uuid::parse_str(a.identity_id()).is_ok());
    }

    #[test]
    fn test_record_rejects_wrong_dimension() {
        let identity = Identity::new("ada", "Ada", 36, "engineer").unwrap();
        let embedding = Embedding::normalize(vec![1.0, 2.0, 3.0]).unwrap();
        assert!(matches!(
            EnrolledRecord::new(identity, embedding, 4),
            Err(FaceError::DimensionMismatch {
                expected: 4,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_identity_json_has_no_embedding() {
        let identity = Identity::new("ada", "Ada", 36, "engineer").unwrap();
        let json = serde_json::to_value(&identity).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "identity_id": "ada",
                "name": "Ada",
                "age": 36,
                "profession": "engineer",
            })
        );
    }
}
