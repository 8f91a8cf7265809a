pub mod error;
pub mod extractor;
pub mod face;
pub mod locator;
pub mod pipeline;

// Re-export commonly used types
pub use error::ExtractError;
pub use extractor::{FeatureExtractor, FlattenExtractor};
pub use face::{CanonicalFace, Embedding, FaceRegion};
pub use locator::{FaceLocator, FixedRegionLocator, WholeImageLocator};
pub use pipeline::Pipeline;
