use anyhow::{Context, Result};
use image::DynamicImage;

use crate::extractor::FeatureExtractor;
use crate::face::{CanonicalFace, Embedding, FaceRegion};
use crate::locator::{self, FaceLocator};

/// Full pipeline: locate faces → pick the largest → crop → canonicalize
pub struct Pipeline {
    pub locator: Box<dyn FaceLocator>,
    pub canonical_size: u32,
}

impl Pipeline {
    pub fn new(locator: Box<dyn FaceLocator>, canonical_size: u32) -> Self {
        Self {
            locator,
            canonical_size,
        }
    }

    /// Locate and canonicalize the dominant face in `img`.
    pub fn canonical_face(&self, img: &DynamicImage) -> Result<(FaceRegion, CanonicalFace)> {
        let regions = self.locator.locate(img).context("locating faces")?;

        let Some(best) = locator::largest_region(&regions) else {
            anyhow::bail!("No face detected in image");
        };
        log::debug!("{} face(s) located, using {:?}", regions.len(), best);

        let crop = best.crop(img).context("cropping face")?;
        let face =
            CanonicalFace::from_image(&crop, self.canonical_size).context("canonicalizing face")?;

        Ok((best, face))
    }

    /// Process an image: locate the dominant face and return its embedding
    pub fn process_image<E>(
        &self,
        img: &DynamicImage,
        extractor: &E,
    ) -> Result<(FaceRegion, Embedding)>
    where
        E: FeatureExtractor + ?Sized,
    {
        let (region, face) = self.canonical_face(img)?;
        let embedding = extractor.extract(&face).context("extracting embedding")?;
        Ok((region, embedding))
    }
}
