use anyhow::Result;
use image::{DynamicImage, GenericImageView};

use crate::face::FaceRegion;

/// Finds faces in a decoded image.
///
/// Detection itself lives outside this crate; anything that can turn an
/// image into zero or more face boxes plugs in here.
pub trait FaceLocator: Send + Sync {
    fn locate(&self, img: &DynamicImage) -> Result<Vec<FaceRegion>>;
}

/// Treats the whole image as one face. For inputs that are already crops.
#[derive(Debug, Default, Clone, Copy)]
pub struct WholeImageLocator;

impl FaceLocator for WholeImageLocator {
    fn locate(&self, img: &DynamicImage) -> Result<Vec<FaceRegion>> {
        let (width, height) = img.dimensions();
        if width == 0 || height == 0 {
            return Ok(vec![]);
        }
        Ok(vec![FaceRegion::new(0, 0, width, height)?])
    }
}

/// Returns a caller supplied box, e.g. from an upstream detector.
#[derive(Debug, Clone, Copy)]
pub struct FixedRegionLocator {
    region: FaceRegion,
}

impl FixedRegionLocator {
    pub fn new(region: FaceRegion) -> Self {
        Self { region }
    }
}

impl FaceLocator for FixedRegionLocator {
    fn locate(&self, img: &DynamicImage) -> Result<Vec<FaceRegion>> {
        let (width, height) = img.dimensions();
        if !self.region.fits_within(width, height) {
            log::warn!(
                "region {:?} does not fit a {}x{} image",
                self.region,
                width,
                height
            );
            return Ok(vec![]);
        }
        Ok(vec![self.region])
    }
}

/// Largest box by area. The first one wins on equal areas.
pub fn largest_region(regions: &[FaceRegion]) -> Option<FaceRegion> {
    regions.iter().copied().fold(None, |best, r| match best {
        Some(b) if b.area() >= r.area() => Some(b),
        _ => Some(r),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn region(x: u32, y: u32, w: u32, h: u32) -> FaceRegion {
        FaceRegion::new(x, y, w, h).unwrap()
    }

    #[test]
    fn test_largest_region_empty() {
        assert_eq!(largest_region(&[]), None);
    }

    #[test]
    fn test_largest_region_picks_biggest() {
        let regions = [region(0, 0, 10, 10), region(5, 5, 30, 20), region(1, 1, 20, 20)];
        assert_eq!(largest_region(&regions), Some(region(5, 5, 30, 20)));
    }

    #[test]
    fn test_largest_region_tie_keeps_first() {
        let regions = [region(0, 0, 10, 20), region(50, 50, 20, 10)];
        assert_eq!(largest_region(&regions), Some(region(0, 0, 10, 20)));
    }

    #[test]
    fn test_whole_image_locator() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(64, 48));
        let regions = WholeImageLocator.locate(&img).unwrap();
        assert_eq!(regions, vec![region(0, 0, 64, 48)]);
    }

    #[test]
    fn test_fixed_region_outside_image_finds_nothing() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(32, 32));
        let locator = FixedRegionLocator::new(region(20, 20, 20, 20));
        assert!(locator.locate(&img).unwrap().is_empty());
    }
}
