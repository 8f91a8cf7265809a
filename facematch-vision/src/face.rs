use image::{DynamicImage, GenericImageView};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

use crate::error::ExtractError;

/// Allowed drift from 1.0 when accepting an embedding built elsewhere
/// (deserialized, or produced by another extractor).
pub const UNIT_NORM_TOLERANCE: f64 = 1e-4;

/// Axis-aligned face box in source image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl FaceRegion {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Result<Self, ExtractError> {
        if width == 0 || height == 0 {
            return Err(ExtractError::EmptyRegion);
        }
        Ok(Self {
            x,
            y,
            width,
            height,
        })
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// True when the box lies entirely inside a `width` x `height` image.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        let right = self.x.checked_add(self.width);
        let bottom = self.y.checked_add(self.height);
        matches!((right, bottom), (Some(r), Some(b)) if r <= width && b <= height)
    }

    /// Cut this region out of `img`.
    pub fn crop(&self, img: &DynamicImage) -> Result<DynamicImage, ExtractError> {
        if self.width == 0 || self.height == 0 {
            return Err(ExtractError::EmptyRegion);
        }
        let (width, height) = img.dimensions();
        if !self.fits_within(width, height) {
            return Err(ExtractError::RegionOutOfBounds {
                region: *self,
                width,
                height,
            });
        }
        Ok(img.crop_imm(self.x, self.y, self.width, self.height))
    }
}

/// Cropped, resized, single channel face with intensities in `[0, 1]`.
///
/// Row-major `(height, width)` grid. Constructors reject anything else, so
/// extractors can assume a clean input.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalFace {
    pixels: Array2<f32>,
}

impl CanonicalFace {
    pub fn from_array(pixels: Array2<f32>) -> Result<Self, ExtractError> {
        if pixels.is_empty() {
            return Err(ExtractError::EmptyImage);
        }
        for ((row, col), &value) in pixels.indexed_iter() {
            if !(0.0..=1.0).contains(&value) {
                return Err(ExtractError::OutOfRange { row, col, value });
            }
        }
        Ok(Self { pixels })
    }

    /// Resize a decoded face crop to `size` x `size`, convert to luma and
    /// scale to `[0, 1]`.
    pub fn from_image(img: &DynamicImage, size: u32) -> Result<Self, ExtractError> {
        let (width, height) = img.dimensions();
        if size == 0 || width == 0 || height == 0 {
            return Err(ExtractError::EmptyImage);
        }
        let gray = img
            .resize_exact(size, size, image::imageops::FilterType::Triangle)
            .to_luma8();
        let side = size as usize;
        let pixels = Array2::from_shape_fn((side, side), |(y, x)| {
            gray.get_pixel(x as u32, y as u32)[0] as f32 / 255.0
        });
        Ok(Self { pixels })
    }

    pub fn height(&self) -> usize {
        self.pixels.nrows()
    }

    pub fn width(&self) -> usize {
        self.pixels.ncols()
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.height(), self.width())
    }

    pub fn pixels(&self) -> ArrayView2<'_, f32> {
        self.pixels.view()
    }
}

/// Unit length face descriptor. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    vector: Array1<f32>,
}

impl Embedding {
    /// Scale `values` to unit length.
    ///
    /// The norm is accumulated in f64 so long vectors stay within 1e-6 of
    /// unit length after the cast back to f32.
    pub fn normalize(values: Vec<f32>) -> Result<Self, ExtractError> {
        let norm = l2_norm(&values);
        if !norm.is_finite() {
            return Err(ExtractError::NonFinite);
        }
        if norm == 0.0 {
            return Err(ExtractError::DegenerateInput);
        }
        let vector = values
            .into_iter()
            .map(|v| (v as f64 / norm) as f32)
            .collect::<Array1<f32>>();
        Ok(Self { vector })
    }

    /// Accept an already normalized vector, e.g. one read back from disk.
    pub fn from_unit(values: Vec<f32>) -> Result<Self, ExtractError> {
        let norm = l2_norm(&values);
        if !norm.is_finite() {
            return Err(ExtractError::NonFinite);
        }
        if (norm - 1.0).abs() > UNIT_NORM_TOLERANCE {
            return Err(ExtractError::NotUnitNorm { norm });
        }
        Ok(Self {
            vector: Array1::from(values),
        })
    }

    pub fn dimension(&self) -> usize {
        self.vector.len()
    }

    pub fn view(&self) -> ArrayView1<'_, f32> {
        self.vector.view()
    }

    pub fn to_vec(&self) -> Vec<f32> {
        self.vector.to_vec()
    }

    pub fn norm(&self) -> f64 {
        self.vector
            .iter()
            .map(|&v| (v as f64) * (v as f64))
            .sum::<f64>()
            .sqrt()
    }

    /// Euclidean distance. Fails unless both sides share a dimension.
    pub fn distance(&self, other: &Embedding) -> Result<f64, ExtractError> {
        if self.dimension() != other.dimension() {
            return Err(ExtractError::DimensionMismatch {
                expected: self.dimension(),
                actual: other.dimension(),
            });
        }
        Ok(self
            .vector
            .iter()
            .zip(other.vector.iter())
            .map(|(&a, &b)| {
                let d = a as f64 - b as f64;
                d * d
            })
            .sum::<f64>()
            .sqrt())
    }
}

fn l2_norm(values: &[f32]) -> f64 {
    values
        .iter()
        .map(|&v| (v as f64) * (v as f64))
        .sum::<f64>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use image::{Rgb, RgbImage};
    use rstest::rstest;

    #[test]
    fn test_region_rejects_empty() {
        assert_eq!(FaceRegion::new(0, 0, 0, 10), Err(ExtractError::EmptyRegion));
        assert_eq!(FaceRegion::new(0, 0, 10, 0), Err(ExtractError::EmptyRegion));
    }

    #[rstest]
    #[case(0, 0, 100, 50, true)]
    #[case(10, 10, 90, 40, true)]
    #[case(10, 10, 91, 40, false)]
    #[case(0, 1, 100, 50, false)]
    #[case(u32::MAX, 0, 1, 1, false)]
    fn test_region_fits_within(
        #[case] x: u32,
        #[case] y: u32,
        #[case] w: u32,
        #[case] h: u32,
        #[case] expected: bool,
    ) {
        let region = FaceRegion::new(x, y, w, h).unwrap();
        assert_eq!(region.fits_within(100, 50), expected);
    }

    #[test]
    fn test_crop_out_of_bounds() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(20, 20));
        let region = FaceRegion::new(15, 15, 10, 10).unwrap();
        assert!(matches!(
            region.crop(&img),
            Err(ExtractError::RegionOutOfBounds { width: 20, height: 20, .. })
        ));
    }

    #[test]
    fn test_crop_dimensions() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(40, 30));
        let region = FaceRegion::new(5, 5, 12, 8).unwrap();
        let face = region.crop(&img).unwrap();
        assert_eq!(face.dimensions(), (12, 8));
    }

    #[test]
    fn test_canonical_from_image_white() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(50, 40, Rgb([255, 255, 255])));
        let face = CanonicalFace::from_image(&img, 96).unwrap();
        assert_eq!(face.shape(), (96, 96));
        for &v in face.pixels().iter() {
            assert_abs_diff_eq!(v, 1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_canonical_from_array_rejects_out_of_range() {
        let mut pixels = Array2::<f32>::zeros((3, 3));
        pixels[[1, 2]] = 1.5;
        assert_eq!(
            CanonicalFace::from_array(pixels),
            Err(ExtractError::OutOfRange {
                row: 1,
                col: 2,
                value: 1.5
            })
        );
    }

    #[test]
    fn test_canonical_from_array_rejects_nan() {
        let mut pixels = Array2::<f32>::zeros((2, 2));
        pixels[[0, 0]] = f32::NAN;
        assert!(matches!(
            CanonicalFace::from_array(pixels),
            Err(ExtractError::OutOfRange { row: 0, col: 0, .. })
        ));
    }

    #[test]
    fn test_canonical_from_array_rejects_empty() {
        let pixels = Array2::<f32>::zeros((0, 4));
        assert_eq!(
            CanonicalFace::from_array(pixels),
            Err(ExtractError::EmptyImage)
        );
    }

    #[test]
    fn test_normalize_unit_vector() {
        let e = Embedding::normalize(vec![3.0, 4.0]).unwrap();
        assert_abs_diff_eq!(e.view()[0], 0.6, epsilon = 1e-6);
        assert_abs_diff_eq!(e.view()[1], 0.8, epsilon = 1e-6);
        assert_abs_diff_eq!(e.norm(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_normalize_zero_vector_is_degenerate() {
        assert_eq!(
            Embedding::normalize(vec![0.0; 8]),
            Err(ExtractError::DegenerateInput)
        );
    }

    #[test]
    fn test_normalize_rejects_infinite() {
        assert_eq!(
            Embedding::normalize(vec![f32::INFINITY, 1.0]),
            Err(ExtractError::NonFinite)
        );
    }

    #[test]
    fn test_from_unit_rejects_unnormalized() {
        assert!(matches!(
            Embedding::from_unit(vec![1.0, 1.0]),
            Err(ExtractError::NotUnitNorm { .. })
        ));
        assert!(Embedding::from_unit(vec![0.6, 0.8]).is_ok());
    }

    #[test]
    fn test_self_distance_is_zero() {
        let e = Embedding::normalize(vec![0.1, 0.7, 0.2, 0.9]).unwrap();
        assert_eq!(e.distance(&e).unwrap(), 0.0);
    }

    #[test]
    fn test_orthogonal_distance() {
        let a = Embedding::normalize(vec![1.0, 0.0]).unwrap();
        let b = Embedding::normalize(vec![0.0, 1.0]).unwrap();
        assert_abs_diff_eq!(a.distance(&b).unwrap(), 2f64.sqrt(), epsilon = 1e-9);
        assert_eq!(a.distance(&b), b.distance(&a));
    }

    #[test]
    fn test_distance_rejects_mismatched_dimensions() {
        let a = Embedding::normalize(vec![1.0, 0.0]).unwrap();
        let b = Embedding::normalize(vec![1.0, 0.0, 5.0]).unwrap();
        assert_eq!(
            a.distance(&b),
            Err(ExtractError::DimensionMismatch {
                expected: 2,
                actual: 3
            })
        );
    }
}
