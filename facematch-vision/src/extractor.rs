use ndarray::{Array2, ArrayView2};

use crate::error::ExtractError;
use crate::face::{CanonicalFace, Embedding};

pub const DEFAULT_INPUT_SIZE: usize = 96;
pub const DEFAULT_WORKING_SIZE: usize = 100;

/// Canonical face image -> unit embedding of a fixed dimension.
///
/// Implementations must be deterministic and stateless so a single
/// instance can be shared across threads without locking.
pub trait FeatureExtractor: Send + Sync {
    /// Expected `(height, width)` of the canonical input.
    fn input_shape(&self) -> (usize, usize);

    /// Length of every embedding this extractor produces.
    fn dimension(&self) -> usize;

    fn extract(&self, face: &CanonicalFace) -> Result<Embedding, ExtractError>;
}

/// Pixel space baseline: resize to the working resolution, flatten
/// row-major, L2-normalize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlattenExtractor {
    input_size: usize,
    working_size: usize,
}

impl FlattenExtractor {
    pub fn new(input_size: usize, working_size: usize) -> Self {
        Self {
            input_size,
            working_size,
        }
    }
}

impl Default for FlattenExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_INPUT_SIZE, DEFAULT_WORKING_SIZE)
    }
}

impl FeatureExtractor for FlattenExtractor {
    fn input_shape(&self) -> (usize, usize) {
        (self.input_size, self.input_size)
    }

    fn dimension(&self) -> usize {
        self.working_size * self.working_size
    }

    fn extract(&self, face: &CanonicalFace) -> Result<Embedding, ExtractError> {
        if face.shape() != self.input_shape() {
            return Err(ExtractError::ShapeMismatch {
                expected: self.input_shape(),
                actual: face.shape(),
            });
        }
        let resized = resize_bilinear(face.pixels(), self.working_size, self.working_size);
        // Standard layout, so iteration order is row-major.
        Embedding::normalize(resized.iter().copied().collect())
    }
}

/// Bilinear resize with half-pixel centers. Equal sizes copy through
/// unchanged.
pub fn resize_bilinear(src: ArrayView2<'_, f32>, out_h: usize, out_w: usize) -> Array2<f32> {
    let (src_h, src_w) = src.dim();
    if (src_h, src_w) == (out_h, out_w) {
        return src.to_owned();
    }
    if src_h == 0 || src_w == 0 {
        return Array2::zeros((out_h, out_w));
    }

    let scale_y = src_h as f32 / out_h as f32;
    let scale_x = src_w as f32 / out_w as f32;

    Array2::from_shape_fn((out_h, out_w), |(y, x)| {
        let in_y = ((y as f32 + 0.5) * scale_y - 0.5).max(0.0);
        let in_x = ((x as f32 + 0.5) * scale_x - 0.5).max(0.0);

        let y0 = (in_y.floor() as usize).min(src_h - 1);
        let x0 = (in_x.floor() as usize).min(src_w - 1);
        let y1 = (y0 + 1).min(src_h - 1);
        let x1 = (x0 + 1).min(src_w - 1);

        let fy = in_y - y0 as f32;
        let fx = in_x - x0 as f32;

        let w00 = (1.0 - fx) * (1.0 - fy);
        let w10 = fx * (1.0 - fy);
        let w01 = (1.0 - fx) * fy;
        let w11 = fx * fy;

        src[[y0, x0]] * w00 + src[[y0, x1]] * w10 + src[[y1, x0]] * w01 + src[[y1, x1]] * w11
    })
}
