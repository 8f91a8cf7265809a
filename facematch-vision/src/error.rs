use thiserror::Error;

use crate::face::FaceRegion;

/// Failures raised while turning pixels into an embedding.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractError {
    #[error("face image reduces to a zero vector")]
    DegenerateInput,
    #[error("face image is {actual:?} (h, w), expected {expected:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },
    #[error("pixel ({row}, {col}) = {value} is outside [0, 1]")]
    OutOfRange { row: usize, col: usize, value: f32 },
    #[error("image has no pixels")]
    EmptyImage,
    #[error("face region has zero width or height")]
    EmptyRegion,
    #[error("face region {region:?} exceeds image bounds {width}x{height}")]
    RegionOutOfBounds {
        region: FaceRegion,
        width: u32,
        height: u32,
    },
    #[error("embedding norm {norm} is not 1")]
    NotUnitNorm { norm: f64 },
    #[error("embedding contains non-finite values")]
    NonFinite,
    #[error("embedding has {actual} dimensions, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}
