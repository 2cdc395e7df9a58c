//! Distance functions used to rank graph nodes.
//!
//! The index is generic over [`Distance`]: any `Fn(&[f32], &[f32]) -> f32` works, as does
//! the built-in [`DistanceMetric`]. A distance must be symmetric, deterministic, and
//! minimal for identical inputs; the construction-time distance cache relies on it.

use crate::vector_ops;

/// A pairwise distance where **lower is better**.
pub trait Distance {
    fn distance(&self, a: &[f32], b: &[f32]) -> f32;
}

impl<F> Distance for F
where
    F: Fn(&[f32], &[f32]) -> f32,
{
    #[inline]
    fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        self(a, b)
    }
}

/// Built-in distance metrics.
///
/// All variants return a distance where **lower is better** (more similar).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum DistanceMetric {
    /// Cosine distance: `1 - cosine_similarity`. Range: \[0, 2\]. A zero vector has
    /// similarity 0 to everything, i.e. distance 1.
    Cosine,
    /// Cosine distance for vectors already normalized to unit length: `1 - dot(a, b)`.
    CosineUnit,
    /// Squared Euclidean distance (L2²). Range: \[0, ∞).
    Euclidean,
    /// Negative dot product: `-dot(a, b)`.
    DotProduct,
}

impl DistanceMetric {
    /// Converts a distance produced by this metric back into a similarity score
    /// (higher is better).
    pub fn similarity(&self, distance: f32) -> f32 {
        match self {
            DistanceMetric::Cosine | DistanceMetric::CosineUnit => 1.0 - distance,
            DistanceMetric::Euclidean => -distance,
            DistanceMetric::DotProduct => -distance,
        }
    }
}

impl Distance for DistanceMetric {
    #[inline]
    fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            DistanceMetric::Cosine => 1.0 - vector_ops::cosine_similarity(a, b),
            DistanceMetric::CosineUnit => 1.0 - vector_ops::cosine_similarity_unit(a, b),
            DistanceMetric::Euclidean => vector_ops::euclidean_sq(a, b),
            DistanceMetric::DotProduct => -vector_ops::dot(a, b),
        }
    }
}
