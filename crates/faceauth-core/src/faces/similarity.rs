use thiserror::Error;

use crate::faces::embedding::Embedding;

/// Cosine similarity above which two embeddings are treated as the same face.
pub const ACCEPTANCE_THRESHOLD: f64 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SimilarityError {
    #[error("embedding length mismatch ({left} vs {right})")]
    DimensionMismatch { left: usize, right: usize },
    #[error("cosine similarity undefined for zero-magnitude or non-finite vector")]
    DegenerateVector,
}

pub fn cosine_similarity(lhs: &[f64], rhs: &[f64]) -> Result<f64, SimilarityError> {
    if lhs.len() != rhs.len() {
        return Err(SimilarityError::DimensionMismatch {
            left: lhs.len(),
            right: rhs.len(),
        });
    }

    let lhs_scale = max_abs(lhs).ok_or(SimilarityError::DegenerateVector)?;
    let rhs_scale = max_abs(rhs).ok_or(SimilarityError::DegenerateVector)?;

    // Scaled by the largest component so the squares stay in range.
    let mut dot = 0.0;
    let mut norm_lhs = 0.0;
    let mut norm_rhs = 0.0;

    for (l, r) in lhs.iter().zip(rhs.iter()) {
        let l = l / lhs_scale;
        let r = r / rhs_scale;
        dot += l * r;
        norm_lhs += l * l;
        norm_rhs += r * r;
    }

    let similarity = dot / (norm_lhs.sqrt() * norm_rhs.sqrt());
    if !similarity.is_finite() {
        return Err(SimilarityError::DegenerateVector);
    }
    // Rounding can push aligned vectors a hair past the unit interval.
    Ok(similarity.clamp(-1.0, 1.0))
}

/// Largest absolute component, or `None` when the vector is all zeros or
/// carries a non-finite value.
pub(crate) fn max_abs(values: &[f64]) -> Option<f64> {
    let mut largest = 0.0_f64;
    for value in values {
        if !value.is_finite() {
            return None;
        }
        largest = largest.max(value.abs());
    }
    (largest > 0.0).then_some(largest)
}

pub fn similarity(lhs: &Embedding, rhs: &Embedding) -> Result<f64, SimilarityError> {
    cosine_similarity(lhs.as_slice(), rhs.as_slice())
}
