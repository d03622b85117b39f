//! Embedding vector normalization and similarity primitives
//!
//! Every embedding is scaled to unit L2 norm before persistence, so that
//! the inner product of two stored vectors equals their cosine similarity.

use crate::error::{EngineError, Result};

/// Tolerance for treating a vector as unit-normalized
pub const NORMALIZATION_TOLERANCE: f64 = 1e-6;

/// Diagnostic view of a vector's normalization state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VectorDiagnostics {
    /// L2 norm of the vector
    pub norm: f64,
    /// Whether the norm is within tolerance of 1.0
    pub is_normalized: bool,
}

/// Compute the L2 norm of a vector, accumulating in f64 for stability
pub fn l2_norm(v: &[f32]) -> f64 {
    v.iter().map(|&x| x as f64 * x as f64).sum::<f64>().sqrt()
}

/// Scale a vector to unit L2 norm
///
/// Fails on the zero vector and on any vector containing NaN or Inf,
/// since neither has a meaningful direction.
pub fn normalize(v: &[f32]) -> Result<Vec<f32>> {
    if let Some(bad) = v.iter().find(|x| !x.is_finite()) {
        return Err(EngineError::degenerate(format!(
            "vector contains non-finite component {bad}"
        )));
    }
    let norm = l2_norm(v);
    if norm == 0.0 {
        return Err(EngineError::degenerate("cannot normalize zero vector"));
    }
    Ok(v.iter().map(|&x| (x as f64 / norm) as f32).collect())
}

/// Inspect a vector's norm without modifying it
pub fn inspect(v: &[f32]) -> VectorDiagnostics {
    let norm = l2_norm(v);
    VectorDiagnostics {
        norm,
        is_normalized: (1.0 - norm).abs() < NORMALIZATION_TOLERANCE,
    }
}

/// Inner product of two equal-length vectors
pub fn dot(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(EngineError::DimensionMismatch {
            expected: a.len(),
            got: b.len(),
        });
    }
    Ok(a.iter().zip(b.iter()).map(|(x, y)| x * y).sum())
}

/// Negated inner product, the raw distance the ranking is built on.
///
/// Matches pgvector's `<#>` operator: smaller is more similar. Scores
/// surfaced to callers are the negation of this, clamped to [-1, 1].
pub fn neg_inner_product(a: &[f32], b: &[f32]) -> Result<f32> {
    Ok(-dot(a, b)?)
}

/// Similarity score between two unit vectors: negated `<#>`, clamped
pub fn score(query: &[f32], stored: &[f32]) -> Result<f32> {
    Ok((-neg_inner_product(query, stored)?).clamp(-1.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_unit_norm() {
        let v = vec![3.0, 4.0];
        let n = normalize(&v).unwrap();
        assert!((n[0] - 0.6).abs() < 1e-6);
        assert!((n[1] - 0.8).abs() < 1e-6);
        assert!((l2_norm(&n) - 1.0).abs() < NORMALIZATION_TOLERANCE);
    }

    #[test]
    fn test_normalize_high_dimensional() {
        let v: Vec<f32> = (1..=1536).map(|i| i as f32 * 0.001).collect();
        let n = normalize(&v).unwrap();
        assert!((l2_norm(&n) - 1.0).abs() < NORMALIZATION_TOLERANCE);
    }

    #[test]
    fn test_normalize_zero_vector_rejected() {
        let v = vec![0.0, 0.0, 0.0];
        assert!(matches!(
            normalize(&v),
            Err(EngineError::DegenerateVector(_))
        ));
    }

    #[test]
    fn test_normalize_nan_rejected() {
        let v = vec![1.0, f32::NAN, 2.0];
        assert!(matches!(
            normalize(&v),
            Err(EngineError::DegenerateVector(_))
        ));
    }

    #[test]
    fn test_inspect() {
        let raw = inspect(&[3.0, 4.0]);
        assert!((raw.norm - 5.0).abs() < 1e-9);
        assert!(!raw.is_normalized);

        let unit = inspect(&normalize(&[3.0, 4.0]).unwrap());
        assert!(unit.is_normalized);
    }

    #[test]
    fn test_dot_dimension_mismatch() {
        assert!(matches!(
            dot(&[1.0, 0.0], &[1.0]),
            Err(EngineError::DimensionMismatch {
                expected: 2,
                got: 1
            })
        ));
    }

    #[test]
    fn test_score_identical() {
        let q = normalize(&[0.2, 0.4, 0.9]).unwrap();
        assert!((score(&q, &q).unwrap() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_score_opposite() {
        let q = normalize(&[1.0, 0.0]).unwrap();
        let e: Vec<f32> = q.iter().map(|x| -x).collect();
        assert!((score(&q, &e).unwrap() + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_score_in_range() {
        let q = normalize(&[0.3, -0.7, 0.1]).unwrap();
        let e = normalize(&[-0.2, 0.5, 0.9]).unwrap();
        let s = score(&q, &e).unwrap();
        assert!((-1.0..=1.0).contains(&s));
    }

    #[test]
    fn test_neg_inner_product_parity() {
        let q = normalize(&[1.0, 2.0]).unwrap();
        let e = normalize(&[2.0, 1.0]).unwrap();
        let d = neg_inner_product(&q, &e).unwrap();
        assert!((score(&q, &e).unwrap() + d).abs() < 1e-6);
    }
}
