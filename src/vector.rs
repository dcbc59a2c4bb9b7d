//! This is the vector math module
//! Provide the Euclidean distance used for identity matching

/// Distance reported for vectors that cannot be compared.
///
/// Embeddings from different models usually differ in length, so a length
/// mismatch must never produce a match, whatever the threshold.
pub const DISTANCE_MISMATCH: f64 = f64::INFINITY;

/// Euclidean (L2) distance
/// dist = sqrt(sum((a[i] - b[i])^2)) for i = 0..a.len()
/// Vectors of different lengths are at `DISTANCE_MISMATCH`
pub fn distance(left: &[f64], right: &[f64]) -> f64 {
    if left.len() != right.len() {
        return DISTANCE_MISMATCH;
    }

    left.iter()
        .zip(right.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

/// Whether two embeddings live in the same space (same, non-zero length).
pub fn is_comparable(left: &[f64], right: &[f64]) -> bool {
    !left.is_empty() && left.len() == right.len()
}

/// Index of the first NaN or infinite component, if any.
pub fn first_non_finite(vector: &[f64]) -> Option<usize> {
    vector.iter().position(|x| !x.is_finite())
}

#[cfg(test)]
mod vector_test {
    use super::*;

    // ========== Distance Tests ==========

    #[test]
    fn test_distance_basic() {
        // ||[0,0] - [3,4]|| = sqrt(9+16) = 5
        let a = vec![0.0, 0.0];
        let b = vec![3.0, 4.0];

        assert!((distance(&a, &b) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_distance_to_self_is_zero() {
        let a = vec![0.3, -1.2, 4.5, 0.0];
        assert_eq!(distance(&a, &a), 0.0);
    }

    #[test]
    fn test_distance_is_symmetric() {
        let a = vec![1.0, 2.0, 3.0];
        let b = vec![-4.0, 0.5, 9.0];

        assert_eq!(distance(&a, &b), distance(&b, &a));
    }

    #[test]
    fn test_distance_negative_values() {
        let a = vec![-1.0, -1.0];
        let b = vec![1.0, 1.0];

        assert!((distance(&a, &b) - 8.0_f64.sqrt()).abs() < 1e-6);
    }

    #[test]
    fn test_distance_small_offset() {
        let a = vec![0.0, 0.0];
        let b = vec![0.05, 0.0];

        assert!((distance(&a, &b) - 0.05).abs() < 1e-6);
    }

    #[test]
    fn test_distance_dimension_mismatch() {
        let a = vec![0.0, 0.0];
        let b = vec![0.0, 0.0, 0.0];

        assert_eq!(distance(&a, &b), DISTANCE_MISMATCH);
        assert_eq!(distance(&b, &a), DISTANCE_MISMATCH);
        assert!(distance(&a, &b).is_infinite());
    }

    #[test]
    fn test_distance_empty_vectors() {
        let a: Vec<f64> = vec![];
        let b: Vec<f64> = vec![];

        assert_eq!(distance(&a, &b), 0.0);
    }

    // ========== Comparability Tests ==========

    #[test]
    fn test_is_comparable() {
        assert!(is_comparable(&[1.0, 2.0], &[3.0, 4.0]));
        assert!(!is_comparable(&[1.0, 2.0], &[3.0]));
        assert!(!is_comparable(&[], &[]));
    }

    #[test]
    fn test_first_non_finite() {
        assert_eq!(first_non_finite(&[0.1, -2.0, 1e300]), None);
        assert_eq!(first_non_finite(&[0.0, f64::NAN, f64::INFINITY]), Some(1));
        assert_eq!(first_non_finite(&[f64::NEG_INFINITY]), Some(0));
        assert_eq!(first_non_finite(&[]), None);
    }
}
