/// Squared Euclidean distance between two vectors.
///
/// Uses f64 intermediate precision. Returns `f64::INFINITY` on a
/// dimension mismatch so mismatched vectors sort last.
pub fn l2_squared(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return f64::INFINITY;
    }
    let mut sum: f64 = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        let d = *x as f64 - *y as f64;
        sum += d * d;
    }
    sum
}

/// Euclidean (L2) distance between two vectors.
pub fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    l2_squared(a, b).sqrt() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical() {
        assert_eq!(l2_distance(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]), 0.0);
    }

    #[test]
    fn test_three_four_five() {
        let d = l2_distance(&[0.0, 0.0], &[3.0, 4.0]);
        assert!((d - 5.0).abs() < 1e-6, "got {d}");
        assert!((l2_squared(&[0.0, 0.0], &[3.0, 4.0]) - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_symmetric() {
        let a = [0.3, -1.2, 4.0];
        let b = [1.0, 0.5, -2.0];
        assert_eq!(l2_distance(&a, &b), l2_distance(&b, &a));
    }

    #[test]
    fn test_dimension_mismatch() {
        assert!(l2_distance(&[1.0, 0.0], &[1.0, 0.0, 0.0]).is_infinite());
    }
}
