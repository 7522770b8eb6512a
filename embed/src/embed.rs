use crate::error::EmbedError;

/// AudioEmbedder converts an audio clip into a dense float32 vector.
///
/// The same bytes must always yield the same vector, and every vector has
/// exactly [`AudioEmbedder::dimension`] elements. Implementations must be
/// safe for concurrent use (Send + Sync).
#[async_trait::async_trait]
pub trait AudioEmbedder: Send + Sync {
    /// Return the embedding vector for one encoded clip (a WAV file).
    async fn embed(&self, audio: &[u8]) -> Result<Vec<f32>, EmbedError>;

    /// Return the dimensionality of the output vectors.
    fn dimension(&self) -> usize;
}

/// Scale `v` to unit Euclidean length. A zero vector is left unchanged.
pub fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| (*x as f64) * (*x as f64)).sum::<f64>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x = (*x as f64 / norm) as f32;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_unit_length() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn normalize_zero_is_noop() {
        let mut v = vec![0.0; 4];
        l2_normalize(&mut v);
        assert_eq!(v, vec![0.0; 4]);
    }
}
