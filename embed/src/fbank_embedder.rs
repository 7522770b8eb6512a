use std::sync::Arc;

use crate::embed::{AudioEmbedder, l2_normalize};
use crate::error::EmbedError;
use crate::fbank::{Fbank, FbankConfig};
use crate::resample::resample;
use crate::wav;

/// Statistics pooled per mel bin: mean, std, min, max, delta mean, delta std.
const STATS: usize = 6;

/// Output dimension with the default 128-bin filterbank.
pub const FBANK_EMBEDDING_DIM: usize = 128 * STATS;

/// Local deterministic embedder built on pooled log-mel statistics.
///
/// The clip is decoded, downmixed, resampled to the filterbank rate and
/// turned into frames; each mel bin then contributes six statistics over
/// time. The concatenation is L2 normalised so distances between clips
/// fall in `[0, 2]`.
#[derive(Clone)]
pub struct FbankEmbedder {
    fbank: Arc<Fbank>,
}

impl FbankEmbedder {
    pub fn new() -> Self {
        Self::with_config(FbankConfig::default())
    }

    pub fn with_config(cfg: FbankConfig) -> Self {
        Self {
            fbank: Arc::new(Fbank::new(cfg)),
        }
    }

    /// Synchronous embedding, used by the async path on a blocking thread.
    pub fn embed_wav(&self, audio: &[u8]) -> Result<Vec<f32>, EmbedError> {
        let clip = wav::decode(audio)?;
        let rate = self.fbank.config().sample_rate as u32;
        let pcm = resample(&clip.samples, clip.sample_rate, rate)?;
        self.embed_pcm(&pcm)
    }

    /// Embeds mono samples already at the filterbank rate.
    pub fn embed_pcm(&self, pcm: &[f32]) -> Result<Vec<f32>, EmbedError> {
        if pcm.is_empty() {
            return Err(EmbedError::EmptyInput);
        }
        let min = self.fbank.min_samples();
        if pcm.len() < min {
            return Err(EmbedError::TooShort {
                min_samples: min,
                got: pcm.len(),
            });
        }
        let frames = self.fbank.extract(pcm);
        let mut v = pool(&frames, self.fbank.config().num_mels);
        l2_normalize(&mut v);
        Ok(v)
    }
}

impl Default for FbankEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl AudioEmbedder for FbankEmbedder {
    async fn embed(&self, audio: &[u8]) -> Result<Vec<f32>, EmbedError> {
        if audio.is_empty() {
            return Err(EmbedError::EmptyInput);
        }
        let this = self.clone();
        let audio = audio.to_vec();
        tokio::task::spawn_blocking(move || this.embed_wav(&audio))
            .await
            .map_err(|e| EmbedError::Worker(e.to_string()))?
    }

    fn dimension(&self) -> usize {
        self.fbank.config().num_mels * STATS
    }
}

/// Pools `[T][mels]` into `[mels * 6]`, laid out statistic-major.
fn pool(frames: &[Vec<f32>], mels: usize) -> Vec<f32> {
    let mut out = vec![0.0f32; mels * STATS];
    let t = frames.len();
    if t == 0 {
        return out;
    }

    for m in 0..mels {
        let col: Vec<f64> = frames.iter().map(|f| f[m] as f64).collect();
        let (mean, std) = mean_std(&col);
        let min = col.iter().copied().fold(f64::INFINITY, f64::min);
        let max = col.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        let delta: Vec<f64> = col.windows(2).map(|w| w[1] - w[0]).collect();
        let (dmean, dstd) = mean_std(&delta);

        for (s, v) in [mean, std, min, max, dmean, dstd].into_iter().enumerate() {
            out[s * mels + m] = v as f32;
        }
    }
    out
}

fn mean_std(xs: &[f64]) -> (f64, f64) {
    if xs.is_empty() {
        return (0.0, 0.0);
    }
    let n = xs.len() as f64;
    let mean = xs.iter().sum::<f64>() / n;
    let var = xs.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / n;
    (mean, var.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::f64::consts::PI;

    fn clip(tones: &[f64], seed: u64, rate: u32, secs: f64) -> Vec<f32> {
        let n = (rate as f64 * secs) as usize;
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n)
            .map(|i| {
                let t = i as f64 / rate as f64;
                let s: f64 = tones.iter().map(|f| (2.0 * PI * f * t).sin()).sum::<f64>() * 0.2;
                (s + rng.random_range(-0.05..0.05)) as f32
            })
            .collect()
    }

    fn distance(a: &[f32], b: &[f32]) -> f32 {
        a.iter()
            .zip(b)
            .map(|(x, y)| (x - y) * (x - y))
            .sum::<f32>()
            .sqrt()
    }

    #[test]
    fn dimension_and_norm() {
        let e = FbankEmbedder::new();
        assert_eq!(e.dimension(), FBANK_EMBEDDING_DIM);
        let v = e
            .embed_wav(&wav::encode_pcm16(&clip(&[440.0], 1, 16000, 1.0), 16000))
            .unwrap();
        assert_eq!(v.len(), 768);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[test]
    fn deterministic() {
        let e = FbankEmbedder::new();
        let bytes = wav::encode_pcm16(&clip(&[300.0, 900.0], 2, 16000, 0.5), 16000);
        assert_eq!(e.embed_wav(&bytes).unwrap(), e.embed_wav(&bytes).unwrap());
    }

    #[test]
    fn near_duplicate_is_closer_than_different_clip() {
        let e = FbankEmbedder::new();
        let a = clip(&[440.0, 1320.0], 10, 16000, 1.0);
        let mut rng = StdRng::seed_from_u64(99);
        let a2: Vec<f32> = a.iter().map(|s| s + rng.random_range(-0.005..0.005)).collect();
        let b = clip(&[2500.0, 5200.0], 20, 16000, 1.0);

        let va = e.embed_pcm(&a).unwrap();
        let va2 = e.embed_pcm(&a2).unwrap();
        let vb = e.embed_pcm(&b).unwrap();
        assert!(distance(&va, &va2) < distance(&va, &vb));
    }

    #[test]
    fn other_rates_are_resampled() {
        let e = FbankEmbedder::new();
        let v = e
            .embed_wav(&wav::encode_pcm16(&clip(&[440.0], 3, 44100, 0.5), 44100))
            .unwrap();
        assert_eq!(v.len(), 768);
    }

    #[test]
    fn too_short() {
        let e = FbankEmbedder::new();
        let bytes = wav::encode_pcm16(&[0.1; 100], 16000);
        assert!(matches!(
            e.embed_wav(&bytes),
            Err(EmbedError::TooShort { min_samples: 400, got: 100 })
        ));
    }

    #[tokio::test]
    async fn async_path() {
        let e = FbankEmbedder::new();
        assert!(matches!(e.embed(&[]).await, Err(EmbedError::EmptyInput)));
        assert!(matches!(e.embed(b"junk").await, Err(EmbedError::InvalidAudio(_))));
        let bytes = wav::encode_pcm16(&clip(&[440.0], 4, 16000, 0.3), 16000);
        assert_eq!(e.embed(&bytes).await.unwrap().len(), 768);
    }
}
