//! Log mel filterbank features.
//!
//! Frames are 25 ms Hamming windows with a 10 ms hop over 16 kHz audio,
//! pre-emphasised, transformed with a 512-point FFT and reduced to
//! `num_mels` log energies.

mod fft;
mod mel;

use fft::Fft;
use mel::MelFilter;

/// Energies are floored before the log so silence stays finite.
const ENERGY_FLOOR: f64 = 1e-10;

#[derive(Debug, Clone)]
pub struct FbankConfig {
    pub sample_rate: usize,
    pub window_size: usize,
    pub hop_size: usize,
    pub fft_size: usize,
    pub num_mels: usize,
    pub low_freq: f64,
    pub high_freq: f64,
    pub pre_emphasis: f64,
}

impl Default for FbankConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            window_size: 400,
            hop_size: 160,
            fft_size: 512,
            num_mels: 128,
            low_freq: 20.0,
            high_freq: 7600.0,
            pre_emphasis: 0.97,
        }
    }
}

/// Filterbank extractor. Immutable once built; share it freely.
pub struct Fbank {
    cfg: FbankConfig,
    window: Vec<f64>,
    filters: Vec<MelFilter>,
    fft: Fft,
}

impl Fbank {
    pub fn new(cfg: FbankConfig) -> Self {
        let fft_size = cfg.fft_size.max(cfg.window_size).next_power_of_two();
        let window = mel::hamming(cfg.window_size);
        let filters = mel::filter_bank(
            cfg.num_mels,
            fft_size,
            cfg.sample_rate,
            cfg.low_freq,
            cfg.high_freq,
        );
        Self {
            cfg,
            window,
            filters,
            fft: Fft::new(fft_size),
        }
    }

    pub fn config(&self) -> &FbankConfig {
        &self.cfg
    }

    /// Fewest samples that produce one frame.
    pub fn min_samples(&self) -> usize {
        self.cfg.window_size
    }

    /// Number of frames produced for `n` samples.
    pub fn num_frames(&self, n: usize) -> usize {
        if n < self.cfg.window_size {
            0
        } else {
            (n - self.cfg.window_size) / self.cfg.hop_size + 1
        }
    }

    /// Extracts `[frames][num_mels]` log energies from samples in `[-1, 1]`.
    pub fn extract(&self, pcm: &[f32]) -> Vec<Vec<f32>> {
        let n = self.fft.len();
        let mut frame = vec![0.0f64; self.cfg.window_size];
        let (mut re, mut im) = (vec![0.0f64; n], vec![0.0f64; n]);
        let mut power = vec![0.0f64; n / 2 + 1];

        (0..self.num_frames(pcm.len()))
            .map(|t| {
                let start = t * self.cfg.hop_size;
                for (i, (out, w)) in frame.iter_mut().zip(&self.window).enumerate() {
                    let j = start + i;
                    let prev = if j > 0 { pcm[j - 1] as f64 } else { 0.0 };
                    *out = (pcm[j] as f64 - self.cfg.pre_emphasis * prev) * w;
                }
                self.fft.power_spectrum(&frame, &mut re, &mut im, &mut power);
                self.filters
                    .iter()
                    .map(|f| f.apply(&power).max(ENERGY_FLOOR).ln() as f32)
                    .collect()
            })
            .collect()
    }
}

impl Default for Fbank {
    fn default() -> Self {
        Self::new(FbankConfig::default())
    }
}
