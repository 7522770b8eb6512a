//! Mel scale and triangular filters.

use std::f64::consts::PI;

pub fn hamming(n: usize) -> Vec<f64> {
    match n {
        0 => vec![],
        1 => vec![1.0],
        _ => (0..n)
            .map(|i| 0.54 - 0.46 * (2.0 * PI * i as f64 / (n - 1) as f64).cos())
            .collect(),
    }
}

pub fn hz_to_mel(hz: f64) -> f64 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

pub fn mel_to_hz(mel: f64) -> f64 {
    700.0 * (10f64.powf(mel / 2595.0) - 1.0)
}

/// One triangular filter stored sparsely: `weights[i]` applies to power
/// bin `start + i`.
#[derive(Debug, Clone)]
pub struct MelFilter {
    pub start: usize,
    pub weights: Vec<f64>,
}

impl MelFilter {
    pub fn apply(&self, power: &[f64]) -> f64 {
        self.weights
            .iter()
            .zip(&power[self.start..])
            .map(|(w, p)| w * p)
            .sum()
    }
}

/// Builds `num_mels` filters evenly spaced on the mel scale between
/// `low_hz` and `high_hz`, over `fft_size / 2 + 1` power bins.
///
/// Neighbouring filters are forced at least one bin apart so no filter is
/// empty, even when there are more mels than low-frequency bins.
pub fn filter_bank(
    num_mels: usize,
    fft_size: usize,
    sample_rate: usize,
    low_hz: f64,
    high_hz: f64,
) -> Vec<MelFilter> {
    let bins = fft_size / 2 + 1;
    let (lo, hi) = (hz_to_mel(low_hz), hz_to_mel(high_hz));
    let step = (hi - lo) / (num_mels + 1) as f64;

    let mut edges: Vec<usize> = (0..num_mels + 2)
        .map(|i| {
            let hz = mel_to_hz(lo + step * i as f64);
            ((hz * fft_size as f64 / sample_rate as f64).round() as usize).min(bins - 1)
        })
        .collect();
    for i in 1..edges.len() {
        edges[i] = edges[i].max(edges[i - 1] + 1).min(bins - 1);
    }

    edges
        .windows(3)
        .map(|w| {
            let (l, c, r) = (w[0], w[1], w[2]);
            let weights = (l..=r)
                .map(|k| {
                    if k < c {
                        (k - l) as f64 / (c - l) as f64
                    } else if k == c {
                        1.0
                    } else {
                        (r - k) as f64 / (r - c) as f64
                    }
                })
                .collect();
            MelFilter { start: l, weights }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hamming_shape() {
        let w = hamming(400);
        assert!((w[0] - 0.08).abs() < 1e-9);
        assert!((w[0] - w[399]).abs() < 1e-12);
        assert!(w[199] > 0.99);
    }

    #[test]
    fn mel_roundtrip() {
        for hz in [0.0, 300.0, 1000.0, 7600.0] {
            assert!((mel_to_hz(hz_to_mel(hz)) - hz).abs() < 1e-6);
        }
    }

    #[test]
    fn bank_covers_every_mel() {
        let bank = filter_bank(128, 512, 16000, 20.0, 7600.0);
        assert_eq!(bank.len(), 128);
        for f in &bank {
            assert!(f.weights.iter().any(|w| *w > 0.0));
            assert!(f.start + f.weights.len() <= 257);
            assert!(f.weights.iter().all(|w| (0.0..=1.0).contains(w)));
        }
        // Centers increase.
        let peaks: Vec<usize> = bank
            .iter()
            .map(|f| {
                f.start
                    + f.weights
                        .iter()
                        .enumerate()
                        .max_by(|a, b| a.1.total_cmp(b.1))
                        .map_or(0, |(i, _)| i)
            })
            .collect();
        assert!(peaks.windows(2).all(|p| p[0] < p[1]));
    }
}
