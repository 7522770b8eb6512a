//! Radix-2 FFT with precomputed twiddles, sized once per extractor.

use std::f64::consts::PI;

/// A planned real-input FFT of a fixed power-of-two length.
pub struct Fft {
    n: usize,
    rev: Vec<usize>,
    cos: Vec<f64>,
    sin: Vec<f64>,
}

impl Fft {
    /// Plans an FFT of length `n`, which must be a power of two.
    pub fn new(n: usize) -> Self {
        assert!(n.is_power_of_two(), "fft size {n} is not a power of two");
        let bits = n.trailing_zeros();
        let rev = (0..n)
            .map(|i| if bits == 0 { 0 } else { i.reverse_bits() >> (usize::BITS - bits) })
            .collect();
        let half = n / 2;
        let cos = (0..half).map(|k| (-2.0 * PI * k as f64 / n as f64).cos()).collect();
        let sin = (0..half).map(|k| (-2.0 * PI * k as f64 / n as f64).sin()).collect();
        Self { n, rev, cos, sin }
    }

    pub fn len(&self) -> usize {
        self.n
    }

    /// Computes `|X[k]|^2` for `k in 0..=n/2` of the real signal `input`,
    /// zero padded to `n`. `re` and `im` are scratch buffers of length `n`.
    pub fn power_spectrum(&self, input: &[f64], re: &mut [f64], im: &mut [f64], out: &mut [f64]) {
        for i in 0..self.n {
            re[self.rev[i]] = input.get(i).copied().unwrap_or(0.0);
            im[i] = 0.0;
        }
        self.butterflies(re, im);
        for (k, p) in out.iter_mut().enumerate().take(self.n / 2 + 1) {
            *p = re[k] * re[k] + im[k] * im[k];
        }
    }

    fn butterflies(&self, re: &mut [f64], im: &mut [f64]) {
        let mut size = 2;
        while size <= self.n {
            let half = size / 2;
            let stride = self.n / size;
            for start in (0..self.n).step_by(size) {
                for k in 0..half {
                    let (wr, wi) = (self.cos[k * stride], self.sin[k * stride]);
                    let u = start + k;
                    let v = u + half;
                    let tr = wr * re[v] - wi * im[v];
                    let ti = wr * im[v] + wi * re[v];
                    re[v] = re[u] - tr;
                    im[v] = im[u] - ti;
                    re[u] += tr;
                    im[u] += ti;
                }
            }
            size *= 2;
        }
    }
}
