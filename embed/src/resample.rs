//! Sample rate conversion of mono clips with rubato.

use rubato::{FftFixedInOut, Resampler};

use crate::error::EmbedError;

/// Preferred input block in frames; rubato may round it.
const CHUNK_SIZE: usize = 1024;

/// Resample a whole mono clip from `from` Hz to `to` Hz.
///
/// The output has `ceil(len * to / from)` samples and is aligned with the
/// input (the resampler delay is removed).
pub fn resample(samples: &[f32], from: u32, to: u32) -> Result<Vec<f32>, EmbedError> {
    if from == 0 || to == 0 {
        return Err(EmbedError::Resample(format!("invalid rates {from} -> {to}")));
    }
    if from == to || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let mut rs = FftFixedInOut::<f32>::new(from as usize, to as usize, CHUNK_SIZE, 1)?;
    let delay = rs.output_delay();
    let expected = (samples.len() as u64 * to as u64).div_ceil(from as u64) as usize;

    let mut out = Vec::with_capacity(expected + delay + rs.output_frames_max());
    let mut pos = 0;
    while out.len() < expected + delay {
        let need = rs.input_frames_next();
        // Past the end of the clip the input is zero padded.
        let mut block = vec![0.0f32; need];
        if pos < samples.len() {
            let end = (pos + need).min(samples.len());
            block[..end - pos].copy_from_slice(&samples[pos..end]);
        }
        pos += need;

        let wave = rs.process(std::slice::from_ref(&block), None)?;
        out.extend_from_slice(&wave[0]);
    }

    out.drain(..delay);
    out.truncate(expected);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn sine(freq: f64, rate: u32, n: usize) -> Vec<f32> {
        (0..n)
            .map(|i| (2.0 * PI * freq * i as f64 / rate as f64).sin() as f32 * 0.5)
            .collect()
    }

    #[test]
    fn same_rate_is_copy() {
        let s = sine(440.0, 16000, 100);
        assert_eq!(resample(&s, 16000, 16000).unwrap(), s);
    }

    #[test]
    fn output_length() {
        let s = sine(440.0, 44100, 44100);
        let out = resample(&s, 44100, 16000).unwrap();
        assert_eq!(out.len(), 16000);

        let s = sine(440.0, 8000, 1001);
        let out = resample(&s, 8000, 16000).unwrap();
        assert_eq!(out.len(), 2002);
    }

    #[test]
    fn preserves_tone_energy() {
        let s = sine(1000.0, 48000, 48000);
        let out = resample(&s, 48000, 16000).unwrap();
        // Skip the edges where the filter rings.
        let mid = &out[2000..14000];
        let rms = (mid.iter().map(|v| v * v).sum::<f32>() / mid.len() as f32).sqrt();
        let want = 0.5 / 2f32.sqrt();
        assert!((rms - want).abs() < 0.02, "rms {rms}, want {want}");
    }

    #[test]
    fn zero_rate_rejected() {
        assert!(matches!(resample(&[0.0], 0, 16000), Err(EmbedError::Resample(_))));
    }
}
