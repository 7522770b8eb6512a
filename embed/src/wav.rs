//! RIFF/WAVE container parsing.
//!
//! Supports integer PCM (8, 16, 24, 32 bit), IEEE float (32 bit) and the
//! WAVE_FORMAT_EXTENSIBLE wrapper around either. Multi-channel audio is
//! downmixed to mono by averaging.

use crate::error::EmbedError;

const FORMAT_PCM: u16 = 0x0001;
const FORMAT_FLOAT: u16 = 0x0003;
const FORMAT_EXTENSIBLE: u16 = 0xFFFE;

/// Sample rates accepted from a header. Anything outside cannot be
/// resampled to 16 kHz with a sane ratio.
pub const SAMPLE_RATES: std::ops::RangeInclusive<u32> = 4_000..=384_000;

/// Decoded mono audio.
#[derive(Debug, Clone, PartialEq)]
pub struct Wav {
    pub sample_rate: u32,
    /// Channel count of the source before downmixing.
    pub channels: u16,
    /// Mono samples in `[-1, 1]`.
    pub samples: Vec<f32>,
}

impl Wav {
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

#[derive(Debug, Clone, Copy)]
struct Fmt {
    format: u16,
    channels: u16,
    sample_rate: u32,
    bits: u16,
}

/// Parse a WAV file held in memory.
pub fn decode(data: &[u8]) -> Result<Wav, EmbedError> {
    if data.is_empty() {
        return Err(EmbedError::EmptyInput);
    }
    if data.len() < 12 || &data[0..4] != b"RIFF" || &data[8..12] != b"WAVE" {
        return Err(EmbedError::InvalidAudio("missing RIFF/WAVE header".into()));
    }

    let mut fmt: Option<Fmt> = None;
    let mut pcm: Option<&[u8]> = None;
    let mut pos = 12;
    while pos + 8 <= data.len() {
        let id = &data[pos..pos + 4];
        let size = u32::from_le_bytes([data[pos + 4], data[pos + 5], data[pos + 6], data[pos + 7]])
            as usize;
        let body_start = pos + 8;
        // Streaming writers leave the size at 0xFFFFFFFF; take what is there.
        let body_end = body_start.saturating_add(size).min(data.len());
        let body = &data[body_start..body_end];

        match id {
            b"fmt " => fmt = Some(parse_fmt(body)?),
            b"data" => pcm = Some(body),
            _ => {}
        }
        if pcm.is_some() && fmt.is_some() {
            break;
        }
        // Chunks are word aligned.
        pos = body_end + (size & 1);
    }

    let fmt = fmt.ok_or_else(|| EmbedError::InvalidAudio("missing fmt chunk".into()))?;
    let pcm = pcm.ok_or_else(|| EmbedError::InvalidAudio("missing data chunk".into()))?;
    if fmt.channels == 0 || fmt.sample_rate == 0 {
        return Err(EmbedError::InvalidAudio(format!(
            "channels={} sample_rate={}",
            fmt.channels, fmt.sample_rate
        )));
    }
    if !SAMPLE_RATES.contains(&fmt.sample_rate) {
        return Err(EmbedError::UnsupportedFormat(format!(
            "sample rate {} Hz outside {}..={} Hz",
            fmt.sample_rate,
            SAMPLE_RATES.start(),
            SAMPLE_RATES.end()
        )));
    }

    let samples = downmix(pcm, fmt)?;
    Ok(Wav {
        sample_rate: fmt.sample_rate,
        channels: fmt.channels,
        samples,
    })
}

fn parse_fmt(body: &[u8]) -> Result<Fmt, EmbedError> {
    if body.len() < 16 {
        return Err(EmbedError::InvalidAudio(format!(
            "fmt chunk is {} bytes",
            body.len()
        )));
    }
    let u16_at = |i: usize| u16::from_le_bytes([body[i], body[i + 1]]);
    let mut format = u16_at(0);
    if format == FORMAT_EXTENSIBLE {
        // The sub-format GUID starts at offset 24; its first two bytes
        // carry the real format tag.
        if body.len() < 26 {
            return Err(EmbedError::InvalidAudio("truncated extensible fmt".into()));
        }
        format = u16_at(24);
    }
    Ok(Fmt {
        format,
        channels: u16_at(2),
        sample_rate: u32::from_le_bytes([body[4], body[5], body[6], body[7]]),
        bits: u16_at(14),
    })
}

fn downmix(pcm: &[u8], fmt: Fmt) -> Result<Vec<f32>, EmbedError> {
    let width = match (fmt.format, fmt.bits) {
        (FORMAT_PCM, 8 | 16 | 24 | 32) | (FORMAT_FLOAT, 32) => fmt.bits as usize / 8,
        (format, bits) => {
            return Err(EmbedError::UnsupportedFormat(format!(
                "format tag {format:#06x} with {bits} bits per sample"
            )));
        }
    };
    let channels = fmt.channels as usize;
    let frame = width * channels;
    let frames = pcm.len() / frame;

    let mut out = Vec::with_capacity(frames);
    for f in pcm.chunks_exact(frame) {
        let sum: f32 = f
            .chunks_exact(width)
            .map(|s| sample_to_f32(s, fmt.format))
            .sum();
        out.push(sum / channels as f32);
    }
    Ok(out)
}

fn sample_to_f32(s: &[u8], format: u16) -> f32 {
    match (format, s.len()) {
        (FORMAT_FLOAT, 4) => f32::from_le_bytes([s[0], s[1], s[2], s[3]]),
        // 8-bit WAV is unsigned.
        (_, 1) => (s[0] as f32 - 128.0) / 128.0,
        (_, 2) => i16::from_le_bytes([s[0], s[1]]) as f32 / 32768.0,
        (_, 3) => {
            let v = i32::from_le_bytes([0, s[0], s[1], s[2]]) >> 8;
            v as f32 / 8_388_608.0
        }
        (_, 4) => i32::from_le_bytes([s[0], s[1], s[2], s[3]]) as f32 / 2_147_483_648.0,
        _ => 0.0,
    }
}

/// Encode mono samples in `[-1, 1]` as a 16-bit PCM WAV file.
pub fn encode_pcm16(samples: &[f32], sample_rate: u32) -> Vec<u8> {
    let data_len = (samples.len() * 2) as u32;
    let mut out = Vec::with_capacity(44 + data_len as usize);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");

    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&FORMAT_PCM.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&(sample_rate * 2).to_le_bytes());
    out.extend_from_slice(&2u16.to_le_bytes());
    out.extend_from_slice(&16u16.to_le_bytes());

    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    for &s in samples {
        let v = (s.clamp(-1.0, 1.0) * 32767.0).round() as i16;
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pcm16_roundtrip() {
        let samples: Vec<f32> = (0..100).map(|i| (i as f32 / 100.0) - 0.5).collect();
        let wav = decode(&encode_pcm16(&samples, 16000)).unwrap();
        assert_eq!(wav.sample_rate, 16000);
        assert_eq!(wav.channels, 1);
        assert_eq!(wav.samples.len(), 100);
        for (a, b) in wav.samples.iter().zip(&samples) {
            assert!((a - b).abs() < 1e-4, "{a} vs {b}");
        }
        assert!((wav.duration_secs() - 100.0 / 16000.0).abs() < 1e-9);
    }

    fn build(format: u16, channels: u16, bits: u16, rate: u32, data: &[u8], extra: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(b"WAVE");
        // An unknown chunk with odd length before fmt exercises padding.
        out.extend_from_slice(b"LIST");
        out.extend_from_slice(&(extra.len() as u32).to_le_bytes());
        out.extend_from_slice(extra);
        if extra.len() % 2 == 1 {
            out.push(0);
        }
        out.extend_from_slice(b"fmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&format.to_le_bytes());
        out.extend_from_slice(&channels.to_le_bytes());
        out.extend_from_slice(&rate.to_le_bytes());
        let block = channels * bits / 8;
        out.extend_from_slice(&(rate * block as u32).to_le_bytes());
        out.extend_from_slice(&block.to_le_bytes());
        out.extend_from_slice(&bits.to_le_bytes());
        out.extend_from_slice(b"data");
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(data);
        out
    }

    #[test]
    fn stereo_is_averaged() {
        let mut data = Vec::new();
        for (l, r) in [(16384i16, 0i16), (-16384, -16384)] {
            data.extend_from_slice(&l.to_le_bytes());
            data.extend_from_slice(&r.to_le_bytes());
        }
        let wav = decode(&build(FORMAT_PCM, 2, 16, 8000, &data, b"abc")).unwrap();
        assert_eq!(wav.channels, 2);
        assert_eq!(wav.samples, vec![0.25, -0.5]);
    }

    #[test]
    fn float_and_wide_int() {
        let data: Vec<u8> = [0.5f32, -1.0].iter().flat_map(|v| v.to_le_bytes()).collect();
        let wav = decode(&build(FORMAT_FLOAT, 1, 32, 44100, &data, b"")).unwrap();
        assert_eq!(wav.samples, vec![0.5, -1.0]);

        // 24-bit: 0x400000 is half scale.
        let data = [0x00, 0x00, 0x40, 0x00, 0x00, 0xC0];
        let wav = decode(&build(FORMAT_PCM, 1, 24, 16000, &data, b"")).unwrap();
        assert_eq!(wav.samples, vec![0.5, -0.5]);

        let wav = decode(&build(FORMAT_PCM, 1, 8, 16000, &[128, 0], b"")).unwrap();
        assert_eq!(wav.samples, vec![0.0, -1.0]);
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(decode(&[]), Err(EmbedError::EmptyInput)));
        assert!(matches!(decode(b"not a wav file"), Err(EmbedError::InvalidAudio(_))));

        let mut no_data = encode_pcm16(&[0.0; 4], 16000);
        no_data.truncate(36);
        assert!(matches!(decode(&no_data), Err(EmbedError::InvalidAudio(_))));
    }

    #[test]
    fn rejects_unsupported_encoding() {
        // A-law
        let wav = build(0x0006, 1, 8, 8000, &[0, 0], b"");
        assert!(matches!(decode(&wav), Err(EmbedError::UnsupportedFormat(_))));
    }

    #[test]
    fn rejects_implausible_sample_rates() {
        let data = [0, 0, 0, 0];
        for rate in [1, 3_999, 384_001, 1_000_003, u32::MAX] {
            let wav = build(FORMAT_PCM, 1, 16, rate, &data, b"");
            assert!(
                matches!(decode(&wav), Err(EmbedError::UnsupportedFormat(_))),
                "rate {rate}"
            );
        }
        for rate in [4_000, 8_000, 44_100, 384_000] {
            let wav = build(FORMAT_PCM, 1, 16, rate, &data, b"");
            assert_eq!(decode(&wav).unwrap().sample_rate, rate);
        }
    }

    #[test]
    fn truncated_data_chunk_is_tolerated() {
        let mut bytes = encode_pcm16(&[0.5; 10], 16000);
        bytes.truncate(bytes.len() - 5);
        let wav = decode(&bytes).unwrap();
        assert_eq!(wav.samples.len(), 7);
    }
}
