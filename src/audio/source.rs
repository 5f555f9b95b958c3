use std::io::{ErrorKind, Read};

use anyhow::{bail, Context};

use crate::error::{Result, TuneError};

/// Blocking supplier of fixed-size mono PCM blocks.
///
/// `read_block` returns `frame_size` samples while the source is active. The
/// final block before it goes inactive may be short or empty.
pub trait AudioSource {
    fn sample_rate(&self) -> u32;
    fn is_active(&self) -> bool;
    fn read_block(&mut self) -> Result<Vec<i16>>;
}

/// Raw signed 16-bit little-endian mono PCM from any reader, e.g. a piped
/// `arecord -f S16_LE -c 1`.
pub struct PcmReader<R: Read> {
    reader: R,
    sample_rate: u32,
    bytes: Vec<u8>,
    active: bool,
}

impl<R: Read> PcmReader<R> {
    pub fn new(reader: R, sample_rate: u32, frame_size: usize) -> Self {
        Self {
            reader,
            sample_rate,
            bytes: vec![0; frame_size * 2],
            active: true,
        }
    }
}

impl<R: Read> AudioSource for PcmReader<R> {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn read_block(&mut self) -> Result<Vec<i16>> {
        let mut filled = 0;
        while filled < self.bytes.len() {
            match self.reader.read(&mut self.bytes[filled..]) {
                Ok(0) => {
                    self.active = false;
                    break;
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.active = false;
                    return Err(TuneError::device("audio input", e));
                }
            }
        }

        Ok(self.bytes[..filled - filled % 2]
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect())
    }
}

/// One step of a tone script. A frequency of zero is silence.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tone {
    pub freq_hz: f32,
    pub seconds: f32,
}

/// Parses `"220:0.5,0:0.25,330:1"` into tones.
pub fn parse_tones(script: &str) -> anyhow::Result<Vec<Tone>> {
    let mut tones = Vec::new();
    for part in script.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (freq, secs) = part
            .split_once(':')
            .with_context(|| format!("Tone '{}' is not FREQ:SECONDS", part))?;
        let freq_hz: f32 = freq
            .trim()
            .parse()
            .with_context(|| format!("Bad tone frequency '{}'", freq))?;
        let seconds: f32 = secs
            .trim()
            .parse()
            .with_context(|| format!("Bad tone duration '{}'", secs))?;
        if freq_hz < 0.0 || seconds < 0.0 {
            bail!("Tone '{}' must not be negative", part);
        }
        tones.push(Tone { freq_hz, seconds });
    }
    if tones.is_empty() {
        bail!("Tone script is empty");
    }
    Ok(tones)
}

/// Synthesized sine tones, for demos and offline runs.
pub struct ToneSource {
    tones: Vec<Tone>,
    sample_rate: u32,
    frame_size: usize,
    amplitude: f32,
    current: usize,
    remaining: usize,
    phase: f32,
}

impl ToneSource {
    pub fn new(tones: Vec<Tone>, sample_rate: u32, frame_size: usize, amplitude: i16) -> Self {
        let mut source = Self {
            tones,
            sample_rate,
            frame_size,
            amplitude: f32::from(amplitude),
            current: 0,
            remaining: 0,
            phase: 0.0,
        };
        source.remaining = source.samples_for(0);
        source.skip_finished();
        source
    }

    fn samples_for(&self, index: usize) -> usize {
        self.tones
            .get(index)
            .map_or(0, |t| (t.seconds * self.sample_rate as f32).round() as usize)
    }

    fn skip_finished(&mut self) {
        while self.remaining == 0 && self.current < self.tones.len() {
            self.current += 1;
            self.remaining = self.samples_for(self.current);
        }
    }
}

impl AudioSource for ToneSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn is_active(&self) -> bool {
        self.current < self.tones.len()
    }

    fn read_block(&mut self) -> Result<Vec<i16>> {
        let mut block = Vec::with_capacity(self.frame_size);
        while block.len() < self.frame_size && self.is_active() {
            let freq = self.tones[self.current].freq_hz;
            let sample = if freq > 0.0 {
                self.amplitude * (2.0 * std::f32::consts::PI * self.phase).sin()
            } else {
                0.0
            };
            block.push(sample as i16);
            self.phase = (self.phase + freq / self.sample_rate as f32).fract();
            self.remaining -= 1;
            self.skip_finished();
        }
        Ok(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn pcm(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    #[test]
    fn pcm_reader_splits_into_blocks() {
        let bytes = pcm(&[1, -2, 3, -4, 5]);
        let mut source = PcmReader::new(Cursor::new(bytes), 8000, 2);
        assert_eq!(source.read_block().unwrap(), vec![1, -2]);
        assert_eq!(source.read_block().unwrap(), vec![3, -4]);
        assert!(source.is_active());
        assert_eq!(source.read_block().unwrap(), vec![5]);
        assert!(!source.is_active());
    }

    #[test]
    fn pcm_reader_drops_odd_trailing_byte() {
        let mut bytes = pcm(&[7]);
        bytes.push(0xAA);
        let mut source = PcmReader::new(Cursor::new(bytes), 8000, 4);
        assert_eq!(source.read_block().unwrap(), vec![7]);
        assert!(!source.is_active());
    }

    #[test]
    fn parses_tone_script() {
        let tones = parse_tones("220:0.5, 0:0.25,330:1").unwrap();
        assert_eq!(
            tones,
            vec![
                Tone { freq_hz: 220.0, seconds: 0.5 },
                Tone { freq_hz: 0.0, seconds: 0.25 },
                Tone { freq_hz: 330.0, seconds: 1.0 },
            ]
        );
        assert!(parse_tones("220").is_err());
        assert!(parse_tones("abc:1").is_err());
        assert!(parse_tones("").is_err());
        assert!(parse_tones("-5:1").is_err());
    }

    #[test]
    fn tone_source_produces_the_scripted_length() {
        let tones = vec![
            Tone { freq_hz: 100.0, seconds: 0.01 },
            Tone { freq_hz: 0.0, seconds: 0.0 },
            Tone { freq_hz: 0.0, seconds: 0.005 },
        ];
        let mut source = ToneSource::new(tones, 8000, 32, 1000);
        let mut total = Vec::new();
        while source.is_active() {
            total.extend(source.read_block().unwrap());
        }
        assert_eq!(total.len(), 120);
        assert!(total[..80].iter().any(|&s| s.abs() > 900));
        assert!(total[80..].iter().all(|&s| s == 0));
    }

    #[test]
    fn empty_tones_are_inactive() {
        let source = ToneSource::new(vec![Tone { freq_hz: 440.0, seconds: 0.0 }], 8000, 32, 1000);
        assert!(!source.is_active());
    }
}
