use std::fmt;

use crate::error::{Result, TuneError};

pub const PITCH_CLASSES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

const A4_NUMBER: f32 = 69.0;
const A4_HZ: f32 = 440.0;

/// Continuous semitone number, A4 = 69.
pub fn freq_to_number(freq: f32) -> Result<f32> {
    if !freq.is_finite() || freq <= 0.0 {
        return Err(TuneError::Domain(freq));
    }
    Ok(A4_NUMBER + 12.0 * (freq / A4_HZ).log2())
}

pub fn number_to_freq(number: f32) -> f32 {
    A4_HZ * 2.0f32.powf((number - A4_NUMBER) / 12.0)
}

pub fn note_name(number: i32) -> String {
    let class = PITCH_CLASSES[number.rem_euclid(12) as usize];
    format!("{}{}", class, number.div_euclid(12) - 1)
}

/// Fractional FFT bin index of a note for an `fft_size`-point transform.
pub fn note_to_bin(number: f32, sample_rate: u32, fft_size: usize) -> f32 {
    number_to_freq(number) * fft_size as f32 / sample_rate as f32
}

/// A detected pitch relative to the nearest equal-tempered note.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Note {
    pub number: f32,
    pub nearest: i32,
}

impl Note {
    pub fn from_freq(freq: f32) -> Result<Self> {
        let number = freq_to_number(freq)?;
        Ok(Self {
            number,
            nearest: number.round() as i32,
        })
    }

    pub fn name(&self) -> String {
        note_name(self.nearest)
    }

    /// Offset from the nearest note in cents (-50..=50).
    pub fn cents(&self) -> f32 {
        (self.number - self.nearest as f32) * 100.0
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>3} {:+3.0}c", self.name(), self.cents())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a4_is_69() {
        assert!((freq_to_number(440.0).unwrap() - 69.0).abs() < 1e-5);
        assert!((number_to_freq(69.0) - 440.0).abs() < 1e-3);
        assert_eq!(note_name(69), "A4");
    }

    #[test]
    fn round_trips_frequency() {
        for &f in &[27.5f32, 110.0, 207.65, 220.0, 349.23, 1000.0, 4186.0] {
            let back = number_to_freq(freq_to_number(f).unwrap());
            assert!((back - f).abs() / f < 1e-4, "{} -> {}", f, back);
        }
    }

    #[test]
    fn rejects_non_positive_frequency() {
        assert!(matches!(freq_to_number(0.0), Err(TuneError::Domain(_))));
        assert!(matches!(freq_to_number(-3.0), Err(TuneError::Domain(_))));
        assert!(freq_to_number(f32::NAN).is_err());
    }

    #[test]
    fn names_are_periodic_in_octaves() {
        for n in 0..120 {
            let a = note_name(n);
            let b = note_name(n + 12);
            let class = PITCH_CLASSES[(n % 12) as usize];
            assert!(a.starts_with(class) && b.starts_with(class));
            let oct_a: i32 = a[class.len()..].parse().unwrap();
            let oct_b: i32 = b[class.len()..].parse().unwrap();
            assert_eq!(oct_b - oct_a, 1);
        }
    }

    #[test]
    fn configured_range_names() {
        assert_eq!(note_name(56), "G#3");
        assert_eq!(note_name(65), "F4");
        assert_eq!(note_name(60), "C4");
        assert_eq!(note_name(-1), "B-2");
    }

    #[test]
    fn note_bins_scale_with_fft_size() {
        let bin = note_to_bin(69.0, 44100, 8192);
        assert!((bin - 440.0 * 8192.0 / 44100.0).abs() < 1e-2);
        assert!((note_to_bin(69.0, 44100, 16384) - 2.0 * bin).abs() < 1e-2);
    }

    #[test]
    fn note_reports_cents() {
        let note = Note::from_freq(220.0).unwrap();
        assert_eq!(note.nearest, 57);
        assert_eq!(note.name(), "A3");
        assert!(note.cents().abs() < 0.1);

        let sharp = Note::from_freq(number_to_freq(57.25)).unwrap();
        assert_eq!(sharp.nearest, 57);
        assert!((sharp.cents() - 25.0).abs() < 0.1);
    }
}
