use std::ops::Range;
use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

use super::pitch::note_to_bin;
use super::window::SampleWindow;
use crate::error::{Result, TuneError};

/// Peak-bin frequency estimator over a fixed note range.
pub struct SpectralEstimator {
    fft: Arc<dyn Fft<f32>>,
    coeffs: Vec<f32>,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    bins: Range<usize>,
    sample_rate: u32,
}

impl SpectralEstimator {
    /// Plans a `size`-point transform and restricts the search to the bins
    /// between one semitone below `note_min` and one above `note_max`.
    pub fn new(sample_rate: u32, size: usize, note_min: i32, note_max: i32) -> Result<Self> {
        let bins = bin_range(note_min, note_max, sample_rate, size);
        if bins.is_empty() {
            return Err(TuneError::InvalidConfig(format!(
                "notes {}..={} select no FFT bins at {} Hz / {} samples",
                note_min, note_max, sample_rate, size
            )));
        }

        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(size);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];

        Ok(Self {
            fft,
            coeffs: hann_window(size),
            buffer: vec![Complex::new(0.0, 0.0); size],
            scratch,
            bins,
            sample_rate,
        })
    }

    pub fn size(&self) -> usize {
        self.coeffs.len()
    }

    pub fn bins(&self) -> Range<usize> {
        self.bins.clone()
    }

    /// Hz between adjacent bins.
    pub fn resolution(&self) -> f32 {
        self.sample_rate as f32 / self.size() as f32
    }

    /// Frequency of the strongest bin in range. Samples beyond the window
    /// size are ignored and missing ones count as zero.
    pub fn analyze<I>(&mut self, samples: I) -> f32
    where
        I: IntoIterator<Item = f32>,
    {
        self.buffer.fill(Complex::new(0.0, 0.0));
        for ((slot, s), w) in self.buffer.iter_mut().zip(samples).zip(&self.coeffs) {
            *slot = Complex::new(s * w, 0.0);
        }
        self.fft.process_with_scratch(&mut self.buffer, &mut self.scratch);

        // Lowest bin wins ties.
        let mut best = self.bins.start;
        let mut best_mag = f32::NEG_INFINITY;
        for i in self.bins.clone() {
            let mag = self.buffer[i].norm_sqr();
            if mag > best_mag {
                best = i;
                best_mag = mag;
            }
        }

        best as f32 * self.resolution()
    }

    pub fn analyze_window(&mut self, window: &SampleWindow) -> f32 {
        self.analyze(window.as_float_samples())
    }
}

/// Half-open bin range for `[note_min - 1, note_max + 1]`, clamped to `[0, size/2]`.
pub fn bin_range(note_min: i32, note_max: i32, sample_rate: u32, size: usize) -> Range<usize> {
    let lo = note_to_bin(note_min.saturating_sub(1) as f32, sample_rate, size).floor().max(0.0) as usize;
    let hi = note_to_bin(note_max.saturating_add(1) as f32, sample_rate, size).ceil().max(0.0) as usize;
    let half = size / 2;
    lo.min(half)..hi.min(half)
}

/// Periodic Hann window.
pub fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / size as f32).cos()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: u32 = 44100;
    const N: usize = 8192;

    fn sine(freq: f32, amp: f32) -> impl Iterator<Item = f32> {
        (0..N).map(move |i| amp * (2.0 * std::f32::consts::PI * freq * i as f32 / SR as f32).sin())
    }

    #[test]
    fn bin_range_brackets_note_range() {
        let bins = bin_range(56, 65, SR, N);
        assert_eq!(bins, 36..69);
    }

    #[test]
    fn bin_range_is_clamped() {
        let bins = bin_range(120, 140, SR, 1024);
        assert!(bins.end <= 512);
        assert!(bins.start <= bins.end);
    }

    #[test]
    fn extreme_notes_do_not_overflow() {
        let bins = bin_range(i32::MIN, i32::MAX, SR, 1024);
        assert_eq!(bins, 0..512);
    }

    #[test]
    fn rejects_empty_range() {
        // entirely above Nyquist
        assert!(SpectralEstimator::new(SR, 1024, 140, 150).is_err());
    }

    #[test]
    fn finds_a3() {
        let mut est = SpectralEstimator::new(SR, N, 56, 65).unwrap();
        let freq = est.analyze(sine(220.0, 8000.0));
        assert!((freq - 220.0).abs() <= est.resolution(), "got {}", freq);
    }

    #[test]
    fn ignores_strong_partials_outside_range() {
        let mut est = SpectralEstimator::new(SR, N, 56, 65).unwrap();
        let mixed = sine(110.0, 12000.0)
            .zip(sine(300.0, 3000.0))
            .map(|(a, b)| a + b);
        let freq = est.analyze(mixed);
        assert!((freq - 300.0).abs() <= est.resolution(), "got {}", freq);
    }

    #[test]
    fn silence_reports_lowest_bin() {
        let mut est = SpectralEstimator::new(SR, N, 56, 65).unwrap();
        let freq = est.analyze(std::iter::repeat(0.0).take(N));
        assert_eq!(freq, 36.0 * est.resolution());
    }

    #[test]
    fn hann_is_zero_at_start_and_one_at_center() {
        let w = hann_window(1024);
        assert!(w[0].abs() < 1e-6);
        assert!((w[512] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn analyzes_window_contents() {
        let frame = 1024;
        let mut window = SampleWindow::new(frame, N / frame);
        let tone: Vec<i16> = sine(330.0, 10000.0).map(|s| s as i16).collect();
        for chunk in tone.chunks(frame) {
            window.push(chunk).unwrap();
        }
        let mut est = SpectralEstimator::new(SR, N, 56, 65).unwrap();
        let freq = est.analyze_window(&window);
        assert!((freq - 330.0).abs() <= est.resolution(), "got {}", freq);
    }
}
