//! # Spectrum Analyzer Module
//!
//! Turns a stream of audio samples into one dB magnitude vector per time
//! interval, ready to be fed to the visualization.
//!
//! ## Features
//! - FFT length of `2 * bands`, so every band is one FFT bin below Nyquist
//! - DC offset removal and Hann windowing before every transform
//! - Fixed hop derived from the sample rate and the emission interval
//! - Magnitudes in dB relative to a full-scale sine, floored at a threshold

use rustfft::{Fft, FftPlanner, num_complex::Complex};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalyzerError {
    #[error("the analyzer needs at least one band")]
    NoBands,
    #[error("sample rate must be non-zero")]
    ZeroSampleRate,
    #[error("threshold must be finite (got {0})")]
    InvalidThreshold(f64),
}

/// Removes the DC offset from a signal by making its average value zero.
fn remove_dc_offset(signal: &mut [f32]) {
    let len = signal.len();
    if len == 0 {
        return;
    }
    let avg = signal.iter().sum::<f32>() / len as f32;
    if avg.abs() > 1e-6 {
        for sample in signal.iter_mut() {
            *sample -= avg;
        }
    }
}

/// Hann window coefficients of length `n`.
fn hann_window(n: usize) -> Vec<f32> {
    if n < 2 {
        return vec![1.0; n];
    }
    let n_minus_1 = (n - 1) as f32;
    (0..n)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / n_minus_1).cos()))
        .collect()
}

/// Streaming short-time spectrum analyzer.
pub struct SpectrumAnalyzer {
    bands: usize,
    hop: usize,
    threshold_db: f64,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    window_sum: f32,
    // Ring buffer of the last `2 * bands` samples.
    history: Vec<f32>,
    write_pos: usize,
    filled: usize,
    since_last: usize,
    frame: Vec<f32>,
    spectrum: Vec<Complex<f32>>,
    magnitudes: Vec<f64>,
}

impl SpectrumAnalyzer {
    /// # Arguments
    /// * `bands` - Number of magnitudes per emitted vector
    /// * `sample_rate` - Sample rate of the incoming audio in Hz
    /// * `interval` - Time between two emitted vectors
    /// * `threshold_db` - Floor applied to every magnitude
    pub fn new(
        bands: usize,
        sample_rate: u32,
        interval: Duration,
        threshold_db: f64,
    ) -> Result<Self, AnalyzerError> {
        if bands == 0 {
            return Err(AnalyzerError::NoBands);
        }
        if sample_rate == 0 {
            return Err(AnalyzerError::ZeroSampleRate);
        }
        if !threshold_db.is_finite() {
            return Err(AnalyzerError::InvalidThreshold(threshold_db));
        }

        let fft_len = bands * 2;
        let hop = ((sample_rate as f64 * interval.as_secs_f64()).round() as usize).max(1);
        let window = hann_window(fft_len);
        let window_sum = window.iter().sum::<f32>().max(f32::EPSILON);
        let fft = FftPlanner::new().plan_fft_forward(fft_len);

        Ok(Self {
            bands,
            hop,
            threshold_db,
            fft,
            window,
            window_sum,
            history: vec![0.0; fft_len],
            write_pos: 0,
            filled: 0,
            since_last: 0,
            frame: vec![0.0; fft_len],
            spectrum: vec![Complex { re: 0.0, im: 0.0 }; fft_len],
            magnitudes: vec![threshold_db; bands],
        })
    }

    pub fn bands(&self) -> usize {
        self.bands
    }

    /// Samples between two emitted vectors.
    pub fn hop(&self) -> usize {
        self.hop
    }

    /// Consumes `samples`, calling `emit` once per completed interval.
    ///
    /// Returns how many vectors were emitted.
    pub fn push(&mut self, samples: &[f32], mut emit: impl FnMut(&[f64])) -> usize {
        let fft_len = self.history.len();
        let mut emitted = 0;
        for &sample in samples {
            self.history[self.write_pos] = sample;
            self.write_pos = (self.write_pos + 1) % fft_len;
            self.filled = (self.filled + 1).min(fft_len);
            self.since_last += 1;

            if self.filled == fft_len && self.since_last >= self.hop {
                self.since_last = 0;
                self.analyze();
                emit(&self.magnitudes);
                emitted += 1;
            }
        }
        emitted
    }

    fn analyze(&mut self) {
        // Oldest sample sits at the write position.
        let (newer, older) = self.history.split_at(self.write_pos);
        self.frame[..older.len()].copy_from_slice(older);
        self.frame[older.len()..].copy_from_slice(newer);

        remove_dc_offset(&mut self.frame);
        for ((out, &sample), &w) in self.spectrum.iter_mut().zip(&self.frame).zip(&self.window) {
            *out = Complex { re: sample * w, im: 0.0 };
        }
        self.fft.process(&mut self.spectrum);

        let scale = 2.0 / self.window_sum;
        for (magnitude, bin) in self.magnitudes.iter_mut().zip(&self.spectrum) {
            let amplitude = (bin.norm() * scale) as f64;
            *magnitude = (20.0 * amplitude.log10()).max(self.threshold_db);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn sine(freq: f32, sample_rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn emits_once_per_hop_after_the_first_full_window() {
        let mut analyzer = SpectrumAnalyzer::new(500, 8000, Duration::from_millis(10), -80.0).unwrap();
        assert_eq!(analyzer.hop(), 80);
        let mut lengths = Vec::new();
        let emitted = analyzer.push(&[0.0; 2000], |m| lengths.push(m.len()));
        // First vector at sample 1000, then every 80 samples through 1960.
        assert_eq!(emitted, 13);
        assert!(lengths.iter().all(|&len| len == 500));
    }

    #[test]
    fn sine_peaks_in_its_band() {
        let mut analyzer = SpectrumAnalyzer::new(500, 8000, Duration::from_millis(10), -80.0).unwrap();
        let mut last = Vec::new();
        analyzer.push(&sine(1000.0, 8000, 1000), |m| last = m.to_vec());

        // 8 Hz per band: 1000 Hz lands in band 125.
        let (peak_band, peak_db) = last
            .iter()
            .enumerate()
            .fold((0, f64::MIN), |best, (i, &db)| if db > best.1 { (i, db) } else { best });
        assert_eq!(peak_band, 125);
        assert!(peak_db > -1.0 && peak_db < 1.0, "peak at {peak_db} dB");
        assert!(last[400] < -60.0);
    }

    #[test]
    fn silence_sits_at_the_threshold() {
        let mut analyzer = SpectrumAnalyzer::new(16, 1000, Duration::from_millis(5), -80.0).unwrap();
        let mut last = Vec::new();
        analyzer.push(&[0.0; 64], |m| last = m.to_vec());
        assert_eq!(last, vec![-80.0; 16]);
    }

    #[test]
    fn samples_can_arrive_in_arbitrary_blocks() {
        let signal = sine(440.0, 8000, 4000);
        let mut whole = SpectrumAnalyzer::new(64, 8000, Duration::from_millis(10), -80.0).unwrap();
        let mut split = SpectrumAnalyzer::new(64, 8000, Duration::from_millis(10), -80.0).unwrap();

        let mut a = Vec::new();
        whole.push(&signal, |m| a.push(m.to_vec()));
        let mut b = Vec::new();
        for block in signal.chunks(37) {
            split.push(block, |m| b.push(m.to_vec()));
        }
        assert_eq!(a, b);
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        let interval = Duration::from_millis(10);
        assert!(matches!(SpectrumAnalyzer::new(0, 8000, interval, -80.0), Err(AnalyzerError::NoBands)));
        assert!(matches!(SpectrumAnalyzer::new(4, 0, interval, -80.0), Err(AnalyzerError::ZeroSampleRate)));
        assert!(SpectrumAnalyzer::new(4, 8000, interval, f64::NAN).is_err());
    }
}
