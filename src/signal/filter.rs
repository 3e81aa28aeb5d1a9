// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Zero-phase temporal band filter.
//!
//! The filter multiplies the spectrum by the squared Butterworth magnitude response,
//! which is what a forward-backward Butterworth pass of the same order produces, without
//! any phase shift. Each column is padded by odd reflection about its end samples
//! before the transform to keep edge transients small.

use ndarray::Array2;
use rustfft::{num_complex::Complex, FftPlanner};

use crate::config::consts::BUTTERWORTH_ORDER;
use crate::errors::DenoiseError;
use crate::observability::messages::validation::LowPassAboveNyquist;
use crate::observability::messages::StructuredLog;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandFilter {
    high_pass: Option<f64>,
    low_pass: Option<f64>,
    tr: f64,
    order: i32,
}

impl BandFilter {
    /// Build a filter for data sampled every `tr` seconds.
    ///
    /// A low-pass cutoff at or above Nyquist is dropped with a warning; a high-pass
    /// cutoff there would remove everything and is rejected.
    pub fn new(high_pass: Option<f64>, low_pass: Option<f64>, tr: f64) -> Result<Self, DenoiseError> {
        if !(tr > 0.0 && tr.is_finite()) {
            return Err(DenoiseError::InvalidBand(format!(
                "repetition time must be positive, got {}",
                tr
            )));
        }
        let nyquist = 0.5 / tr;

        if let Some(hp) = high_pass {
            if !(hp > 0.0) {
                return Err(DenoiseError::InvalidBand(format!(
                    "high-pass cutoff must be positive, got {}",
                    hp
                )));
            }
            if hp >= nyquist {
                return Err(DenoiseError::InvalidBand(format!(
                    "high-pass cutoff {} Hz is at or above Nyquist {} Hz",
                    hp, nyquist
                )));
            }
        }

        let low_pass = match low_pass {
            Some(lp) if lp >= nyquist => {
                LowPassAboveNyquist {
                    low_pass: lp,
                    nyquist,
                }
                .log();
                None
            }
            other => other,
        };

        if let (Some(hp), Some(lp)) = (high_pass, low_pass) {
            if hp >= lp {
                return Err(DenoiseError::InvalidBand(format!(
                    "high-pass cutoff {} Hz must be below low-pass cutoff {} Hz",
                    hp, lp
                )));
            }
        }

        Ok(Self {
            high_pass,
            low_pass,
            tr,
            order: BUTTERWORTH_ORDER,
        })
    }

    pub fn high_pass(&self) -> Option<f64> {
        self.high_pass
    }

    pub fn low_pass(&self) -> Option<f64> {
        self.low_pass
    }

    pub fn is_passthrough(&self) -> bool {
        self.high_pass.is_none() && self.low_pass.is_none()
    }

    /// Power gain at `freq` Hz.
    pub fn gain(&self, freq: f64) -> f64 {
        let mut gain = 1.0;
        if let Some(hp) = self.high_pass {
            if freq <= 0.0 {
                return 0.0;
            }
            let ratio = (freq / hp).powi(2 * self.order);
            gain *= ratio / (1.0 + ratio);
        }
        if let Some(lp) = self.low_pass {
            gain *= 1.0 / (1.0 + (freq / lp).powi(2 * self.order));
        }
        gain
    }

    /// Filter every column of `data` (time × series) in place.
    pub fn apply(&self, data: &mut Array2<f64>) {
        let n = data.nrows();
        if n < 2 || data.ncols() == 0 || self.is_passthrough() {
            return;
        }

        let pad = n - 1;
        let len = n + 2 * pad;
        let mut planner = FftPlanner::<f64>::new();
        let forward = planner.plan_fft_forward(len);
        let inverse = planner.plan_fft_inverse(len);

        let gains: Vec<f64> = (0..len)
            .map(|k| self.gain(k.min(len - k) as f64 / (len as f64 * self.tr)))
            .collect();
        let scale = 1.0 / len as f64;
        let mut buffer = vec![Complex::new(0.0, 0.0); len];

        for mut column in data.columns_mut() {
            let first = column[0];
            let last = column[n - 1];
            for i in 0..pad {
                buffer[i] = Complex::new(2.0 * first - column[pad - i], 0.0);
                buffer[pad + n + i] = Complex::new(2.0 * last - column[n - 2 - i], 0.0);
            }
            for t in 0..n {
                buffer[pad + t] = Complex::new(column[t], 0.0);
            }

            forward.process(&mut buffer);
            for (bin, gain) in buffer.iter_mut().zip(&gains) {
                *bin *= *gain;
            }
            inverse.process(&mut buffer);

            for t in 0..n {
                column[t] = buffer[pad + t].re * scale;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array1;
    use std::f64::consts::PI;

    const TR: f64 = 2.0;

    fn sine(freq: f64, n: usize) -> Array2<f64> {
        let samples = Array1::from_iter((0..n).map(|t| (2.0 * PI * freq * t as f64 * TR).sin()));
        samples.insert_axis(ndarray::Axis(1))
    }

    fn rms(data: &Array2<f64>, from: usize, to: usize) -> f64 {
        let slice = data.slice(ndarray::s![from..to, 0]);
        (slice.iter().map(|v| v * v).sum::<f64>() / slice.len() as f64).sqrt()
    }

    #[test]
    fn test_passband_is_preserved_and_stopband_removed() {
        let filter = BandFilter::new(Some(0.008), Some(0.08), TR).unwrap();

        let mut inside = sine(0.03, 300);
        let before = rms(&inside, 50, 250);
        filter.apply(&mut inside);
        assert!((rms(&inside, 50, 250) / before - 1.0).abs() < 0.05);

        let low_pass = BandFilter::new(None, Some(0.08), TR).unwrap();
        let mut above = sine(0.2, 300);
        low_pass.apply(&mut above);
        assert!(rms(&above, 50, 250) < 0.05);
    }

    #[test]
    fn test_high_pass_removes_constant_offset() {
        let filter = BandFilter::new(Some(0.01), None, TR).unwrap();
        let mut data = Array2::from_elem((64, 2), 5.0);
        filter.apply(&mut data);
        assert!(data.iter().all(|v| v.abs() < 1e-9));
    }

    #[test]
    fn test_low_pass_above_nyquist_is_dropped() {
        let filter = BandFilter::new(Some(0.01), Some(0.3), TR).unwrap();
        assert_eq!(filter.low_pass(), None);
        assert_eq!(filter.high_pass(), Some(0.01));
    }

    #[test]
    fn test_high_pass_above_nyquist_is_rejected() {
        assert!(matches!(
            BandFilter::new(Some(0.3), None, TR),
            Err(DenoiseError::InvalidBand(_))
        ));
    }

    #[test]
    fn test_gain_shape() {
        let filter = BandFilter::new(Some(0.01), Some(0.1), TR).unwrap();
        assert_eq!(filter.gain(0.0), 0.0);
        assert!((filter.gain(0.01) - 0.5).abs() < 0.01);
        assert!(filter.gain(0.03) > 0.99);
        assert!(filter.gain(0.2) < 0.01);
    }
}
