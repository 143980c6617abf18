//! Boundary validation for traffic ticks

use thiserror::Error;

/// A reading that had to be clamped before it could be mapped
#[derive(Debug, Clone, Copy, Error, PartialEq)]
pub enum InputError {
    #[error("traffic value {value} at slot {slot} outside 0..=100")]
    ValueOutOfRange { slot: usize, value: f64 },

    #[error("amplitude {value} at slot {slot} is negative or not a number")]
    BadAmplitude { slot: usize, value: f64 },
}

/// One aligned tick of traffic readings.
///
/// Values are clamped into 0..=100 (NaN becomes 0, i.e. silence) and
/// amplitudes into 0.. at construction, so everything downstream can trust
/// the ranges.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrafficSample {
    values: Vec<f64>,
    amplitudes: Vec<f64>,
}

impl TrafficSample {
    /// Clamp raw arrays into range, returning the sample and whatever was fixed up
    pub fn new(values: Vec<f64>, amplitudes: Vec<f64>) -> (Self, Vec<InputError>) {
        let mut issues = Vec::new();

        let values = values
            .into_iter()
            .enumerate()
            .map(|(slot, value)| {
                if value.is_nan() {
                    issues.push(InputError::ValueOutOfRange { slot, value });
                    0.0
                } else if !(0.0..=100.0).contains(&value) {
                    issues.push(InputError::ValueOutOfRange { slot, value });
                    value.clamp(0.0, 100.0)
                } else {
                    value
                }
            })
            .collect();

        let amplitudes = amplitudes
            .into_iter()
            .enumerate()
            .map(|(slot, value)| {
                if value.is_nan() || value < 0.0 {
                    issues.push(InputError::BadAmplitude { slot, value });
                    0.0
                } else if value.is_infinite() {
                    issues.push(InputError::BadAmplitude { slot, value });
                    f64::MAX
                } else {
                    value
                }
            })
            .collect();

        (Self { values, amplitudes }, issues)
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn amplitudes(&self) -> &[f64] {
        &self.amplitudes
    }

    /// Number of slots both arrays cover
    pub fn len(&self) -> usize {
        self.values.len().min(self.amplitudes.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The (value, amplitude) pair for `slot`, if both arrays reach it
    pub fn slot(&self, slot: usize) -> Option<(f64, f64)> {
        Some((*self.values.get(slot)?, *self.amplitudes.get(slot)?))
    }
}
