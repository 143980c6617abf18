//! Pairs note and amplitude arrays that arrive as separate messages

use super::TrafficSample;
use tracing::{debug, warn};

/// Holds the latest unpaired notes and amplitudes until both sides are present.
///
/// A second arrival on the same side replaces the pending one, so a tick is
/// always built from the freshest pair and never from arrays of different
/// ticks.
#[derive(Debug, Default)]
pub struct TickAligner {
    notes: Option<Vec<f64>>,
    amplitudes: Option<Vec<f64>>,
    dropped: u64,
}

impl TickAligner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept a notes array, returning a tick if amplitudes were waiting
    pub fn push_notes(&mut self, values: Vec<f64>) -> Option<TrafficSample> {
        if self.notes.replace(values).is_some() {
            self.dropped += 1;
            debug!("Notes arrived twice without amplitudes; keeping the newer array");
        }
        self.try_pair()
    }

    /// Accept an amplitudes array, returning a tick if notes were waiting
    pub fn push_amplitudes(&mut self, amplitudes: Vec<f64>) -> Option<TrafficSample> {
        if self.amplitudes.replace(amplitudes).is_some() {
            self.dropped += 1;
            debug!("Amplitudes arrived twice without notes; keeping the newer array");
        }
        self.try_pair()
    }

    /// Number of stale arrays discarded so far
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Whether one side is waiting for its partner
    pub fn is_pending(&self) -> bool {
        self.notes.is_some() || self.amplitudes.is_some()
    }

    fn try_pair(&mut self) -> Option<TrafficSample> {
        if self.notes.is_none() || self.amplitudes.is_none() {
            return None;
        }
        let notes = self.notes.take()?;
        let amplitudes = self.amplitudes.take()?;

        if notes.len() != amplitudes.len() {
            debug!(
                "Tick arrays differ in length ({} notes, {} amplitudes); using the overlap",
                notes.len(),
                amplitudes.len()
            );
        }

        let (sample, issues) = TrafficSample::new(notes, amplitudes);
        for issue in &issues {
            warn!("Clamped input: {}", issue);
        }
        Some(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notes_then_amplitudes() {
        let mut aligner = TickAligner::new();
        assert!(aligner.push_notes(vec![10.0, 20.0]).is_none());
        assert!(aligner.is_pending());

        let tick = aligner.push_amplitudes(vec![1.0, 0.1]).unwrap();
        assert_eq!(tick.values(), &[10.0, 20.0]);
        assert_eq!(tick.amplitudes(), &[1.0, 0.1]);
        assert!(!aligner.is_pending());
    }

    #[test]
    fn test_amplitudes_then_notes() {
        let mut aligner = TickAligner::new();
        assert!(aligner.push_amplitudes(vec![1.0]).is_none());
        let tick = aligner.push_notes(vec![42.0]).unwrap();
        assert_eq!(tick.slot(0), Some((42.0, 1.0)));
    }

    #[test]
    fn test_repeated_notes_keep_newest() {
        let mut aligner = TickAligner::new();
        aligner.push_notes(vec![1.0]);
        aligner.push_notes(vec![2.0]);
        assert_eq!(aligner.dropped(), 1);

        let tick = aligner.push_amplitudes(vec![1.0]).unwrap();
        assert_eq!(tick.values(), &[2.0]);
    }

    #[test]
    fn test_pair_is_consumed_once() {
        let mut aligner = TickAligner::new();
        aligner.push_notes(vec![5.0]);
        assert!(aligner.push_amplitudes(vec![1.0]).is_some());
        // a lone amplitudes array must wait for fresh notes
        assert!(aligner.push_amplitudes(vec![1.0]).is_none());
    }

    #[test]
    fn test_out_of_range_values_are_clamped() {
        let mut aligner = TickAligner::new();
        aligner.push_notes(vec![120.0, -3.0]);
        let tick = aligner.push_amplitudes(vec![1.0, -1.0]).unwrap();
        assert_eq!(tick.values(), &[100.0, 0.0]);
        assert_eq!(tick.amplitudes(), &[1.0, 0.0]);
    }
}
