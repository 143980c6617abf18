//! Instrument registry and per-instrument scale table

use super::{Pitch, Scale};
use std::sync::Arc;
use tracing::warn;

/// Inclusive pitch range an instrument can play
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PitchRange {
    pub low: Pitch,
    pub high: Pitch,
}

impl PitchRange {
    /// Create a range, swapping the bounds if they arrive inverted
    pub fn new(low: Pitch, high: Pitch) -> Self {
        Self {
            low: low.min(high),
            high: low.max(high),
        }
    }

    pub fn contains(&self, pitch: Pitch) -> bool {
        pitch >= self.low && pitch <= self.high
    }
}

/// A named sound source the audio engine knows how to play
#[derive(Debug, Clone, PartialEq)]
pub struct Instrument {
    pub name: String,
    pub range: Option<PitchRange>,
    /// MIDI channel (0-15)
    pub channel: u8,
    /// MIDI program sent at startup, if any
    pub program: Option<u8>,
}

impl Instrument {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            range: None,
            channel: 0,
            program: None,
        }
    }

    pub fn with_range(mut self, low: Pitch, high: Pitch) -> Self {
        self.range = Some(PitchRange::new(low, high));
        self
    }

    pub fn with_channel(mut self, channel: u8) -> Self {
        self.channel = channel & 0x0F;
        self
    }

    pub fn with_program(mut self, program: u8) -> Self {
        self.program = Some(program & 0x7F);
        self
    }
}

/// Ordered instruments, each paired with the scale it plays from.
///
/// Instruments without a range share the full scale; ranged instruments get
/// the trimmed sub-scale, which may be empty (the slot then never sounds).
/// Read-only after construction.
#[derive(Debug, Clone)]
pub struct InstrumentRegistry {
    instruments: Vec<Instrument>,
    scales: Vec<Arc<Scale>>,
    full: Arc<Scale>,
}

impl InstrumentRegistry {
    pub fn new(scale: Scale, instruments: Vec<Instrument>) -> Self {
        let full = Arc::new(scale);

        let scales = instruments
            .iter()
            .map(|inst| match inst.range {
                Some(range) => {
                    let trimmed = full.trim(range.low, range.high);
                    if trimmed.is_empty() {
                        warn!(
                            "Instrument '{}' range {}..={} holds no scale pitches; it will stay silent",
                            inst.name, range.low, range.high
                        );
                    }
                    Arc::new(trimmed)
                }
                None => Arc::clone(&full),
            })
            .collect();

        Self {
            instruments,
            scales,
            full,
        }
    }

    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }

    pub fn instruments(&self) -> &[Instrument] {
        &self.instruments
    }

    pub fn get(&self, slot: usize) -> Option<&Instrument> {
        self.instruments.get(slot)
    }

    /// The scale the instrument in `slot` plays from
    pub fn scale_for(&self, slot: usize) -> Option<&Scale> {
        self.scales.get(slot).map(|s| s.as_ref())
    }

    /// The untrimmed base scale
    pub fn full_scale(&self) -> &Scale {
        &self.full
    }

    /// Whether any instrument carries its own range
    pub fn has_ranges(&self) -> bool {
        self.instruments.iter().any(|i| i.range.is_some())
    }

    /// Iterate instruments alongside their scales
    pub fn iter(&self) -> impl Iterator<Item = (&Instrument, &Scale)> {
        self.instruments
            .iter()
            .zip(self.scales.iter().map(|s| s.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Scale {
        Scale::from_pitches(vec![10, 20, 30, 40, 50])
    }

    #[test]
    fn test_unranged_instruments_share_full_scale() {
        let registry = InstrumentRegistry::new(base(), vec![Instrument::new("A"), Instrument::new("B")]);

        assert_eq!(registry.len(), 2);
        assert!(!registry.has_ranges());
        assert_eq!(registry.scale_for(0), Some(&base()));
        assert!(std::ptr::eq(registry.scale_for(1).unwrap(), registry.full_scale()));
    }

    #[test]
    fn test_ranged_instruments_get_trimmed_scale() {
        let registry = InstrumentRegistry::new(
            base(),
            vec![
                Instrument::new("low").with_range(5, 25),
                Instrument::new("all"),
                Instrument::new("high").with_range(35, 60),
            ],
        );

        assert!(registry.has_ranges());
        assert_eq!(registry.scale_for(0).unwrap().pitches(), &[10, 20]);
        assert_eq!(registry.scale_for(1).unwrap().pitches(), &[10, 20, 30, 40, 50]);
        assert_eq!(registry.scale_for(2).unwrap().pitches(), &[40, 50]);
        assert_eq!(registry.scale_for(3), None);
    }

    #[test]
    fn test_empty_trim_is_kept() {
        let registry = InstrumentRegistry::new(base(), vec![Instrument::new("piccolo").with_range(100, 120)]);
        assert!(registry.scale_for(0).unwrap().is_empty());
    }

    #[test]
    fn test_inverted_range_is_normalized() {
        let range = PitchRange::new(60, 40);
        assert_eq!(range, PitchRange { low: 40, high: 60 });
        assert!(range.contains(50));
        assert!(!range.contains(61));
    }

    #[test]
    fn test_channel_and_program_are_masked() {
        let inst = Instrument::new("x").with_channel(17).with_program(200);
        assert_eq!(inst.channel, 1);
        assert_eq!(inst.program, Some(72));
    }
}
