//! Note mapper: one (value, amplitude) pair becomes one note event

use super::{Pitch, Scale};
use rand::Rng;
use std::time::Duration;

/// Values above this are amplified, values at or below it attenuated
pub const LOUD_THRESHOLD: f64 = 80.0;

/// A single note decision. `pitch: None` means the slot stays silent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteEvent {
    pub pitch: Option<Pitch>,
    pub velocity: f64,
    pub duration_secs: f64,
}

impl NoteEvent {
    pub fn is_silent(&self) -> bool {
        self.pitch.is_none()
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.duration_secs)
    }
}

/// Two-segment gain curve.
///
/// Above [`LOUD_THRESHOLD`] the multiplier is `value * 3 / 100`, otherwise
/// `value * 0.2`, both scaled by `volume * amplitude`.
pub fn velocity(value: f64, amplitude: f64, volume: f64) -> f64 {
    let curve = if value > LOUD_THRESHOLD {
        value * 3.0 / 100.0
    } else {
        value * 0.2
    };
    volume * amplitude * curve
}

/// Maps traffic readings to note events
#[derive(Debug, Clone)]
pub struct NoteMapper {
    min_duration: f64,
    max_duration: f64,
}

impl NoteMapper {
    /// Create a mapper drawing durations from `[min_duration, max_duration]` seconds.
    ///
    /// Bounds are reordered if given backwards.
    pub fn new(min_duration: f64, max_duration: f64) -> Self {
        Self {
            min_duration: min_duration.min(max_duration),
            max_duration: min_duration.max(max_duration),
        }
    }

    pub fn duration_bounds(&self) -> (f64, f64) {
        (self.min_duration, self.max_duration)
    }

    /// Map a value (0..=100) and amplitude (>= 0) onto `scale` at `volume`.
    ///
    /// Pitch and velocity depend only on the inputs; the duration is a
    /// uniform draw from `rng`.
    pub fn map<R: Rng + ?Sized>(
        &self,
        value: f64,
        amplitude: f64,
        scale: &Scale,
        volume: f64,
        rng: &mut R,
    ) -> NoteEvent {
        NoteEvent {
            pitch: scale.quantize(value),
            velocity: velocity(value, amplitude, volume),
            duration_secs: rng.gen_range(self.min_duration..=self.max_duration),
        }
    }
}

impl Default for NoteMapper {
    fn default() -> Self {
        Self::new(0.1, 0.7)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn five_notes() -> Scale {
        Scale::from_pitches(vec![10, 20, 30, 40, 50])
    }

    #[test]
    fn test_zero_value_is_silent() {
        let mut rng = StdRng::seed_from_u64(1);
        let event = NoteMapper::default().map(0.0, 1.0, &five_notes(), 1.0, &mut rng);
        assert!(event.is_silent());
        assert_eq!(event.velocity, 0.0);
    }

    #[test]
    fn test_mid_value_uses_quiet_curve() {
        let mut rng = StdRng::seed_from_u64(1);
        let event = NoteMapper::default().map(50.0, 1.0, &five_notes(), 1.0, &mut rng);
        assert_eq!(event.pitch, Some(30));
        assert!((event.velocity - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_loud_value_uses_loud_curve() {
        assert!((velocity(90.0, 2.0, 1.0) - 5.4).abs() < 1e-9);
        assert!((velocity(100.0, 1.0, 0.5) - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_velocity_monotonic_in_amplitude_and_volume() {
        for value in [1.0, 40.0, 80.0, 81.0, 100.0] {
            let mut last = -1.0;
            for step in 0..20 {
                let v = velocity(value, step as f64 * 0.25, 1.0);
                assert!(v >= last);
                last = v;
            }

            let mut last = -1.0;
            for step in 0..20 {
                let v = velocity(value, 1.0, step as f64 * 0.1);
                assert!(v >= last);
                last = v;
            }
        }
    }

    #[test]
    fn test_velocity_discontinuity_at_threshold() {
        let below = velocity(80.0, 1.0, 1.0);
        let above = velocity(80.5, 1.0, 1.0);
        // 80 * 0.2 = 16, 80.5 * 0.03 = 2.415
        assert!((below - 16.0).abs() < 1e-9);
        assert!((above - 2.415).abs() < 1e-9);
        // the curve resets at the threshold and then climbs again
        assert!(velocity(100.0, 1.0, 1.0) > above);
    }

    #[test]
    fn test_duration_within_bounds() {
        let mapper = NoteMapper::new(0.1, 0.7);
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..10_000 {
            let event = mapper.map(60.0, 1.0, &five_notes(), 1.0, &mut rng);
            assert!(event.duration_secs >= 0.1 && event.duration_secs <= 0.7);
        }
    }

    #[test]
    fn test_fixed_duration() {
        let mapper = NoteMapper::new(0.25, 0.25);
        let mut rng = StdRng::seed_from_u64(7);
        let event = mapper.map(60.0, 1.0, &five_notes(), 1.0, &mut rng);
        assert_eq!(event.duration_secs, 0.25);
        assert_eq!(event.duration(), Duration::from_millis(250));
    }

    #[test]
    fn test_reversed_bounds_are_reordered() {
        let mapper = NoteMapper::new(0.7, 0.1);
        assert_eq!(mapper.duration_bounds(), (0.1, 0.7));
    }

    #[test]
    fn test_empty_scale_is_silent() {
        let mut rng = StdRng::seed_from_u64(1);
        let empty = Scale::from_pitches(vec![]);
        let event = NoteMapper::default().map(70.0, 1.0, &empty, 1.0, &mut rng);
        assert!(event.is_silent());
    }
}
