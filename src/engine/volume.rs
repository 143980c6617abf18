//! Shared global volume cell

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Process-wide volume multiplier applied to every note's velocity.
///
/// Stored as `f64` bits in an atomic, so a reader never sees a half-written
/// value. Writers do not coordinate: when two alerts overlap, whichever
/// stores last wins. Cloning shares the same cell.
#[derive(Debug, Clone)]
pub struct GlobalVolume {
    bits: Arc<AtomicU64>,
}

impl GlobalVolume {
    pub fn new(level: f64) -> Self {
        Self {
            bits: Arc::new(AtomicU64::new(Self::sanitize(level).to_bits())),
        }
    }

    fn sanitize(level: f64) -> f64 {
        if level.is_nan() {
            0.0
        } else {
            level.max(0.0)
        }
    }

    /// Current level
    pub fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::SeqCst))
    }

    /// Overwrite the level. Negative and NaN levels store as 0.
    pub fn set(&self, level: f64) {
        self.bits.store(Self::sanitize(level).to_bits(), Ordering::SeqCst);
    }

    /// Overwrite the level and return the one it replaced
    pub fn swap(&self, level: f64) -> f64 {
        f64::from_bits(self.bits.swap(Self::sanitize(level).to_bits(), Ordering::SeqCst))
    }
}

impl Default for GlobalVolume {
    fn default() -> Self {
        Self::new(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_full() {
        assert_eq!(GlobalVolume::default().get(), 1.0);
    }

    #[test]
    fn test_clones_share_state() {
        let a = GlobalVolume::new(1.0);
        let b = a.clone();
        b.set(0.05);
        assert_eq!(a.get(), 0.05);
        assert_eq!(a.swap(0.3), 0.05);
        assert_eq!(b.get(), 0.3);
    }

    #[test]
    fn test_negative_and_nan_store_zero() {
        let volume = GlobalVolume::new(-1.0);
        assert_eq!(volume.get(), 0.0);
        volume.set(f64::NAN);
        assert_eq!(volume.get(), 0.0);
    }

    #[test]
    fn test_concurrent_writers_never_tear() {
        let volume = GlobalVolume::new(1.0);
        let levels = [0.05, 0.3, 1.0];

        let writers: Vec<_> = levels
            .iter()
            .map(|&level| {
                let volume = volume.clone();
                std::thread::spawn(move || {
                    for _ in 0..10_000 {
                        volume.set(level);
                    }
                })
            })
            .collect();

        for _ in 0..10_000 {
            let seen = volume.get();
            assert!(levels.contains(&seen), "torn read: {}", seen);
        }

        for w in writers {
            w.join().unwrap();
        }
        assert!(levels.contains(&volume.get()));
    }
}
