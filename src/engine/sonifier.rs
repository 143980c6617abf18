//! Sonification loop: one aligned tick in, a handful of notes out

use super::GlobalVolume;
use crate::mapping::{InstrumentRegistry, NoteMapper};
use crate::output::AudioEngine;
use crate::transport::TrafficSample;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// What happened to the slots of one tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Slots considered (overlap of instruments, values and amplitudes)
    pub slots: usize,
    pub played: usize,
    /// Mapped to silence (zero value or empty instrument scale)
    pub silent: usize,
    /// Randomly skipped
    pub omitted: usize,
    /// The engine refused the request
    pub failed: usize,
}

/// Maps each tick across the instrument slots and plays the result
pub struct Sonifier {
    registry: Arc<InstrumentRegistry>,
    mapper: NoteMapper,
    omit_rate: u32,
    volume: GlobalVolume,
    engine: Arc<dyn AudioEngine>,
    rng: StdRng,
}

impl Sonifier {
    pub fn new(
        registry: Arc<InstrumentRegistry>,
        mapper: NoteMapper,
        volume: GlobalVolume,
        engine: Arc<dyn AudioEngine>,
    ) -> Self {
        Self {
            registry,
            mapper,
            omit_rate: 3,
            volume,
            engine,
            rng: StdRng::from_entropy(),
        }
    }

    /// Skip one slot in `rate` on average. 0 disables omission.
    pub fn with_omit_rate(mut self, rate: u32) -> Self {
        self.omit_rate = rate;
        self
    }

    /// Make omission and durations reproducible
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn omit_rate(&self) -> u32 {
        self.omit_rate
    }

    fn omit(&mut self) -> bool {
        self.omit_rate > 0 && self.rng.gen_ratio(1, self.omit_rate)
    }

    /// Process one tick to completion
    pub fn dispatch(&mut self, sample: &TrafficSample) -> TickReport {
        let slots = sample.len().min(self.registry.len());
        let mut report = TickReport {
            slots,
            ..TickReport::default()
        };

        for slot in 0..slots {
            if self.omit() {
                report.omitted += 1;
                continue;
            }

            let (Some((value, amplitude)), Some(instrument), Some(scale)) = (
                sample.slot(slot),
                self.registry.get(slot),
                self.registry.scale_for(slot),
            ) else {
                continue;
            };

            let event = self
                .mapper
                .map(value, amplitude, scale, self.volume.get(), &mut self.rng);

            let Some(pitch) = event.pitch else {
                report.silent += 1;
                continue;
            };

            match self
                .engine
                .play(instrument, pitch, event.duration_secs, event.velocity)
            {
                Ok(()) => report.played += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!("{} could not play {}: {}", self.engine.name(), instrument.name, e);
                }
            }
        }

        report
    }

    /// Dispatch ticks until the channel closes. Returns the number of ticks handled.
    pub async fn run(mut self, mut ticks: mpsc::Receiver<TrafficSample>) -> u64 {
        info!(
            "Sonification loop started ({} instruments, omit 1/{})",
            self.registry.len(),
            self.omit_rate
        );

        let mut handled = 0;
        while let Some(sample) = ticks.recv().await {
            let report = self.dispatch(&sample);
            handled += 1;
            debug!(
                "Tick {}: {} slots, {} played, {} silent, {} omitted",
                handled, report.slots, report.played, report.silent, report.omitted
            );
        }

        info!("Sonification loop stopped after {} ticks", handled);
        handled
    }
}
