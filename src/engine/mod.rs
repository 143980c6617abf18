//! The running loops
//!
//! One sonification loop and two alert loops, each on its own tokio task
//! and each fed by its own channel. The loops share nothing but the
//! [`GlobalVolume`] cell.

mod alerts;
mod sonifier;
mod volume;

pub use alerts::{AlertKind, AlertLoop, AlertSettings};
pub use sonifier::{Sonifier, TickReport};
pub use volume::GlobalVolume;

use crate::output::AudioEngine;
use crate::transport::Router;
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Totals reported when the loops wind down
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub ticks: u64,
    pub incidents_started: u64,
    pub incidents_resolved: u64,
}

/// Owns the loop tasks
pub struct Conductor {
    sonifier: JoinHandle<u64>,
    mitigation: JoinHandle<u64>,
    resolution: JoinHandle<u64>,
    engine: Arc<dyn AudioEngine>,
}

impl Conductor {
    /// Spawn the three loops and hand back the [`Router`] that feeds them.
    ///
    /// Alert samples are preloaded first, so a trigger ducks without waiting
    /// on disk. `queue` bounds each channel; see [`Router::deliver`] for what
    /// happens when one fills.
    pub fn start(
        sonifier: Sonifier,
        mitigation: AlertLoop,
        resolution: AlertLoop,
        engine: Arc<dyn AudioEngine>,
        queue: usize,
    ) -> (Router, Self) {
        let queue = queue.max(1);
        let (tick_tx, tick_rx) = mpsc::channel(queue);
        let (started_tx, started_rx) = mpsc::channel(queue);
        let (resolved_tx, resolved_rx) = mpsc::channel(queue);

        for alert in [&mitigation, &resolution] {
            if let Some(path) = &alert.settings().sample {
                if let Err(e) = engine.preload_sample(path) {
                    warn!("{} alert sample {:?} could not be loaded: {:#}", alert.kind(), path, e);
                }
            }
        }

        info!("Starting loops on {} output", engine.name());

        let conductor = Self {
            sonifier: tokio::spawn(sonifier.run(tick_rx)),
            mitigation: tokio::spawn(mitigation.run(started_rx)),
            resolution: tokio::spawn(resolution.run(resolved_rx)),
            engine,
        };

        (Router::new(tick_tx, started_tx, resolved_tx), conductor)
    }

    /// Wait for every loop to drain once the router has been dropped,
    /// then release the output engine.
    ///
    /// Held alerts finish their window before this returns.
    pub async fn finish(self) -> Result<RunStats> {
        let ticks = self.sonifier.await.context("sonification loop panicked")?;
        let incidents_started = self.mitigation.await.context("mitigation loop panicked")?;
        let incidents_resolved = self.resolution.await.context("resolution loop panicked")?;

        self.engine.shutdown();

        let stats = RunStats {
            ticks,
            incidents_started,
            incidents_resolved,
        };
        info!(
            "Stopped: {} ticks, {} incidents started, {} resolved",
            stats.ticks, stats.incidents_started, stats.incidents_resolved
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{Instrument, InstrumentRegistry, NoteMapper, Scale};
    use crate::output::CaptureEngine;
    use crate::transport::RawEvent;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_router_drop_drains_all_loops() {
        let volume = GlobalVolume::default();
        let capture = Arc::new(CaptureEngine::new());
        let engine: Arc<dyn AudioEngine> = capture.clone();

        let registry = Arc::new(InstrumentRegistry::new(
            Scale::from_pitches(vec![40, 50, 60]),
            vec![Instrument::new("A")],
        ));
        let sonifier = Sonifier::new(registry, NoteMapper::default(), volume.clone(), engine.clone())
            .with_omit_rate(0);
        let mitigation = AlertLoop::new(
            AlertKind::Mitigation,
            AlertSettings::mitigation(),
            volume.clone(),
            engine.clone(),
        );
        let resolution = AlertLoop::new(
            AlertKind::Resolution,
            AlertSettings::resolution(),
            volume.clone(),
            engine.clone(),
        );

        let (mut router, conductor) = Conductor::start(sonifier, mitigation, resolution, engine, 4);

        router.route(RawEvent::Notes(vec![50.0])).await.unwrap();
        router.route(RawEvent::Amplitudes(vec![1.0])).await.unwrap();
        router.route(RawEvent::IncidentStarted).await.unwrap();
        drop(router);

        let started = tokio::time::Instant::now();
        let stats = conductor.finish().await.unwrap();

        assert_eq!(
            stats,
            RunStats {
                ticks: 1,
                incidents_started: 1,
                incidents_resolved: 0
            }
        );
        // the held alert completed its window
        assert!(started.elapsed() >= Duration::from_secs(5));
        assert_eq!(volume.get(), 0.3);
        assert_eq!(capture.notes().len(), 1);
    }

    #[tokio::test]
    async fn test_alert_samples_preloaded_before_start() {
        let volume = GlobalVolume::default();
        let capture = Arc::new(CaptureEngine::new());
        let engine: Arc<dyn AudioEngine> = capture.clone();

        let registry = Arc::new(InstrumentRegistry::new(
            Scale::from_pitches(vec![60]),
            vec![Instrument::new("A")],
        ));
        let sonifier = Sonifier::new(registry, NoteMapper::default(), volume.clone(), engine.clone());
        let mitigation = AlertLoop::new(
            AlertKind::Mitigation,
            AlertSettings::mitigation().with_sample("ddos.wav"),
            volume.clone(),
            engine.clone(),
        );
        let resolution = AlertLoop::new(
            AlertKind::Resolution,
            AlertSettings::resolution(),
            volume.clone(),
            engine.clone(),
        );

        let (router, conductor) = Conductor::start(sonifier, mitigation, resolution, engine, 4);
        assert_eq!(capture.preloaded(), vec![std::path::PathBuf::from("ddos.wav")]);
        assert!(capture.samples().is_empty());

        drop(router);
        conductor.finish().await.unwrap();
    }
}
