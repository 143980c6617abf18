//! Incident alert loops
//!
//! Each loop waits for its own trigger, plays an alert sample, ducks the
//! global volume for a hold window and then restores it. Triggers that
//! arrive during a hold queue up and are handled afterwards, in order.
//! The two loops never coordinate: when their windows overlap, whichever
//! writes the volume last decides the level.

use super::GlobalVolume;
use crate::output::AudioEngine;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertKind {
    /// Incident started
    Mitigation,
    /// Incident resolved
    Resolution,
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertKind::Mitigation => write!(f, "mitigation"),
            AlertKind::Resolution => write!(f, "resolution"),
        }
    }
}

/// Behaviour of one alert loop
#[derive(Debug, Clone, PartialEq)]
pub struct AlertSettings {
    /// Sample to play on trigger; `None` only ducks
    pub sample: Option<PathBuf>,
    pub gain: f64,
    /// Volume while holding
    pub duck: f64,
    pub hold: Duration,
    /// Volume after the hold
    pub restore: f64,
}

impl AlertSettings {
    pub fn mitigation() -> Self {
        Self {
            sample: None,
            gain: 5.0,
            duck: 0.05,
            hold: Duration::from_secs(6),
            restore: 0.3,
        }
    }

    pub fn resolution() -> Self {
        Self {
            sample: None,
            gain: 3.0,
            duck: 0.05,
            hold: Duration::from_secs(4),
            restore: 1.0,
        }
    }

    pub fn for_kind(kind: AlertKind) -> Self {
        match kind {
            AlertKind::Mitigation => Self::mitigation(),
            AlertKind::Resolution => Self::resolution(),
        }
    }

    pub fn with_sample(mut self, path: impl Into<PathBuf>) -> Self {
        self.sample = Some(path.into());
        self
    }
}

pub struct AlertLoop {
    kind: AlertKind,
    settings: AlertSettings,
    volume: GlobalVolume,
    engine: Arc<dyn AudioEngine>,
}

impl AlertLoop {
    pub fn new(
        kind: AlertKind,
        settings: AlertSettings,
        volume: GlobalVolume,
        engine: Arc<dyn AudioEngine>,
    ) -> Self {
        Self {
            kind,
            settings,
            volume,
            engine,
        }
    }

    pub fn kind(&self) -> AlertKind {
        self.kind
    }

    pub fn settings(&self) -> &AlertSettings {
        &self.settings
    }

    /// Handle one trigger: sample, duck, hold, restore.
    /// The duck happens before the first await.
    pub async fn fire(&self) {
        if let Some(path) = &self.settings.sample {
            if let Err(e) = self.engine.play_sample(path, self.settings.gain) {
                warn!("{} alert sample {:?} failed: {}", self.kind, path, e);
            }
        }

        let previous = self.volume.swap(self.settings.duck);
        info!(
            "{} alert: volume {:.2} -> {:.2} for {:?}",
            self.kind, previous, self.settings.duck, self.settings.hold
        );

        tokio::time::sleep(self.settings.hold).await;

        self.volume.set(self.settings.restore);
        info!("{} alert: volume restored to {:.2}", self.kind, self.settings.restore);
    }

    /// Handle triggers until the channel closes. Returns the number handled.
    pub async fn run(self, mut triggers: mpsc::Receiver<()>) -> u64 {
        let mut fired = 0;
        while triggers.recv().await.is_some() {
            self.fire().await;
            fired += 1;
        }
        info!("{} loop stopped after {} triggers", self.kind, fired);
        fired
    }
}
