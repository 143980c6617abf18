//! In-memory engine that records every request

use super::{AudioEngine, OutputEvent};
use crate::mapping::{Instrument, Pitch};
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Records requests instead of playing them
#[derive(Debug, Default)]
pub struct CaptureEngine {
    events: Mutex<Vec<OutputEvent>>,
    preloaded: Mutex<Vec<PathBuf>>,
}

impl CaptureEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far
    pub fn events(&self) -> Vec<OutputEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Only the note requests
    pub fn notes(&self) -> Vec<OutputEvent> {
        self.events()
            .into_iter()
            .filter(|e| matches!(e, OutputEvent::Note { .. }))
            .collect()
    }

    /// Only the sample requests
    pub fn samples(&self) -> Vec<OutputEvent> {
        self.events()
            .into_iter()
            .filter(|e| matches!(e, OutputEvent::Sample { .. }))
            .collect()
    }

    /// Samples readied ahead of playback
    pub fn preloaded(&self) -> Vec<PathBuf> {
        self.preloaded.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    fn push(&self, event: OutputEvent) {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).push(event);
    }
}

impl AudioEngine for CaptureEngine {
    fn name(&self) -> &str {
        "capture"
    }

    fn play(&self, instrument: &Instrument, pitch: Pitch, duration_secs: f64, velocity: f64) -> Result<()> {
        self.push(OutputEvent::note(instrument, pitch, duration_secs, velocity));
        Ok(())
    }

    fn play_sample(&self, path: &Path, gain: f64) -> Result<()> {
        self.push(OutputEvent::sample(path, gain));
        Ok(())
    }

    fn preload_sample(&self, path: &Path) -> Result<()> {
        self.preloaded
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(path.to_path_buf());
        Ok(())
    }
}
