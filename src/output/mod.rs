//! Audio output
//!
//! The loops never synthesize sound themselves; they call an [`AudioEngine`]
//! with fire-and-forget `play` / `play_sample` requests. Implementations
//! forward those to an OSC synth host, a MIDI port, a log, or memory.

mod capture;
mod log;
mod midi;
mod osc;
mod sampler;

pub use capture::CaptureEngine;
pub use log::{LogEngine, LogFormat};
pub use midi::{list_midi_ports, midi_velocity, MidiEngine, MidiMessage};
pub use osc::OscEngine;
pub use sampler::{SampleData, Sampler};

use crate::config::{OutputConfig, OutputKind};
use crate::mapping::{Instrument, InstrumentRegistry, Pitch};
use anyhow::Result;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Something that can make the requested sounds
pub trait AudioEngine: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Play one note
    fn play(&self, instrument: &Instrument, pitch: Pitch, duration_secs: f64, velocity: f64) -> Result<()>;

    /// Play a fixed audio sample
    fn play_sample(&self, path: &Path, gain: f64) -> Result<()>;

    /// Get a sample ready so the first `play_sample` does not have to load it
    fn preload_sample(&self, _path: &Path) -> Result<()> {
        Ok(())
    }

    /// Release anything still sounding
    fn shutdown(&self) {}
}

/// A record of one outbound request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OutputEvent {
    Note {
        instrument: String,
        pitch: Pitch,
        duration: f64,
        velocity: f64,
    },
    Sample {
        path: PathBuf,
        gain: f64,
    },
}

impl OutputEvent {
    pub fn note(instrument: &Instrument, pitch: Pitch, duration: f64, velocity: f64) -> Self {
        OutputEvent::Note {
            instrument: instrument.name.clone(),
            pitch,
            duration,
            velocity,
        }
    }

    pub fn sample(path: &Path, gain: f64) -> Self {
        OutputEvent::Sample {
            path: path.to_path_buf(),
            gain,
        }
    }
}

/// Build the configured engine
pub fn build_engine(config: &OutputConfig, registry: &InstrumentRegistry) -> Result<Arc<dyn AudioEngine>> {
    let engine: Arc<dyn AudioEngine> = match config.kind {
        OutputKind::Osc => Arc::new(OscEngine::connect(
            &config.osc.target,
            &config.osc.play_address,
            &config.osc.sample_address,
        )?),
        OutputKind::Midi => Arc::new(MidiEngine::connect(
            config.midi.port.as_deref(),
            registry,
            config.midi.velocity_ceiling,
            Sampler::new(),
        )?),
        OutputKind::Log => Arc::new(LogEngine::new(config.log.format)),
    };
    Ok(engine)
}
