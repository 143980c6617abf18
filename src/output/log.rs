//! Silent engine that logs what it would have played

use super::{AudioEngine, OutputEvent};
use crate::mapping::{Instrument, Pitch};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;
use tracing::info;

/// How logged events are written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Through the tracing subscriber
    #[default]
    Text,
    /// One JSON object per line on stdout
    Json,
}

/// Logs requests instead of playing them
pub struct LogEngine {
    format: LogFormat,
}

impl LogEngine {
    pub fn new(format: LogFormat) -> Self {
        Self { format }
    }

    fn emit(&self, event: &OutputEvent) -> Result<()> {
        match self.format {
            LogFormat::Text => match event {
                OutputEvent::Note {
                    instrument,
                    pitch,
                    duration,
                    velocity,
                } => info!(
                    "play {} note={} dur={:.2}s vel={:.3}",
                    instrument, pitch, duration, velocity
                ),
                OutputEvent::Sample { path, gain } => {
                    info!("sample {:?} gain={:.2}", path, gain)
                }
            },
            LogFormat::Json => {
                let line = serde_json::to_string(event)?;
                let mut stdout = std::io::stdout().lock();
                writeln!(stdout, "{}", line)?;
            }
        }
        Ok(())
    }
}

impl AudioEngine for LogEngine {
    fn name(&self) -> &str {
        "log"
    }

    fn play(&self, instrument: &Instrument, pitch: Pitch, duration_secs: f64, velocity: f64) -> Result<()> {
        self.emit(&OutputEvent::note(instrument, pitch, duration_secs, velocity))
    }

    fn play_sample(&self, path: &Path, gain: f64) -> Result<()> {
        self.emit(&OutputEvent::sample(path, gain))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_shape() {
        let event = OutputEvent::note(&Instrument::new("pluck"), 48, 0.25, 2.5);
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "note");
        assert_eq!(json["instrument"], "pluck");
        assert_eq!(json["pitch"], 48);

        let event = OutputEvent::sample(Path::new("/tmp/a.wav"), 3.0);
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "sample");
        assert_eq!(json["gain"], 3.0);
    }

    #[test]
    fn test_log_engine_accepts_requests() {
        for format in [LogFormat::Text, LogFormat::Json] {
            let engine = LogEngine::new(format);
            assert!(engine.play(&Instrument::new("a"), 60, 0.1, 1.0).is_ok());
            assert!(engine.play_sample(Path::new("x.wav"), 1.0).is_ok());
        }
    }

    #[test]
    fn test_log_format_from_yaml() {
        let format: LogFormat = serde_yaml::from_str("json").unwrap();
        assert_eq!(format, LogFormat::Json);
    }
}
