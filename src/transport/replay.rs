//! JSON-lines replay feed
//!
//! Drives the loops from a recorded or hand-written script instead of the
//! network. One object per line:
//!
//! ```text
//! {"type": "notes", "values": [0, 50, 85]}
//! {"type": "amplitudes", "values": [1.0, 0.1, 1.0]}
//! {"type": "sleep", "secs": 1.0}
//! {"type": "incident_started"}
//! {"type": "incident_resolved"}
//! ```
//!
//! Blank lines and lines starting with `#` are skipped.

use super::{DecodeError, RawEvent, Router};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::{info, warn};

/// One line of a replay script
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReplayLine {
    Notes { values: Vec<f64> },
    Amplitudes { values: Vec<f64> },
    IncidentStarted,
    IncidentResolved,
    Sleep { secs: f64 },
}

impl ReplayLine {
    /// The transport event this line stands for, if any
    pub fn into_event(self) -> Option<RawEvent> {
        match self {
            ReplayLine::Notes { values } => Some(RawEvent::Notes(values)),
            ReplayLine::Amplitudes { values } => Some(RawEvent::Amplitudes(values)),
            ReplayLine::IncidentStarted => Some(RawEvent::IncidentStarted),
            ReplayLine::IncidentResolved => Some(RawEvent::IncidentResolved),
            ReplayLine::Sleep { .. } => None,
        }
    }
}

/// Parse a single line. `Ok(None)` for blanks and comments.
pub fn parse_line(line: &str) -> Result<Option<ReplayLine>, DecodeError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    serde_json::from_str(line)
        .map(Some)
        .map_err(|e| DecodeError::Replay(e.to_string()))
}

/// Counts from a finished replay
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReplayStats {
    pub lines: usize,
    pub events: usize,
    pub skipped: usize,
}

/// Reads a replay script and routes its events
pub struct ReplayFeed<R> {
    reader: R,
}

impl ReplayFeed<BufReader<tokio::fs::File>> {
    pub async fn open(path: &Path) -> Result<Self> {
        let file = tokio::fs::File::open(path)
            .await
            .with_context(|| format!("failed to open replay file: {:?}", path))?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: AsyncBufRead + Unpin> ReplayFeed<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Play the script to the end (or until `shutdown`), then drop the router.
    pub async fn run(self, mut router: Router, mut shutdown: watch::Receiver<bool>) -> Result<ReplayStats> {
        let mut stats = ReplayStats::default();
        let mut lines = self.reader.lines();

        while let Some(line) = lines.next_line().await? {
            if *shutdown.borrow() {
                break;
            }
            stats.lines += 1;

            let parsed = match parse_line(&line) {
                Ok(Some(parsed)) => parsed,
                Ok(None) => continue,
                Err(e) => {
                    warn!("Line {}: {}", stats.lines, e);
                    stats.skipped += 1;
                    continue;
                }
            };

            if let ReplayLine::Sleep { secs } = parsed {
                if !secs.is_finite() || secs < 0.0 {
                    warn!("Line {}: sleep of {} seconds ignored", stats.lines, secs);
                    stats.skipped += 1;
                    continue;
                }
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_secs_f64(secs)) => {}
                    _ = shutdown.changed() => break,
                }
                continue;
            }

            if let Some(event) = parsed.into_event() {
                stats.events += 1;
                if let Err(e) = router.route(event).await {
                    warn!("{}; replay stopping", e);
                    break;
                }
            }
        }

        info!(
            "Replay finished: {} lines, {} events, {} skipped",
            stats.lines, stats.events, stats.skipped
        );
        Ok(stats)
    }
}
