//! Configuration loading and validation

mod schema;

pub use schema::*;

use crate::engine::{AlertKind, AlertSettings};
use crate::mapping::{Instrument, InstrumentRegistry, Mode, NoteMapper, Pitch, Scale, ScaleError};
use crate::transport::OscRoutes;
use anyhow::{anyhow, Context, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Load configuration from a YAML file.
///
/// Relative alert sample paths are resolved against the file's directory.
pub fn load_config(path: &Path) -> Result<TonewatchConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {:?}", path))?;
    let mut config: TonewatchConfig = serde_yaml::from_str(&contents)
        .with_context(|| format!("failed to parse config {:?}", path))?;
    config.validate()?;

    if let Some(base) = path.parent() {
        for alert in [&mut config.alerts.mitigation, &mut config.alerts.resolution] {
            if let Some(sample) = alert.sample.as_mut() {
                if sample.is_relative() {
                    *sample = base.join(&*sample);
                }
            }
        }
    }

    Ok(config)
}

impl ScaleConfig {
    pub fn build(&self) -> Result<Scale, ScaleError> {
        let root = self.root.resolve()?;
        let mode = Mode::from_name(&self.mode).ok_or_else(|| ScaleError::UnknownMode(self.mode.clone()))?;
        Scale::build(root, &mode, self.octaves)
    }
}

impl InstrumentConfig {
    /// Build the instrument for registry slot `slot`.
    ///
    /// Without an explicit channel the slot index picks one, wrapping after 16.
    pub fn build(&self, slot: usize) -> Result<Instrument, ScaleError> {
        let mut instrument = Instrument::new(&self.name);
        if let Some([low, high]) = &self.range {
            instrument = instrument.with_range(low.resolve()? as Pitch, high.resolve()? as Pitch);
        }
        instrument = instrument.with_channel(self.channel.unwrap_or((slot % 16) as u8));
        if let Some(program) = self.program {
            instrument = instrument.with_program(program);
        }
        Ok(instrument)
    }
}

impl AlertConfig {
    /// Fill unset fields from the defaults of `kind`
    pub fn settings(&self, kind: AlertKind) -> AlertSettings {
        let defaults = AlertSettings::for_kind(kind);
        AlertSettings {
            sample: self.sample.clone(),
            gain: self.gain.unwrap_or(defaults.gain),
            duck: self.duck.unwrap_or(defaults.duck),
            hold: self
                .hold_secs
                .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
                .unwrap_or(defaults.hold),
            restore: self.restore.unwrap_or(defaults.restore),
        }
    }
}

impl From<&AddressConfig> for OscRoutes {
    fn from(addresses: &AddressConfig) -> Self {
        OscRoutes {
            note: addresses.note.clone(),
            amp: addresses.amp.clone(),
            incident_started: addresses.incident_started.clone(),
            incident_resolved: addresses.incident_resolved.clone(),
        }
    }
}

/// The scale and instruments a run actually uses, after profile selection
#[derive(Debug, Clone)]
pub struct Setup<'a> {
    /// Selected profile name, `None` for the top level
    pub profile: Option<&'a str>,
    pub scale: &'a ScaleConfig,
    pub instruments: &'a [InstrumentConfig],
    pub shuffle: bool,
}

impl TonewatchConfig {
    /// Pick the profile named by `choice`, else the configured one, else the top level
    pub fn setup<'a>(&'a self, choice: Option<&'a str>) -> Result<Setup<'a>> {
        let Some(name) = choice.or(self.profile.as_deref()) else {
            return Ok(Setup {
                profile: None,
                scale: &self.scale,
                instruments: &self.instruments,
                shuffle: self.shuffle,
            });
        };

        let profile = self.profiles.get(name).ok_or_else(|| {
            let known: Vec<&str> = self.profiles.keys().map(String::as_str).collect();
            anyhow!("Unknown profile '{}' (known: {})", name, known.join(", "))
        })?;

        Ok(Setup {
            profile: Some(name),
            scale: profile.scale.as_ref().unwrap_or(&self.scale),
            instruments: &profile.instruments,
            shuffle: profile.shuffle.unwrap_or(self.shuffle),
        })
    }

    /// Build the instrument registry for the chosen profile.
    ///
    /// With `shuffle` set the order is shuffled once, reproducibly when a seed
    /// is configured. Default MIDI channels follow the final slot order.
    pub fn registry(&self, choice: Option<&str>) -> Result<InstrumentRegistry> {
        let setup = self.setup(choice)?;
        let scale = setup.scale.build().context("failed to build scale")?;

        let mut order: Vec<&InstrumentConfig> = setup.instruments.iter().collect();
        if setup.shuffle {
            let mut rng = match self.humanize.seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            order.shuffle(&mut rng);
        }

        let instruments = order
            .into_iter()
            .enumerate()
            .map(|(slot, inst)| inst.build(slot))
            .collect::<Result<Vec<_>, _>>()
            .context("failed to build instruments")?;

        debug!(
            "Scale has {} pitches, {} instruments (profile {:?})",
            scale.len(),
            instruments.len(),
            setup.profile
        );

        Ok(InstrumentRegistry::new(scale, instruments))
    }

    pub fn mapper(&self) -> NoteMapper {
        NoteMapper::new(self.humanize.min_duration, self.humanize.max_duration)
    }

    pub fn alert_settings(&self, kind: AlertKind) -> AlertSettings {
        match kind {
            AlertKind::Mitigation => self.alerts.mitigation.settings(kind),
            AlertKind::Resolution => self.alerts.resolution.settings(kind),
        }
    }

    pub fn routes(&self) -> OscRoutes {
        OscRoutes::from(&self.transport.addresses)
    }
}
