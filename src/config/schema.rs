//! Configuration schema definitions

use crate::mapping::{parse_note, Mode, ScaleError};
use crate::output::LogFormat;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for tonewatch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TonewatchConfig {
    /// Base scale every instrument plays from
    #[serde(default)]
    pub scale: ScaleConfig,

    /// Randomization of omission and duration
    #[serde(default)]
    pub humanize: HumanizeConfig,

    #[serde(default)]
    pub volume: VolumeConfig,

    #[serde(default)]
    pub alerts: AlertsConfig,

    /// One instrument per traffic slot, in slot order
    #[serde(default = "default_instruments")]
    pub instruments: Vec<InstrumentConfig>,

    /// Shuffle instrument order once at startup
    #[serde(default = "default_shuffle")]
    pub shuffle: bool,

    /// Profile to use instead of the top-level scale and instruments
    #[serde(default)]
    pub profile: Option<String>,

    /// Named alternate setups (e.g. an orchestra with ranged instruments)
    #[serde(default)]
    pub profiles: BTreeMap<String, ProfileConfig>,

    #[serde(default)]
    pub transport: TransportConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

impl Default for TonewatchConfig {
    fn default() -> Self {
        Self {
            scale: ScaleConfig::default(),
            humanize: HumanizeConfig::default(),
            volume: VolumeConfig::default(),
            alerts: AlertsConfig::default(),
            instruments: default_instruments(),
            shuffle: default_shuffle(),
            profile: None,
            profiles: BTreeMap::new(),
            transport: TransportConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

fn default_shuffle() -> bool { true }

/// Sonic Pi's built-in synths, the usual target of the OSC output
fn default_instruments() -> Vec<InstrumentConfig> {
    [
        "beep", "blade", "bnoise", "chipbass", "chiplead", "dark_ambience", "dpulse",
        "dsaw", "dtri", "fm", "growl", "hollow", "hoover", "kalimba", "mod_beep",
        "mod_fm", "mod_pulse", "mod_saw", "mod_sine", "mod_tri", "piano", "pluck",
        "pretty_bell", "prophet", "pulse", "saw", "sine", "square", "subpulse",
        "supersaw", "tb303", "tech_saws", "tri", "zawa",
    ]
    .into_iter()
    .map(InstrumentConfig::named)
    .collect()
}

impl TonewatchConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.scale.validate().context("invalid scale")?;

        let h = &self.humanize;
        if !(h.min_duration > 0.0 && h.min_duration.is_finite())
            || !(h.max_duration > 0.0 && h.max_duration.is_finite())
        {
            bail!("Note durations must be positive and finite");
        }
        if h.min_duration > h.max_duration {
            bail!(
                "min_duration ({}) is greater than max_duration ({})",
                h.min_duration,
                h.max_duration
            );
        }

        if !(self.volume.baseline >= 0.0 && self.volume.baseline.is_finite()) {
            bail!("Baseline volume must be a finite, non-negative number");
        }
        self.alerts.mitigation.validate("mitigation")?;
        self.alerts.resolution.validate("resolution")?;

        validate_instruments(&self.instruments).context("invalid instruments")?;

        for (name, profile) in &self.profiles {
            if let Some(scale) = &profile.scale {
                scale
                    .validate()
                    .with_context(|| format!("invalid scale in profile '{}'", name))?;
            }
            validate_instruments(&profile.instruments)
                .with_context(|| format!("invalid instruments in profile '{}'", name))?;
        }

        if let Some(name) = &self.profile {
            if !self.profiles.contains_key(name) {
                bail!("Unknown profile '{}'", name);
            }
        }

        if self.transport.queue == 0 {
            bail!("Transport queue capacity must be at least 1");
        }
        let ceiling = self.output.midi.velocity_ceiling;
        if !(ceiling > 0.0 && ceiling.is_finite()) {
            bail!("MIDI velocity_ceiling must be positive and finite");
        }

        Ok(())
    }
}

fn validate_instruments(instruments: &[InstrumentConfig]) -> Result<()> {
    if instruments.is_empty() {
        bail!("At least one instrument is required");
    }
    for inst in instruments {
        if inst.name.trim().is_empty() {
            bail!("Instrument names must not be empty");
        }
        if let Some([low, high]) = &inst.range {
            let (lo, hi) = (low.resolve()?, high.resolve()?);
            if lo > hi {
                bail!("Instrument '{}' has inverted range {}..{}", inst.name, low, high);
            }
        }
        if let Some(channel) = inst.channel {
            if channel > 15 {
                bail!("Instrument '{}' MIDI channel {} is out of range 0-15", inst.name, channel);
            }
        }
        if let Some(program) = inst.program {
            if program > 127 {
                bail!("Instrument '{}' MIDI program {} is out of range 0-127", inst.name, program);
            }
        }
    }
    Ok(())
}

/// A pitch written either as a MIDI number or a note name like `c2` / `fs4`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PitchSpec {
    Midi(i64),
    Name(String),
}

impl PitchSpec {
    /// Resolve to a MIDI note number
    pub fn resolve(&self) -> Result<i32, ScaleError> {
        match self {
            PitchSpec::Midi(n) => i32::try_from(*n)
                .ok()
                .filter(|n| (0..=127).contains(n))
                .ok_or_else(|| ScaleError::BadNote(n.to_string())),
            PitchSpec::Name(name) => parse_note(name),
        }
    }
}

impl fmt::Display for PitchSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PitchSpec::Midi(n) => write!(f, "{}", n),
            PitchSpec::Name(name) => write!(f, "{}", name),
        }
    }
}

/// Scale settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScaleConfig {
    /// Lowest note (default: c2)
    #[serde(default = "default_root")]
    pub root: PitchSpec,

    /// Mode name (default: minor)
    #[serde(default = "default_mode")]
    pub mode: String,

    /// Octaves above the root (default: 7)
    #[serde(default = "default_octaves")]
    pub octaves: u32,
}

impl Default for ScaleConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            mode: default_mode(),
            octaves: default_octaves(),
        }
    }
}

fn default_root() -> PitchSpec { PitchSpec::Name("c2".to_string()) }
fn default_mode() -> String { "minor".to_string() }
fn default_octaves() -> u32 { 7 }

impl ScaleConfig {
    fn validate(&self) -> Result<()> {
        if !(1..=10).contains(&self.octaves) {
            bail!("octaves must be between 1 and 10, got {}", self.octaves);
        }
        self.root.resolve()?;
        if Mode::from_name(&self.mode).is_none() {
            bail!(ScaleError::UnknownMode(self.mode.clone()));
        }
        Ok(())
    }
}

/// Humanization settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HumanizeConfig {
    /// Omit one slot in this many on average; 0 never omits (default: 3)
    #[serde(default = "default_omit_rate")]
    pub omit_rate: u32,

    /// Shortest note in seconds (default: 0.1)
    #[serde(default = "default_min_duration")]
    pub min_duration: f64,

    /// Longest note in seconds (default: 0.7)
    #[serde(default = "default_max_duration")]
    pub max_duration: f64,

    /// Fixed seed for reproducible runs
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for HumanizeConfig {
    fn default() -> Self {
        Self {
            omit_rate: default_omit_rate(),
            min_duration: default_min_duration(),
            max_duration: default_max_duration(),
            seed: None,
        }
    }
}

fn default_omit_rate() -> u32 { 3 }
fn default_min_duration() -> f64 { 0.1 }
fn default_max_duration() -> f64 { 0.7 }

/// Volume settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeConfig {
    /// Starting global volume (default: 1.0)
    #[serde(default = "default_baseline")]
    pub baseline: f64,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self { baseline: default_baseline() }
    }
}

fn default_baseline() -> f64 { 1.0 }

/// Alert loops. Unset fields take the per-alert defaults
/// (mitigation: gain 5, hold 6s, restore 0.3; resolution: gain 3, hold 4s, restore 1.0).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertsConfig {
    #[serde(default)]
    pub mitigation: AlertConfig,

    #[serde(default)]
    pub resolution: AlertConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertConfig {
    /// WAV file played on trigger
    #[serde(default)]
    pub sample: Option<PathBuf>,

    #[serde(default)]
    pub gain: Option<f64>,

    /// Volume while the alert holds (default: 0.05)
    #[serde(default)]
    pub duck: Option<f64>,

    #[serde(default)]
    pub hold_secs: Option<f64>,

    /// Volume once the hold ends
    #[serde(default)]
    pub restore: Option<f64>,
}

impl AlertConfig {
    fn validate(&self, name: &str) -> Result<()> {
        for (field, value) in [("gain", self.gain), ("duck", self.duck), ("restore", self.restore)] {
            if matches!(value, Some(v) if !(v >= 0.0 && v.is_finite())) {
                bail!("Alert '{}' {} must be a finite, non-negative number", name, field);
            }
        }
        if let Some(hold) = self.hold_secs {
            if Duration::try_from_secs_f64(hold).is_err() {
                bail!("Alert '{}' hold_secs must be a non-negative number of seconds, got {}", name, hold);
            }
        }
        Ok(())
    }
}

/// Instrument entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentConfig {
    pub name: String,

    /// Playable range as `[low, high]`, inclusive
    #[serde(default)]
    pub range: Option<[PitchSpec; 2]>,

    /// MIDI channel 0-15 (default: 0)
    #[serde(default)]
    pub channel: Option<u8>,

    /// MIDI program sent at startup
    #[serde(default)]
    pub program: Option<u8>,
}

impl InstrumentConfig {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            range: None,
            channel: None,
            program: None,
        }
    }
}

/// Named alternate scale and instrument set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileConfig {
    #[serde(default)]
    pub scale: Option<ScaleConfig>,

    pub instruments: Vec<InstrumentConfig>,

    /// Overrides the top-level `shuffle` when set
    #[serde(default)]
    pub shuffle: Option<bool>,
}

/// Inbound transport settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// UDP address to listen on (default: 0.0.0.0:4559)
    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default)]
    pub addresses: AddressConfig,

    /// Capacity of each loop's channel (default: 64)
    #[serde(default = "default_queue")]
    pub queue: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            addresses: AddressConfig::default(),
            queue: default_queue(),
        }
    }
}

fn default_listen() -> String { "0.0.0.0:4559".to_string() }
fn default_queue() -> usize { 64 }

/// OSC addresses of the inbound messages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressConfig {
    #[serde(default = "default_note_address")]
    pub note: String,

    #[serde(default = "default_amp_address")]
    pub amp: String,

    #[serde(default = "default_started_address")]
    pub incident_started: String,

    #[serde(default = "default_resolved_address")]
    pub incident_resolved: String,
}

impl Default for AddressConfig {
    fn default() -> Self {
        Self {
            note: default_note_address(),
            amp: default_amp_address(),
            incident_started: default_started_address(),
            incident_resolved: default_resolved_address(),
        }
    }
}

fn default_note_address() -> String { "/note".to_string() }
fn default_amp_address() -> String { "/amp".to_string() }
fn default_started_address() -> String { "/2/buttonListener".to_string() }
fn default_resolved_address() -> String { "/1/buttonListener".to_string() }

/// Output settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub kind: OutputKind,

    #[serde(default)]
    pub osc: OscOutputConfig,

    #[serde(default)]
    pub midi: MidiOutputConfig,

    #[serde(default)]
    pub log: LogOutputConfig,
}

/// Where notes go
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    /// OSC messages to a synth host
    Osc,
    /// A MIDI output port
    Midi,
    /// Log only, no sound
    #[default]
    Log,
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputKind::Osc => write!(f, "osc"),
            OutputKind::Midi => write!(f, "midi"),
            OutputKind::Log => write!(f, "log"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OscOutputConfig {
    /// Synth host address (default: 127.0.0.1:4560)
    #[serde(default = "default_osc_target")]
    pub target: String,

    #[serde(default = "default_play_address")]
    pub play_address: String,

    #[serde(default = "default_sample_address")]
    pub sample_address: String,
}

impl Default for OscOutputConfig {
    fn default() -> Self {
        Self {
            target: default_osc_target(),
            play_address: default_play_address(),
            sample_address: default_sample_address(),
        }
    }
}

fn default_osc_target() -> String { "127.0.0.1:4560".to_string() }
fn default_play_address() -> String { "/play".to_string() }
fn default_sample_address() -> String { "/sample".to_string() }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MidiOutputConfig {
    /// Port name substring (None = first port)
    #[serde(default)]
    pub port: Option<String>,

    /// Velocity that maps to MIDI 127 (default: 3.0, the loudest unscaled note)
    #[serde(default = "default_velocity_ceiling")]
    pub velocity_ceiling: f64,
}

impl Default for MidiOutputConfig {
    fn default() -> Self {
        Self {
            port: None,
            velocity_ceiling: default_velocity_ceiling(),
        }
    }
}

fn default_velocity_ceiling() -> f64 { 3.0 }

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogOutputConfig {
    #[serde(default)]
    pub format: LogFormat,
}
