//! Scale construction and quantization
//!
//! A [`Scale`] is an ordered run of MIDI pitches built from a root note, a
//! [`Mode`] and an octave span. Traffic values in 0..=100 are quantized onto
//! it linearly, with 0 reserved for silence.

use thiserror::Error;

/// A MIDI note number (C4 = 60)
pub type Pitch = u8;

/// Highest playable MIDI note
pub const MAX_PITCH: i32 = 127;

/// Errors raised while building a scale
#[derive(Debug, Error, PartialEq)]
pub enum ScaleError {
    #[error("unrecognized note name '{0}'")]
    BadNote(String),

    #[error("unknown mode '{0}'")]
    UnknownMode(String),

    #[error("scale from root {root} over {octaves} octave(s) contains no playable pitches")]
    Empty { root: i32, octaves: u32 },
}

/// Musical mode definition (intervals in semitones from root)
#[derive(Debug, Clone, PartialEq)]
pub struct Mode {
    name: String,
    intervals: Vec<u8>,
}

impl Mode {
    /// Create a new mode
    pub fn new(name: &str, intervals: Vec<u8>) -> Self {
        Self {
            name: name.to_string(),
            intervals,
        }
    }

    /// Major (ionian)
    pub fn major() -> Self {
        Self::new("major", vec![0, 2, 4, 5, 7, 9, 11])
    }

    /// Natural minor (aeolian)
    pub fn minor() -> Self {
        Self::new("minor", vec![0, 2, 3, 5, 7, 8, 10])
    }

    pub fn dorian() -> Self {
        Self::new("dorian", vec![0, 2, 3, 5, 7, 9, 10])
    }

    pub fn phrygian() -> Self {
        Self::new("phrygian", vec![0, 1, 3, 5, 7, 8, 10])
    }

    pub fn lydian() -> Self {
        Self::new("lydian", vec![0, 2, 4, 6, 7, 9, 11])
    }

    pub fn mixolydian() -> Self {
        Self::new("mixolydian", vec![0, 2, 4, 5, 7, 9, 10])
    }

    pub fn locrian() -> Self {
        Self::new("locrian", vec![0, 1, 3, 5, 6, 8, 10])
    }

    pub fn harmonic_minor() -> Self {
        Self::new("harmonic_minor", vec![0, 2, 3, 5, 7, 8, 11])
    }

    pub fn melodic_minor() -> Self {
        Self::new("melodic_minor", vec![0, 2, 3, 5, 7, 9, 11])
    }

    /// Minor pentatonic scale (root, m3, P4, P5, m7)
    pub fn minor_pentatonic() -> Self {
        Self::new("minor_pentatonic", vec![0, 3, 5, 7, 10])
    }

    /// Major pentatonic scale (root, M2, M3, P5, M6)
    pub fn major_pentatonic() -> Self {
        Self::new("major_pentatonic", vec![0, 2, 4, 7, 9])
    }

    /// Minor blues (pentatonic plus the flat fifth)
    pub fn blues() -> Self {
        Self::new("blues", vec![0, 3, 5, 6, 7, 10])
    }

    pub fn whole_tone() -> Self {
        Self::new("whole_tone", vec![0, 2, 4, 6, 8, 10])
    }

    pub fn chromatic() -> Self {
        Self::new("chromatic", (0..12).collect())
    }

    /// Get mode by name
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "major" | "ionian" => Some(Self::major()),
            "minor" | "natural_minor" | "aeolian" => Some(Self::minor()),
            "dorian" => Some(Self::dorian()),
            "phrygian" => Some(Self::phrygian()),
            "lydian" => Some(Self::lydian()),
            "mixolydian" => Some(Self::mixolydian()),
            "locrian" => Some(Self::locrian()),
            "harmonic_minor" => Some(Self::harmonic_minor()),
            "melodic_minor" => Some(Self::melodic_minor()),
            "pentatonic" | "minor_pentatonic" => Some(Self::minor_pentatonic()),
            "major_pentatonic" => Some(Self::major_pentatonic()),
            "blues" | "minor_blues" => Some(Self::blues()),
            "whole_tone" | "wholetone" => Some(Self::whole_tone()),
            "chromatic" => Some(Self::chromatic()),
            _ => None,
        }
    }

    /// Get the name of this mode
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the intervals
    pub fn intervals(&self) -> &[u8] {
        &self.intervals
    }
}

/// Parse a note name such as `c2`, `fs3`, `Eb4` or `C#-1` into a MIDI number.
///
/// Plain integers are accepted as MIDI numbers. Octave numbering puts C4 at 60.
pub fn parse_note(name: &str) -> Result<i32, ScaleError> {
    let bad = || ScaleError::BadNote(name.to_string());
    let trimmed = name.trim().trim_start_matches(':');

    if let Ok(midi) = trimmed.parse::<i32>() {
        return if (0..=MAX_PITCH).contains(&midi) {
            Ok(midi)
        } else {
            Err(bad())
        };
    }

    let lower = trimmed.to_lowercase();
    let mut chars = lower.chars().peekable();

    let pitch_class = match chars.next().ok_or_else(bad)? {
        'c' => 0,
        'd' => 2,
        'e' => 4,
        'f' => 5,
        'g' => 7,
        'a' => 9,
        'b' => 11,
        _ => return Err(bad()),
    };

    let mut accidental = 0;
    while let Some(&c) = chars.peek() {
        match c {
            's' | '#' => accidental += 1,
            'b' => accidental -= 1,
            _ => break,
        }
        chars.next();
    }

    let octave_text: String = chars.collect();
    let octave = if octave_text.is_empty() {
        4
    } else {
        octave_text.parse::<i32>().map_err(|_| bad())?
    };

    let midi = (octave + 1) * 12 + pitch_class + accidental;
    if (0..=MAX_PITCH).contains(&midi) {
        Ok(midi)
    } else {
        Err(bad())
    }
}

/// An ordered, strictly increasing set of playable pitches
#[derive(Debug, Clone, PartialEq)]
pub struct Scale {
    pitches: Vec<Pitch>,
}

impl Scale {
    /// Build a scale spanning `octaves` octaves upward from `root`.
    ///
    /// The closing tonic one span above the root is included, so C2 minor
    /// over 7 octaves yields 7 * 7 + 1 = 50 pitches. Anything above MIDI 127
    /// is dropped.
    pub fn build(root: i32, mode: &Mode, octaves: u32) -> Result<Self, ScaleError> {
        let mut pitches = Vec::new();

        for octave in 0..octaves as i32 {
            for &interval in mode.intervals() {
                pitches.push(root + octave * 12 + interval as i32);
            }
        }
        pitches.push(root + octaves as i32 * 12);

        let pitches: Vec<Pitch> = pitches
            .into_iter()
            .filter(|p| (0..=MAX_PITCH).contains(p))
            .map(|p| p as Pitch)
            .collect();

        if pitches.is_empty() {
            return Err(ScaleError::Empty { root, octaves });
        }

        Ok(Self { pitches })
    }

    /// Build from textual root and mode names
    pub fn from_names(root: &str, mode: &str, octaves: u32) -> Result<Self, ScaleError> {
        let root = parse_note(root)?;
        let mode = Mode::from_name(mode).ok_or_else(|| ScaleError::UnknownMode(mode.to_string()))?;
        Self::build(root, &mode, octaves)
    }

    /// Wrap an explicit pitch list. Input is sorted and deduplicated.
    pub fn from_pitches(mut pitches: Vec<Pitch>) -> Self {
        pitches.sort_unstable();
        pitches.dedup();
        Self { pitches }
    }

    pub fn pitches(&self) -> &[Pitch] {
        &self.pitches
    }

    pub fn len(&self) -> usize {
        self.pitches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pitches.is_empty()
    }

    pub fn lowest(&self) -> Option<Pitch> {
        self.pitches.first().copied()
    }

    pub fn highest(&self) -> Option<Pitch> {
        self.pitches.last().copied()
    }

    /// Keep only the pitches within `[low, high]` inclusive, preserving order.
    ///
    /// The result may be empty; quantizing against it always yields silence.
    pub fn trim(&self, low: Pitch, high: Pitch) -> Scale {
        Scale {
            pitches: self
                .pitches
                .iter()
                .copied()
                .filter(|&p| p >= low && p <= high)
                .collect(),
        }
    }

    /// Index a traffic value (0..=100) would select, or `None` for silence.
    pub fn index_for(&self, value: f64) -> Option<usize> {
        if value <= 0.0 || value.is_nan() || self.pitches.is_empty() {
            return None;
        }
        let last = self.pitches.len() - 1;
        let index = (value.min(100.0) * last as f64 / 100.0).floor() as usize;
        Some(index.min(last))
    }

    /// Map a traffic value (0..=100) onto the scale. Zero means silence.
    pub fn quantize(&self, value: f64) -> Option<Pitch> {
        self.index_for(value).map(|i| self.pitches[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_creation() {
        let mode = Mode::minor_pentatonic();
        assert_eq!(mode.name(), "minor_pentatonic");
        assert_eq!(mode.intervals(), &[0, 3, 5, 7, 10]);
    }

    #[test]
    fn test_mode_from_name() {
        assert!(Mode::from_name("minor").is_some());
        assert!(Mode::from_name("Major").is_some());
        assert!(Mode::from_name("dorian").is_some());
        assert_eq!(Mode::from_name("aeolian"), Some(Mode::minor()));
        assert!(Mode::from_name("unknown").is_none());
    }

    #[test]
    fn test_parse_note_names() {
        assert_eq!(parse_note("c4"), Ok(60));
        assert_eq!(parse_note("c2"), Ok(36));
        assert_eq!(parse_note("c0"), Ok(12));
        assert_eq!(parse_note("C#4"), Ok(61));
        assert_eq!(parse_note("fs3"), Ok(54));
        assert_eq!(parse_note("eb4"), Ok(63));
        assert_eq!(parse_note("bb3"), Ok(58));
        assert_eq!(parse_note("b3"), Ok(59));
        assert_eq!(parse_note(":a4"), Ok(69));
        assert_eq!(parse_note("c-1"), Ok(0));
        assert_eq!(parse_note("a"), Ok(69));
        assert_eq!(parse_note("42"), Ok(42));
    }

    #[test]
    fn test_parse_note_rejects_garbage() {
        assert!(parse_note("h2").is_err());
        assert!(parse_note("").is_err());
        assert!(parse_note("c4x").is_err());
        assert!(parse_note("a9").is_err());
        assert!(parse_note("200").is_err());
        assert_eq!(parse_note("g9"), Ok(127));
    }

    #[test]
    fn test_build_minor_seven_octaves() {
        let scale = Scale::from_names("c2", "minor", 7).unwrap();
        assert_eq!(scale.len(), 50);
        assert_eq!(scale.lowest(), Some(36));
        assert_eq!(scale.highest(), Some(36 + 84));
        assert_eq!(&scale.pitches()[..8], &[36, 38, 39, 41, 43, 44, 46, 48]);
    }

    #[test]
    fn test_build_is_strictly_increasing() {
        for mode in ["major", "minor", "blues", "chromatic", "whole_tone"] {
            let scale = Scale::from_names("c0", mode, 9).unwrap();
            assert!(scale.pitches().windows(2).all(|w| w[0] < w[1]), "{mode}");
        }
    }

    #[test]
    fn test_build_drops_pitches_above_127() {
        let scale = Scale::from_names("c8", "major", 3).unwrap();
        assert!(scale.highest().unwrap() <= 127);
        assert_eq!(scale.lowest(), Some(108));
    }

    #[test]
    fn test_build_deterministic() {
        let a = Scale::from_names("e3", "dorian", 2).unwrap();
        let b = Scale::from_names("e3", "dorian", 2).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_from_names_unknown_mode() {
        assert_eq!(
            Scale::from_names("c2", "klingon", 2),
            Err(ScaleError::UnknownMode("klingon".to_string()))
        );
    }

    #[test]
    fn test_quantize_zero_is_silence() {
        let scale = Scale::from_pitches(vec![10, 20, 30, 40, 50]);
        assert_eq!(scale.quantize(0.0), None);

        let empty = Scale::from_pitches(vec![]);
        assert_eq!(empty.quantize(0.0), None);
    }

    #[test]
    fn test_quantize_index_in_range() {
        let scale = Scale::from_names("c2", "minor", 7).unwrap();
        for value in 1..=100 {
            let index = scale.index_for(value as f64).unwrap();
            assert!(index < scale.len());
        }
        assert_eq!(scale.index_for(100.0), Some(scale.len() - 1));
        assert_eq!(scale.index_for(1.0), Some(0));
    }

    #[test]
    fn test_quantize_linear_floor() {
        let scale = Scale::from_pitches(vec![10, 20, 30, 40, 50]);
        assert_eq!(scale.quantize(50.0), Some(30));
        assert_eq!(scale.quantize(24.9), Some(10));
        assert_eq!(scale.quantize(25.0), Some(20));
        assert_eq!(scale.quantize(100.0), Some(50));
    }

    #[test]
    fn test_quantize_single_pitch_scale() {
        let scale = Scale::from_pitches(vec![60]);
        assert_eq!(scale.quantize(1.0), Some(60));
        assert_eq!(scale.quantize(100.0), Some(60));
    }

    #[test]
    fn test_trim_keeps_inclusive_subsequence() {
        let scale = Scale::from_pitches(vec![10, 20, 30, 40, 50]);
        assert_eq!(scale.trim(20, 40).pitches(), &[20, 30, 40]);
        assert_eq!(scale.trim(15, 45).pitches(), &[20, 30, 40]);
        assert_eq!(scale.trim(0, 127).pitches(), scale.pitches());
    }

    #[test]
    fn test_trim_out_of_range_is_empty() {
        let scale = Scale::from_pitches(vec![10, 20, 30, 40, 50]);
        assert!(scale.trim(0, 9).is_empty());
        assert!(scale.trim(51, 127).is_empty());
        assert!(scale.trim(21, 29).is_empty());
    }

    #[test]
    fn test_quantize_on_empty_trim_is_silence() {
        let scale = Scale::from_pitches(vec![10, 20, 30]);
        let trimmed = scale.trim(100, 120);
        assert_eq!(trimmed.quantize(75.0), None);
    }
}
