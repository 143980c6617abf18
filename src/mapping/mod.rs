//! Mapping from traffic readings to musical events
//!
//! Scales constrain which pitches can sound, instruments narrow that further,
//! and the note mapper turns one (value, amplitude) pair into a note event.

mod instruments;
mod note;
mod scale;

pub use instruments::{Instrument, InstrumentRegistry, PitchRange};
pub use note::{velocity, NoteEvent, NoteMapper, LOUD_THRESHOLD};
pub use scale::{parse_note, Mode, Pitch, Scale, ScaleError, MAX_PITCH};
