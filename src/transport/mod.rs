//! Inbound transport
//!
//! Traffic readings and incident triggers arrive as loosely typed messages
//! (OSC datagrams, or JSON lines when replaying). They are decoded into
//! [`RawEvent`]s, paired into ticks and validated into [`Inbound`] messages
//! before any loop sees them.

mod aligner;
mod osc;
mod replay;
mod router;
mod sample;

pub use aligner::TickAligner;
pub use osc::{decode_datagram, decode_packet, encode_trigger, OscListener, OscRoutes};
pub use replay::{parse_line, ReplayFeed, ReplayLine, ReplayStats};
pub use router::{LoopClosed, Router};
pub use sample::{InputError, TrafficSample};

use thiserror::Error;

/// Why an inbound message could not be turned into events
#[derive(Debug, Error, PartialEq)]
pub enum DecodeError {
    #[error("malformed OSC packet: {0}")]
    Malformed(String),

    #[error("argument {index} of {address} is not numeric")]
    NonNumeric { address: String, index: usize },

    #[error("invalid replay line: {0}")]
    Replay(String),
}

/// A transport message before note/amplitude pairing
#[derive(Debug, Clone, PartialEq)]
pub enum RawEvent {
    /// Traffic values, one per instrument slot
    Notes(Vec<f64>),
    /// Loudness weights, one per instrument slot
    Amplitudes(Vec<f64>),
    IncidentStarted,
    IncidentResolved,
}

/// A validated message ready for one of the loops
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    TrafficTick(TrafficSample),
    IncidentStarted,
    IncidentResolved,
}
