//! tonewatch - listen to network traffic instead of watching it
//!
//! Traffic intensity readings arrive as paired arrays of values and
//! amplitudes, one entry per instrument slot. Each reading is quantized onto
//! a musical scale and played on its slot's instrument; incident triggers
//! duck the overall volume for a while and play an alert sample.

pub mod config;
pub mod engine;
pub mod mapping;
pub mod output;
pub mod transport;

pub use config::TonewatchConfig;
pub use engine::Conductor;
