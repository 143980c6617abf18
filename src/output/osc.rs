//! Forwards play requests to an external synth host as OSC messages

use super::AudioEngine;
use crate::mapping::{Instrument, Pitch};
use anyhow::{anyhow, Context, Result};
use rosc::{OscMessage, OscPacket, OscType};
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::path::Path;

/// Sends `/play name pitch duration velocity` and `/sample path gain`
pub struct OscEngine {
    socket: UdpSocket,
    target: SocketAddr,
    play_address: String,
    sample_address: String,
}

impl OscEngine {
    pub fn connect(target: &str, play_address: &str, sample_address: &str) -> Result<Self> {
        let target = target
            .to_socket_addrs()
            .with_context(|| format!("invalid OSC target: {}", target))?
            .next()
            .ok_or_else(|| anyhow!("OSC target {} did not resolve", target))?;

        let bind = if target.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(bind).context("failed to open OSC output socket")?;

        Ok(Self {
            socket,
            target,
            play_address: play_address.to_string(),
            sample_address: sample_address.to_string(),
        })
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }

    /// The packet a note request becomes
    pub fn note_packet(&self, instrument: &Instrument, pitch: Pitch, duration_secs: f64, velocity: f64) -> OscPacket {
        OscPacket::Message(OscMessage {
            addr: self.play_address.clone(),
            args: vec![
                OscType::String(instrument.name.clone()),
                OscType::Int(pitch as i32),
                OscType::Float(duration_secs as f32),
                OscType::Float(velocity as f32),
            ],
        })
    }

    /// The packet a sample request becomes
    pub fn sample_packet(&self, path: &Path, gain: f64) -> OscPacket {
        OscPacket::Message(OscMessage {
            addr: self.sample_address.clone(),
            args: vec![
                OscType::String(path.to_string_lossy().into_owned()),
                OscType::Float(gain as f32),
            ],
        })
    }

    fn send(&self, packet: &OscPacket) -> Result<()> {
        let bytes = rosc::encoder::encode(packet).map_err(|e| anyhow!("OSC encode failed: {}", e))?;
        self.socket
            .send_to(&bytes, self.target)
            .with_context(|| format!("failed to send to {}", self.target))?;
        Ok(())
    }
}

impl AudioEngine for OscEngine {
    fn name(&self) -> &str {
        "osc"
    }

    fn play(&self, instrument: &Instrument, pitch: Pitch, duration_secs: f64, velocity: f64) -> Result<()> {
        self.send(&self.note_packet(instrument, pitch, duration_secs, velocity))
    }

    fn play_sample(&self, path: &Path, gain: f64) -> Result<()> {
        self.send(&self.sample_packet(path, gain))
    }
}
