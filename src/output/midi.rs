//! MIDI output for tonewatch.
//!
//! Each instrument plays on its own MIDI channel. Notes are sent as note-on
//! immediately and note-off after their duration, scheduled on a worker
//! thread. Alert samples are played locally through the [`Sampler`].

use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap};
use std::path::Path;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Mutex;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use midir::MidiOutput;
use tracing::{debug, info, warn};

use super::{AudioEngine, Sampler};
use crate::mapping::{Instrument, InstrumentRegistry, Pitch};

/// Controller number for "all notes off"
const ALL_NOTES_OFF: u8 = 123;

/// MIDI message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiMessage {
    /// Note on: channel (0-15), note (0-127), velocity (0-127)
    NoteOn(u8, u8, u8),
    /// Note off: channel (0-15), note (0-127), velocity (0-127)
    NoteOff(u8, u8, u8),
    /// Control change: channel (0-15), controller (0-127), value (0-127)
    ControlChange(u8, u8, u8),
    /// Program change: channel (0-15), program (0-127)
    ProgramChange(u8, u8),
}

impl MidiMessage {
    /// Convert to raw MIDI bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        match *self {
            MidiMessage::NoteOn(ch, note, vel) => vec![0x90 | (ch & 0x0F), note & 0x7F, vel & 0x7F],
            MidiMessage::NoteOff(ch, note, vel) => {
                vec![0x80 | (ch & 0x0F), note & 0x7F, vel & 0x7F]
            }
            MidiMessage::ControlChange(ch, ctrl, val) => {
                vec![0xB0 | (ch & 0x0F), ctrl & 0x7F, val & 0x7F]
            }
            MidiMessage::ProgramChange(ch, prog) => vec![0xC0 | (ch & 0x0F), prog & 0x7F],
        }
    }
}

/// Scale a velocity onto 0..=127 against `ceiling`.
///
/// Any audible velocity maps to at least 1, since a note-on with velocity 0
/// means note-off.
pub fn midi_velocity(velocity: f64, ceiling: f64) -> u8 {
    if !(velocity > 0.0) || !(ceiling > 0.0) {
        return 0;
    }
    let scaled = (velocity / ceiling).min(1.0) * 127.0;
    (scaled.round() as u8).max(1)
}

enum MidiCommand {
    Note {
        channel: u8,
        note: u8,
        velocity: u8,
        duration: Duration,
    },
    Send(MidiMessage),
    Stop,
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct PendingOff {
    at: Instant,
    channel: u8,
    note: u8,
}

/// Worker loop: plays commands through `out` and releases notes on time.
fn run_worker<F: FnMut(MidiMessage)>(mut out: F, receiver: Receiver<MidiCommand>) {
    let mut pending: BinaryHeap<Reverse<PendingOff>> = BinaryHeap::new();
    let mut channels = BTreeSet::new();

    loop {
        let now = Instant::now();
        while pending.peek().is_some_and(|Reverse(off)| off.at <= now) {
            if let Some(Reverse(off)) = pending.pop() {
                out(MidiMessage::NoteOff(off.channel, off.note, 0));
            }
        }

        let next = match pending.peek() {
            Some(Reverse(off)) => receiver.recv_timeout(off.at.saturating_duration_since(now)),
            None => receiver.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        match next {
            Ok(MidiCommand::Note {
                channel,
                note,
                velocity,
                duration,
            }) => {
                channels.insert(channel);
                out(MidiMessage::NoteOn(channel, note, velocity));
                pending.push(Reverse(PendingOff {
                    at: Instant::now() + duration,
                    channel,
                    note,
                }));
            }
            Ok(MidiCommand::Send(msg)) => out(msg),
            Ok(MidiCommand::Stop) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }
    }

    for Reverse(off) in pending.into_sorted_vec() {
        out(MidiMessage::NoteOff(off.channel, off.note, 0));
    }
    for channel in channels {
        out(MidiMessage::ControlChange(channel, ALL_NOTES_OFF, 0));
    }
}

/// Plays notes on a MIDI output port.
pub struct MidiEngine {
    sender: Sender<MidiCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
    velocity_ceiling: f64,
    sampler: Sampler,
}

impl MidiEngine {
    /// Connect to the port whose name contains `port_name` (or the first port),
    /// and send each instrument's program change.
    pub fn connect(
        port_name: Option<&str>,
        registry: &InstrumentRegistry,
        velocity_ceiling: f64,
        sampler: Sampler,
    ) -> Result<Self> {
        let midi_out = MidiOutput::new("tonewatch")?;
        let ports = midi_out.ports();

        if ports.is_empty() {
            return Err(anyhow!("No MIDI output ports available"));
        }

        let port = if let Some(name) = port_name {
            ports
                .iter()
                .find(|p| {
                    midi_out
                        .port_name(p)
                        .map(|n| n.contains(name))
                        .unwrap_or(false)
                })
                .ok_or_else(|| anyhow!("MIDI port '{}' not found", name))?
                .clone()
        } else {
            ports[0].clone()
        };

        let port_name_actual = midi_out.port_name(&port)?;
        let conn = midi_out
            .connect(&port, "tonewatch-output")
            .map_err(|e| anyhow!("failed to connect to MIDI port: {}", e))?;

        let (sender, receiver) = mpsc::channel::<MidiCommand>();

        let worker = thread::Builder::new().name("midi-out".to_string()).spawn(move || {
            let mut conn = conn;
            run_worker(
                |msg| {
                    let _ = conn.send(&msg.to_bytes());
                },
                receiver,
            );
            conn.close();
        })?;

        info!("MIDI output connected to: {}", port_name_actual);

        let engine = Self::with_worker(sender, Some(worker), velocity_ceiling, sampler);
        engine.send_programs(registry)?;
        Ok(engine)
    }

    fn with_worker(
        sender: Sender<MidiCommand>,
        worker: Option<JoinHandle<()>>,
        velocity_ceiling: f64,
        sampler: Sampler,
    ) -> Self {
        Self {
            sender,
            worker: Mutex::new(worker),
            velocity_ceiling,
            sampler,
        }
    }

    fn send_programs(&self, registry: &InstrumentRegistry) -> Result<()> {
        for inst in registry.instruments() {
            if let Some(program) = inst.program {
                debug!("Channel {} program {} ({})", inst.channel, program, inst.name);
                self.send(MidiMessage::ProgramChange(inst.channel, program))?;
            }
        }
        Ok(())
    }

    /// Send a raw MIDI message.
    pub fn send(&self, msg: MidiMessage) -> Result<()> {
        self.sender.send(MidiCommand::Send(msg))?;
        Ok(())
    }

    pub fn velocity_ceiling(&self) -> f64 {
        self.velocity_ceiling
    }
}

impl AudioEngine for MidiEngine {
    fn name(&self) -> &str {
        "midi"
    }

    fn play(&self, instrument: &Instrument, pitch: Pitch, duration_secs: f64, velocity: f64) -> Result<()> {
        let velocity = midi_velocity(velocity, self.velocity_ceiling);
        if velocity == 0 {
            return Ok(());
        }

        self.sender
            .send(MidiCommand::Note {
                channel: instrument.channel,
                note: pitch.min(127),
                velocity,
                duration: Duration::from_secs_f64(duration_secs.max(0.0)),
            })
            .map_err(|_| anyhow!("MIDI worker has stopped"))
    }

    fn play_sample(&self, path: &Path, gain: f64) -> Result<()> {
        self.sampler.play(path, gain)
    }

    fn preload_sample(&self, path: &Path) -> Result<()> {
        self.sampler.preload(path).map(|_| ())
    }

    /// Stop the worker and wait until its note-offs and all-notes-off are out
    fn shutdown(&self) {
        let _ = self.sender.send(MidiCommand::Stop);
        let worker = self.worker.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(worker) = worker {
            if worker.join().is_err() {
                warn!("MIDI worker panicked before releasing notes");
            }
        }
    }
}

impl Drop for MidiEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// List available MIDI output ports.
pub fn list_midi_ports() -> Result<Vec<String>> {
    let midi_out = MidiOutput::new("tonewatch ports")?;
    let ports = midi_out.ports();

    let names: Vec<String> = ports
        .iter()
        .filter_map(|p| midi_out.port_name(p).ok())
        .collect();

    Ok(names)
}
