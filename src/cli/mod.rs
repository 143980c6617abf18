//! CLI interface for tonewatch

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tonewatch::config::OutputKind;

/// Listen to network traffic instead of watching it
#[derive(Parser)]
#[command(name = "tonewatch")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sonify live OSC traffic readings until Ctrl-C
    Run {
        /// Configuration file path
        #[arg(short, long, default_value = "tonewatch.yaml")]
        config: PathBuf,

        /// Named profile to use instead of the configured one
        #[arg(short, long)]
        profile: Option<String>,

        /// Output override
        #[arg(short, long, value_enum)]
        output: Option<OutputKind>,
    },

    /// Drive the loops from a recorded JSON-lines feed
    Replay {
        /// Feed file
        #[arg(short, long)]
        input: PathBuf,

        /// Configuration file path
        #[arg(short, long, default_value = "tonewatch.yaml")]
        config: PathBuf,

        /// Named profile to use instead of the configured one
        #[arg(short, long)]
        profile: Option<String>,

        /// Output (default: log)
        #[arg(short, long, value_enum)]
        output: Option<OutputKind>,
    },

    /// Send an incident trigger to a running instance
    Trigger {
        #[arg(value_enum)]
        incident: Incident,

        /// Listener address (default: the configured listen address on localhost)
        #[arg(short, long)]
        target: Option<String>,

        /// Configuration file path
        #[arg(short, long, default_value = "tonewatch.yaml")]
        config: PathBuf,
    },

    /// Validate a configuration file
    Check {
        /// Configuration file path
        #[arg(short, long, default_value = "tonewatch.yaml")]
        config: PathBuf,

        /// Named profile to check instead of the configured one
        #[arg(short, long)]
        profile: Option<String>,
    },

    /// Generate an example configuration file
    Init,

    /// List MIDI output ports
    Ports,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Incident {
    /// Incident detected (ducks and plays the mitigation sample)
    Started,
    /// Back to business
    Resolved,
}
