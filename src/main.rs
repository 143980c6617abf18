//! tonewatch - network traffic sonification

use anyhow::{Context, Result};
use clap::Parser;
use std::net::UdpSocket;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;
use tonewatch::config::{self, OutputKind, TonewatchConfig};
use tonewatch::engine::{AlertKind, AlertLoop, Conductor, GlobalVolume, Sonifier};
use tonewatch::mapping::InstrumentRegistry;
use tonewatch::output::{self, AudioEngine};
use tonewatch::transport::{encode_trigger, OscListener, ReplayFeed, Router};
use tracing::{info, warn};

mod cli;

use cli::{Cli, Commands, Incident};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config: config_path,
            profile,
            output,
        } => {
            let mut cfg = load_or_default(&config_path)?;
            if let Some(kind) = output {
                cfg.output.kind = kind;
            }

            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(async {
                let (router, conductor) = start_loops(&cfg, profile.as_deref())?;
                let listener = OscListener::bind(&cfg.transport.listen, cfg.routes()).await?;
                println!("Listening for traffic on {}", listener.local_addr()?);
                println!("Press Ctrl-C to stop.");

                listener.run(router, shutdown_on_ctrlc()?).await?;
                let stats = conductor.finish().await?;
                println!(
                    "Played {} ticks, {} incidents, {} resolutions",
                    stats.ticks, stats.incidents_started, stats.incidents_resolved
                );
                Ok::<_, anyhow::Error>(())
            })?;
        }

        Commands::Replay {
            input,
            config: config_path,
            profile,
            output,
        } => {
            let mut cfg = load_or_default(&config_path)?;
            cfg.output.kind = output.unwrap_or(OutputKind::Log);

            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(async {
                let feed = ReplayFeed::open(&input).await?;
                let (router, conductor) = start_loops(&cfg, profile.as_deref())?;

                let replay = feed.run(router, shutdown_on_ctrlc()?).await?;
                let stats = conductor.finish().await?;
                println!(
                    "Replayed {} lines ({} events, {} skipped): {} ticks, {} incidents, {} resolutions",
                    replay.lines,
                    replay.events,
                    replay.skipped,
                    stats.ticks,
                    stats.incidents_started,
                    stats.incidents_resolved
                );
                Ok::<_, anyhow::Error>(())
            })?;
        }

        Commands::Trigger {
            incident,
            target,
            config: config_path,
        } => {
            let cfg = load_or_default(&config_path)?;
            let target = target.unwrap_or_else(|| local_target(&cfg.transport.listen));
            let address = match incident {
                Incident::Started => &cfg.transport.addresses.incident_started,
                Incident::Resolved => &cfg.transport.addresses.incident_resolved,
            };

            let packet = encode_trigger(address)?;
            let socket = UdpSocket::bind("0.0.0.0:0").context("failed to open UDP socket")?;
            socket
                .send_to(&packet, &target)
                .with_context(|| format!("failed to send trigger to {}", target))?;
            println!("Sent {} to {}", address, target);
        }

        Commands::Check {
            config: config_path,
            profile,
        } => {
            println!("Checking configuration at {:?}...", config_path);

            match config::load_config(&config_path).and_then(|cfg| {
                let registry = cfg.registry(profile.as_deref())?;
                Ok((cfg, registry))
            }) {
                Ok((cfg, registry)) => print_summary(&cfg, profile.as_deref(), &registry),
                Err(e) => {
                    println!("Configuration is invalid: {:#}", e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Init => {
            let example_config = include_str!("../tonewatch.example.yaml");

            let path = "tonewatch.yaml";
            if Path::new(path).exists() {
                println!("tonewatch.yaml already exists. Not overwriting.");
            } else {
                std::fs::write(path, example_config)?;
                println!("Created tonewatch.yaml with example configuration.");
            }
        }

        Commands::Ports => {
            let ports = output::list_midi_ports()?;
            if ports.is_empty() {
                println!("No MIDI output ports found.");
            } else {
                println!("MIDI output ports:");
                for port in ports {
                    println!("  - {}", port);
                }
            }
        }
    }

    Ok(())
}

fn load_or_default(path: &Path) -> Result<TonewatchConfig> {
    if path.exists() {
        info!("Loading configuration from {:?}", path);
        config::load_config(path)
    } else {
        warn!("{:?} not found, using built-in defaults", path);
        Ok(TonewatchConfig::default())
    }
}

/// Build the output engine and spawn the three loops
fn start_loops(cfg: &TonewatchConfig, profile: Option<&str>) -> Result<(Router, Conductor)> {
    let registry = Arc::new(cfg.registry(profile)?);
    let engine: Arc<dyn AudioEngine> = output::build_engine(&cfg.output, &registry)?;
    let volume = GlobalVolume::new(cfg.volume.baseline);

    info!(
        "{} instruments on a {}-note scale, output {}",
        registry.len(),
        registry.full_scale().len(),
        engine.name()
    );

    let mut sonifier = Sonifier::new(registry, cfg.mapper(), volume.clone(), Arc::clone(&engine))
        .with_omit_rate(cfg.humanize.omit_rate);
    if let Some(seed) = cfg.humanize.seed {
        sonifier = sonifier.with_seed(seed);
    }

    let alert = |kind| AlertLoop::new(kind, cfg.alert_settings(kind), volume.clone(), Arc::clone(&engine));
    let mitigation = alert(AlertKind::Mitigation);
    let resolution = alert(AlertKind::Resolution);

    Ok(Conductor::start(
        sonifier,
        mitigation,
        resolution,
        Arc::clone(&engine),
        cfg.transport.queue,
    ))
}

/// A shutdown signal flipped by Ctrl-C
fn shutdown_on_ctrlc() -> Result<watch::Receiver<bool>> {
    let (tx, rx) = watch::channel(false);
    ctrlc::set_handler(move || {
        info!("Ctrl-C received, shutting down");
        let _ = tx.send(true);
    })
    .context("failed to install Ctrl-C handler")?;
    Ok(rx)
}

/// The listen address with a wildcard host swapped for localhost
fn local_target(listen: &str) -> String {
    match listen.rsplit_once(':') {
        Some(("0.0.0.0", port)) => format!("127.0.0.1:{}", port),
        Some(("[::]", port)) => format!("[::1]:{}", port),
        _ => listen.to_string(),
    }
}

fn print_summary(cfg: &TonewatchConfig, profile: Option<&str>, registry: &InstrumentRegistry) {
    println!("Configuration is valid!");
    if let Some(name) = profile.or(cfg.profile.as_deref()) {
        println!("  Profile: {}", name);
    }
    let scale = registry.full_scale();
    println!(
        "  Scale: {} pitches ({}..={})",
        scale.len(),
        scale.lowest().unwrap_or(0),
        scale.highest().unwrap_or(0)
    );
    println!(
        "  Humanize: omit 1/{}, duration {}..{}s",
        cfg.humanize.omit_rate, cfg.humanize.min_duration, cfg.humanize.max_duration
    );
    println!("  Baseline volume: {}", cfg.volume.baseline);
    for kind in [AlertKind::Mitigation, AlertKind::Resolution] {
        let alert = cfg.alert_settings(kind);
        println!(
            "  {} alert: duck {} for {:?}, restore {} (sample: {})",
            kind,
            alert.duck,
            alert.hold,
            alert.restore,
            alert
                .sample
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "none".to_string())
        );
    }
    println!("  Listen: {}", cfg.transport.listen);
    println!("  Output: {}", cfg.output.kind);
    println!(
        "  Instruments: {}{}",
        registry.len(),
        if registry.has_ranges() { " (ranged)" } else { "" }
    );
    for (instrument, scale) in registry.iter() {
        match instrument.range {
            Some(range) => println!(
                "    - {} [{}..={}] {} notes",
                instrument.name,
                range.low,
                range.high,
                scale.len()
            ),
            None => println!("    - {} {} notes", instrument.name, scale.len()),
        }
    }
}
