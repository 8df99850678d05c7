//! Balancer - volume and balance of two audio channels from a MIDI controller

use anyhow::{bail, Result};
use balancer::config;
use balancer::engine::{self, CurveTables, Engine, Host};
use clap::Parser;
use env_logger::{Builder, Env};
use log::{error, info, trace, warn, LevelFilter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

mod cli;

use cli::{Cli, Commands, RunArgs};

/// How often the main thread drains callback notices
const POLL_INTERVAL: Duration = Duration::from_millis(50);

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logger(cli.verbose);

    match cli.command {
        None => run(cli.run),
        Some(Commands::Run(args)) => run(args),
        Some(Commands::Devices) => devices(),
        Some(Commands::Curves) => {
            print_curves(&CurveTables::build());
            Ok(())
        }
    }
}

/// Map `-v` occurrences to a log level; `RUST_LOG` still takes precedence
fn setup_logger(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    Builder::new()
        .filter_level(level)
        .parse_env(Env::default())
        .format_timestamp(None)
        .init();
}

fn run(args: RunArgs) -> Result<()> {
    let engine_config = config::engine_config(args.channel, args.volume_cc, args.balance_cc, args.gain)?;
    let host_config = config::host_config(&args.name, args.midi_port, args.input_device, args.output_device)?;

    info!(
        "Listening on MIDI channel {} (volume cc {}, balance cc {})",
        engine_config.channel, engine_config.volume_cc, engine_config.balance_cc
    );
    if engine_config.gain != 1.0 {
        info!("Gain: {}", engine_config.gain);
    }

    let engine = Engine::new(&engine_config);
    if log::log_enabled!(log::Level::Trace) {
        for (i, volume, left, right) in engine.tables().rows() {
            trace!("{:03}:    V: {:.6}    L: {:.6}    R: {:.6}", i, volume, left, right);
        }
    }

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    let (host, mut notices) = Host::start(engine, &host_config)?;
    info!(
        "Client '{}' running at {} Hz, MIDI input: {}",
        host_config.client_name,
        host.sample_rate(),
        host.midi_port()
    );

    while running.load(Ordering::SeqCst) {
        notices.drain(|notice| notice.log());

        let dropped = host.take_dropped();
        if dropped.midi > 0 {
            warn!("MIDI queue full, dropped {} message(s)", dropped.midi);
        }
        if dropped.notices > 0 {
            warn!("Notice queue full, dropped {} status message(s)", dropped.notices);
        }

        if host.has_failed() {
            error!("Audio server shut down the stream");
            bail!("audio stream failed");
        }

        std::thread::sleep(POLL_INTERVAL);
    }

    info!("signal received, exiting...");
    drop(host);
    Ok(())
}

fn devices() -> Result<()> {
    let (inputs, outputs) = engine::list_audio_devices()?;

    println!("Audio input devices:");
    for device in &inputs {
        println!("  - {} ({} Hz, {} ch)", device.name, device.sample_rate, device.channels);
    }

    println!("\nAudio output devices:");
    for device in &outputs {
        println!("  - {} ({} Hz, {} ch)", device.name, device.sample_rate, device.channels);
    }

    println!("\nMIDI input ports:");
    match engine::list_midi_ports() {
        Ok(ports) => {
            for port in ports {
                println!("  - {}", port);
            }
        }
        Err(e) => {
            println!("  Error listing MIDI ports: {}", e);
        }
    }

    Ok(())
}

fn print_curves(tables: &CurveTables) {
    println!("=== Volume and balance curves ===");
    for (i, volume, left, right) in tables.rows() {
        println!("{:03}:    V: {:.6}    L: {:.6}    R: {:.6}", i, volume, left, right);
    }
}
