//! Twindeck Player - two decks and a crossfader, driven from the terminal
//!
//! This is the main entry point. It:
//! 1. Loads the engine configuration (YAML)
//! 2. Builds both decks and loads any files given on the command line
//! 3. Either bounces the session to a WAV file, or starts the audio stream
//!    and reads control commands from stdin until `quit`

mod cli;
mod control;

use anyhow::{Context, Result};
use clap::Parser;

use cli::Args;
use twindeck_core::audio::{get_output_devices, start_audio_system, DEFAULT_SAMPLE_RATE};
use twindeck_core::config::{default_config_path, load_config, save_config, EngineConfig};
use twindeck_core::engine::{DualDeckEngine, EngineControls};
use twindeck_core::render::{bounce_to_wav, BounceSettings};
use twindeck_core::DeckId;

/// Load the files named on the command line; failures are reported, not fatal
fn load_decks(args: &Args, controls: &EngineControls) -> usize {
    let mut loaded = 0;
    for (id, path) in [(DeckId::A, &args.deck_a), (DeckId::B, &args.deck_b)] {
        let Some(path) = path else { continue };
        match controls.deck(id).load(path) {
            Ok(()) => {
                println!("{}: {}", id, controls.deck(id).metadata().replace('\n', " | "));
                loaded += 1;
            }
            Err(e) => eprintln!("Warning: {}: {}", id, e),
        }
    }
    loaded
}

fn main() -> Result<()> {
    // Initialize logger - set RUST_LOG=debug for verbose output
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = Args::parse();

    log::info!("twindeck-player starting up");

    if args.list_devices {
        for device in get_output_devices().context("Failed to list audio devices")? {
            println!("{}  ({} ch, {:?} Hz)", device, device.max_channels, device.sample_rates);
        }
        return Ok(());
    }

    let config_path = args.config.clone().unwrap_or_else(default_config_path);
    let config: EngineConfig = load_config(&config_path);
    if args.save_config {
        save_config(&config, &config_path)?;
        println!("Configuration written to {}", config_path.display());
    }

    let (mut engine, controls) = DualDeckEngine::new(&config);
    let loaded = load_decks(&args, &controls);

    if let Some(out_path) = &args.bounce {
        if loaded == 0 {
            log::warn!("Nothing loaded, the bounce will be silent");
        }
        controls.deck_a.play();
        controls.deck_b.play();

        let settings = BounceSettings {
            seconds: args.seconds.unwrap_or(BounceSettings::default().seconds),
            sample_rate: config.audio.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE),
            ..BounceSettings::default()
        };
        let frames = bounce_to_wav(&mut engine, out_path, &settings)
            .with_context(|| format!("Bounce to {} failed", out_path.display()))?;
        println!("Wrote {} frames to {}", frames, out_path.display());
        return Ok(());
    }

    let handle = start_audio_system(&config.audio, engine).context("Failed to start audio output")?;

    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                      Twindeck Player                         ║");
    println!("║              two decks, one crossfader                       ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!(
        "{} @ {} Hz, {} ch, {} frames (~{:.1} ms)",
        handle.device_name(),
        handle.sample_rate(),
        handle.channels(),
        handle.buffer_size(),
        handle.latency_ms()
    );
    println!("Type 'help' for commands.");

    let stdin = std::io::stdin();
    control::run(stdin.lock(), std::io::stdout(), &controls).context("Console I/O failed")?;

    drop(handle);
    log::info!("twindeck-player shut down");
    Ok(())
}
