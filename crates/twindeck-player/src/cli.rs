//! Command line arguments

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "twindeck-player")]
#[command(about = "Two decks and a crossfader, driven from the terminal")]
#[command(after_help = "Environment:\n  RUST_LOG    Log filter (default: info)")]
pub struct Args {
    /// Read configuration from PATH instead of the default location
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Write the effective configuration back to the config path
    #[arg(long)]
    pub save_config: bool,

    /// List audio output devices and exit
    #[arg(long)]
    pub list_devices: bool,

    /// Render the session offline to OUT.wav instead of playing it
    #[arg(long, value_name = "OUT.wav")]
    pub bounce: Option<PathBuf>,

    /// Length of an offline bounce in seconds (default 10)
    #[arg(long, value_name = "N", value_parser = parse_seconds)]
    pub seconds: Option<f64>,

    /// File to load into deck A
    #[arg(value_name = "DECK_A_FILE")]
    pub deck_a: Option<PathBuf>,

    /// File to load into deck B
    #[arg(value_name = "DECK_B_FILE")]
    pub deck_b: Option<PathBuf>,
}

/// Bounce length: a finite, non-negative number of seconds
fn parse_seconds(value: &str) -> Result<f64, String> {
    value
        .parse::<f64>()
        .ok()
        .filter(|s| s.is_finite() && *s >= 0.0)
        .ok_or_else(|| format!("expected a non-negative number of seconds, got '{value}'"))
}
