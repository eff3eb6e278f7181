//! Configuration for the engine and the player
//!
//! - [`EngineConfig`]: end-of-track policy, AB loop enforcement, interpolation,
//!   initial crossfade and audio output settings
//! - Generic YAML config loading/saving
//! - Standard config paths
//!
//! # Usage
//!
//! ```ignore
//! use twindeck_core::config::{default_config_path, load_config, save_config, EngineConfig};
//!
//! let path = default_config_path();
//! let config: EngineConfig = load_config(&path);
//! save_config(&config, &path)?;
//! ```

mod engine;
mod io;
mod paths;

pub use engine::EngineConfig;
pub use io::{load_config, save_config};
pub use paths::{config_dir, default_config_path};
