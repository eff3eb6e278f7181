//! Real-time audio output
//!
//! Drives a [`MixEngine`](crate::engine::MixEngine) from a cpal output stream:
//!
//! - **Control threads** talk to the decks and the crossfader through their
//!   controllers (atomics, never locks).
//! - **Audio thread** owns the engine exclusively and renders each device
//!   buffer in blocks of at most [`MAX_BUFFER_SIZE`] frames.
//!
//! # Example Usage
//!
//! ```ignore
//! use twindeck_core::audio::{start_audio_system, AudioConfig};
//! use twindeck_core::engine::DualDeckEngine;
//!
//! let (engine, controls) = DualDeckEngine::new(&EngineConfig::default());
//! let handle = start_audio_system(&AudioConfig::default(), engine)?;
//!
//! controls.deck_a.load("track.flac")?;
//! controls.deck_a.play();
//! controls.mixer.set_crossfade(0.0);
//! ```

mod config;
mod cpal_backend;
mod device;
mod error;

pub use config::{
    AudioConfig, BufferSize, DeviceId, DEFAULT_BUFFER_SIZE, DEFAULT_SAMPLE_RATE, MAX_BUFFER_SIZE,
    MIN_BUFFER_SIZE,
};
pub use cpal_backend::{start_audio_system, AudioHandle};
pub use device::{default_output_device, find_device_by_id, get_output_devices, AudioDevice};
pub use error::{AudioError, AudioResult};
