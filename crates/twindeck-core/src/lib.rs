//! Twindeck Core - two-deck playback and crossfade mixing engine
//!
//! Two independent decks each play a decoded source with their own transport,
//! speed, gain and loop controls. The [`engine::MixEngine`] renders both on the
//! real-time audio thread and blends them with a linear crossfade. Control
//! threads talk to the decks through [`engine::DeckController`] handles, which
//! only touch atomics and never block the render path.

pub mod audio;
pub mod config;
pub mod engine;
pub mod render;
pub mod source;
pub mod types;

pub use types::*;
