//! Audio backend error types

use thiserror::Error;

/// Errors that can occur while opening or starting the output stream
#[derive(Error, Debug)]
pub enum AudioError {
    /// No output device on any host
    #[error("No audio output devices found")]
    NoDevices,

    /// The default host has no default output device
    #[error("No default output device on host {0}")]
    NoDefaultDevice(String),

    /// A configured device could not be found
    #[error("Audio device not found: {0}")]
    DeviceNotFound(String),

    /// A host could not list its devices
    #[error("Failed to enumerate devices: {0}")]
    Devices(#[from] cpal::DevicesError),

    /// A device could not report its formats
    #[error("Failed to query device formats: {0}")]
    SupportedConfigs(#[from] cpal::SupportedStreamConfigsError),

    /// The device offers no 32-bit float output format
    #[error("Device has no f32 output format (found: {0})")]
    UnsupportedFormat(String),

    #[error("Failed to build audio stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("Failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),
}

/// Result type for audio operations
pub type AudioResult<T> = Result<T, AudioError>;
