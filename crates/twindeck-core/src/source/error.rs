//! Source reader error types

use std::path::PathBuf;

use symphonia::core::errors::Error as SymphoniaError;
use thiserror::Error;

/// Errors that can occur while opening or decoding a source
#[derive(Error, Debug)]
pub enum SourceError {
    /// The file could not be opened
    #[error("Failed to open file '{path}': {source}")]
    FileOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The container format was not recognised
    #[error("Unsupported or corrupt file '{path}': {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: SymphoniaError,
    },

    /// The container holds no decodable audio track
    #[error("No audio track in '{path}'")]
    NoAudioTrack { path: PathBuf },

    /// The track does not declare a sample rate
    #[error("Sample rate missing in '{path}'")]
    MissingSampleRate { path: PathBuf },

    /// No decoder is available for the track's codec
    #[error("Failed to create decoder for '{path}': {source}")]
    Decoder {
        path: PathBuf,
        #[source]
        source: SymphoniaError,
    },

    /// Decoding produced no samples
    #[error("No samples decoded from '{path}'")]
    NoSamplesDecoded { path: PathBuf },
}

/// Result type for source operations
pub type SourceResult<T> = Result<T, SourceError>;
