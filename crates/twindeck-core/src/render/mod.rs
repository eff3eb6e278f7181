//! Offline rendering - bounce a session to a WAV file
//!
//! Drives a [`MixEngine`] through the same prepare / render / release cycle a
//! device would, but as fast as possible and into a 32-bit float WAV file.

use std::borrow::BorrowMut;
use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavSpec, WavWriter};
use thiserror::Error;

use crate::engine::{Deck, MixEngine};
use crate::types::{AudioBuffer, DEFAULT_CHANNELS};

/// Errors from an offline bounce
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Invalid bounce settings: {0}")]
    InvalidSettings(&'static str),

    #[error("Failed to write {}: {source}", path.display())]
    Wav {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },
}

/// Length and format of an offline bounce
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BounceSettings {
    /// Length of the bounce in seconds
    pub seconds: f64,
    /// Frames rendered per engine call
    pub block_size: usize,
    pub sample_rate: u32,
    pub channels: u16,
}

impl Default for BounceSettings {
    fn default() -> Self {
        Self {
            seconds: 10.0,
            block_size: 512,
            sample_rate: 44100,
            channels: DEFAULT_CHANNELS as u16,
        }
    }
}

impl BounceSettings {
    /// Total frames to render
    pub fn total_frames(&self) -> u64 {
        (self.seconds * self.sample_rate as f64).round() as u64
    }

    fn validate(&self) -> Result<(), RenderError> {
        if !self.seconds.is_finite() || self.seconds < 0.0 {
            return Err(RenderError::InvalidSettings("length must be a non-negative number of seconds"));
        }
        if self.block_size == 0 {
            return Err(RenderError::InvalidSettings("block size must be at least one frame"));
        }
        if self.sample_rate == 0 {
            return Err(RenderError::InvalidSettings("sample rate must be positive"));
        }
        if self.channels == 0 {
            return Err(RenderError::InvalidSettings("at least one channel is required"));
        }
        Ok(())
    }
}

/// Render `settings.seconds` of the engine's output into `path`
///
/// The engine is prepared for the bounce format and released afterwards, even
/// if writing fails. Returns the number of frames written.
pub fn bounce_to_wav<D: BorrowMut<Deck>>(
    engine: &mut MixEngine<D>,
    path: &Path,
    settings: &BounceSettings,
) -> Result<u64, RenderError> {
    settings.validate()?;

    let wav_error = |source| RenderError::Wav {
        path: path.to_path_buf(),
        source,
    };
    let spec = WavSpec {
        channels: settings.channels,
        sample_rate: settings.sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer = WavWriter::create(path, spec).map_err(wav_error)?;

    let channels = settings.channels as usize;
    engine.prepare(settings.block_size, settings.sample_rate, channels);
    let result = render_frames(engine, &mut writer, settings);
    engine.release();

    let frames = result.map_err(wav_error)?;
    writer.finalize().map_err(wav_error)?;

    log::info!(
        "Bounced {} frames ({:.2}s @ {}Hz) to {:?}",
        frames,
        frames as f64 / settings.sample_rate as f64,
        settings.sample_rate,
        path
    );
    Ok(frames)
}

fn render_frames<D, W>(
    engine: &mut MixEngine<D>,
    writer: &mut WavWriter<W>,
    settings: &BounceSettings,
) -> Result<u64, hound::Error>
where
    D: BorrowMut<Deck>,
    W: std::io::Write + std::io::Seek,
{
    let channels = settings.channels as usize;
    let total = settings.total_frames();
    let mut buffer = AudioBuffer::with_capacity(channels, settings.block_size);
    let mut interleaved = vec![0.0f32; settings.block_size * channels];
    let mut written = 0u64;

    while written < total {
        let n = (total - written).min(settings.block_size as u64) as usize;
        buffer.set_len_from_capacity(n);
        engine.render_block(&mut buffer);

        let samples = &mut interleaved[..n * channels];
        buffer.write_interleaved(samples, channels);
        for &sample in samples.iter() {
            writer.write_sample(sample)?;
        }
        written += n as u64;
    }
    Ok(written)
}
