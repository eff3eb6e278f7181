//! cpal output stream driving the mix engine
//!
//! ```text
//! ┌──────────────────┐  atomics / SharedCell  ┌─────────────────────┐
//! │ Control threads  │───────────────────────►│   cpal callback     │
//! │ (DeckController, │                        │ (owns MixEngine,    │
//! │  MixController)  │◄───────────────────────│  renders + writes)  │
//! └──────────────────┘   rtrb deck events     └─────────────────────┘
//! ```
//!
//! The engine is prepared once before the stream starts and moved into the
//! callback, so the audio thread owns it outright and never takes a lock.
//! Dropping the [`AudioHandle`] drops the stream, which drops the callback
//! and releases the engine.

use std::borrow::BorrowMut;
use std::ops::{Deref, DerefMut};

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{
    BufferSize as CpalBufferSize, SampleFormat, Stream, StreamConfig, SupportedStreamConfig,
    SupportedStreamConfigRange,
};

use super::config::{AudioConfig, DEFAULT_SAMPLE_RATE, MAX_BUFFER_SIZE};
use super::device::{default_output_device, find_device_by_id};
use super::error::{AudioError, AudioResult};
use crate::engine::{Deck, MixEngine};
use crate::types::{AudioBuffer, DEFAULT_CHANNELS};

/// Keeps the output stream alive. Drop this to stop audio.
pub struct AudioHandle {
    _stream: Stream,
    device_name: String,
    sample_rate: u32,
    buffer_size: u32,
    channels: u16,
}

impl AudioHandle {
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Requested buffer size in frames
    pub fn buffer_size(&self) -> u32 {
        self.buffer_size
    }

    /// Device channel count
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// One-way output latency in milliseconds
    pub fn latency_ms(&self) -> f32 {
        self.buffer_size as f32 / self.sample_rate as f32 * 1000.0
    }
}

/// A prepared engine that releases itself when dropped
struct PreparedEngine<D: BorrowMut<Deck>>(MixEngine<D>);

impl<D: BorrowMut<Deck>> Deref for PreparedEngine<D> {
    type Target = MixEngine<D>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<D: BorrowMut<Deck>> DerefMut for PreparedEngine<D> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<D: BorrowMut<Deck>> Drop for PreparedEngine<D> {
    fn drop(&mut self) {
        self.0.release();
    }
}

/// Everything the audio callback owns
struct RenderState<D: BorrowMut<Deck>> {
    engine: PreparedEngine<D>,
    /// Channel-major render target, sized once
    buffer: AudioBuffer,
    device_channels: usize,
}

impl<D: BorrowMut<Deck>> RenderState<D> {
    /// Prepare `engine` for blocks of up to `max_block` frames
    fn new(
        mut engine: MixEngine<D>,
        sample_rate: u32,
        device_channels: usize,
        max_block: usize,
    ) -> Self {
        let engine_channels = device_channels.clamp(1, DEFAULT_CHANNELS);
        engine.prepare(max_block, sample_rate, engine_channels);
        Self {
            engine: PreparedEngine(engine),
            buffer: AudioBuffer::with_capacity(engine_channels, max_block),
            device_channels,
        }
    }

    /// Fill an interleaved device buffer (real-time safe)
    fn process(&mut self, data: &mut [f32]) {
        if self.device_channels == 0 {
            return;
        }
        let chunk_samples = self.buffer.capacity() * self.device_channels;
        if chunk_samples == 0 {
            data.fill(0.0);
            return;
        }
        for chunk in data.chunks_mut(chunk_samples) {
            self.buffer
                .set_len_from_capacity(chunk.len() / self.device_channels);
            self.engine.render_block(&mut self.buffer);
            self.buffer.write_interleaved(chunk, self.device_channels);
        }
    }
}

/// Open the configured output device and start rendering `engine` into it
///
/// The engine is prepared for the negotiated sample rate before the stream
/// starts and released when the returned handle is dropped.
pub fn start_audio_system<D>(config: &AudioConfig, engine: MixEngine<D>) -> AudioResult<AudioHandle>
where
    D: BorrowMut<Deck> + Send + 'static,
{
    let device = match &config.device {
        Some(id) => find_device_by_id(id)?,
        None => default_output_device()?,
    };
    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
    log::info!("Using audio device: {}", device_name);

    let supported = get_output_config(&device, config)?;
    let sample_rate = supported.sample_rate().0;
    let buffer_size = config.buffer_size.frames();
    let stream_config = StreamConfig {
        channels: supported.channels(),
        sample_rate: supported.sample_rate(),
        buffer_size: CpalBufferSize::Fixed(buffer_size),
    };

    log::info!(
        "Audio config: {} channels, {}Hz, {} frames (~{:.1}ms latency)",
        stream_config.channels,
        sample_rate,
        buffer_size,
        config.buffer_size.latency_ms(sample_rate)
    );

    let mut state = RenderState::new(
        engine,
        sample_rate,
        stream_config.channels as usize,
        MAX_BUFFER_SIZE,
    );

    let stream = device.build_output_stream(
        &stream_config,
        move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
            state.process(data);
        },
        move |err| {
            log::error!("Audio stream error: {}", err);
        },
        None,
    )?;
    stream.play()?;

    log::info!("Audio stream started");

    Ok(AudioHandle {
        _stream: stream,
        device_name,
        sample_rate,
        buffer_size,
        channels: stream_config.channels,
    })
}

fn supports_rate(range: &SupportedStreamConfigRange, rate: u32) -> bool {
    (range.min_sample_rate().0..=range.max_sample_rate().0).contains(&rate)
}

/// Pick an f32 output format, preferring stereo and the requested rate
fn get_output_config(
    device: &cpal::Device,
    config: &AudioConfig,
) -> AudioResult<SupportedStreamConfig> {
    let supported: Vec<_> = device.supported_output_configs()?.collect();
    let float_configs: Vec<_> = supported
        .iter()
        .filter(|c| c.sample_format() == SampleFormat::F32)
        .collect();

    if float_configs.is_empty() {
        let found = supported
            .first()
            .map(|c| format!("{:?}", c.sample_format()))
            .unwrap_or_else(|| "nothing".to_string());
        return Err(AudioError::UnsupportedFormat(found));
    }

    let target_rate = config.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE);

    let best = float_configs
        .iter()
        .find(|c| c.channels() >= 2 && supports_rate(c, target_rate))
        .or_else(|| float_configs.iter().find(|c| supports_rate(c, target_rate)))
        .or_else(|| float_configs.iter().find(|c| c.channels() >= 2))
        .unwrap_or(&float_configs[0]);

    let sample_rate = if supports_rate(best, target_rate) {
        cpal::SampleRate(target_rate)
    } else {
        let fallback = best.max_sample_rate();
        log::warn!(
            "Audio device doesn't support {}Hz, falling back to {}Hz",
            target_rate,
            fallback.0
        );
        fallback
    };
    log::debug!("Selected output format: {:?} @ {}Hz", best, sample_rate.0);

    Ok((*best).clone().with_sample_rate(sample_rate))
}
