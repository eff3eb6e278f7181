//! Symphonia-backed source reader
//!
//! Decodes the first audio track of a file completely into memory. Loading is
//! done on a control thread, so the render thread only ever sees finished
//! [`DecodedSource`] data.

use std::fs::File;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::{MetadataOptions, StandardTagKey, Tag};
use symphonia::core::probe::Hint;

use super::error::{SourceError, SourceResult};
use super::{AudioSource, DecodedSource, SourceReader, SourceTags};

/// Default reader for WAV, FLAC, MP3 and raw PCM containers
#[derive(Debug, Clone, Copy, Default)]
pub struct SymphoniaReader;

impl SymphoniaReader {
    pub fn new() -> Self {
        Self
    }
}

impl SourceReader for SymphoniaReader {
    fn open(&self, path: &Path) -> SourceResult<Box<dyn AudioSource>> {
        let source = decode_file(path)?;
        log::info!(
            "Decoded '{}': {} frames, {} Hz, {} channel(s)",
            path.display(),
            source.len_frames(),
            source.sample_rate(),
            source.channels()
        );
        Ok(Box::new(source))
    }
}

/// Copy title/artist tags into `tags`, keeping values already found
fn absorb_tags(tags: &mut SourceTags, found: &[Tag]) {
    for tag in found {
        match tag.std_key {
            Some(StandardTagKey::TrackTitle) if tags.title.is_none() => {
                tags.title = Some(tag.value.to_string());
            }
            Some(StandardTagKey::Artist) if tags.artist.is_none() => {
                tags.artist = Some(tag.value.to_string());
            }
            _ => {}
        }
    }
}

/// Decode a whole file into planar f32
fn decode_file(path: &Path) -> SourceResult<DecodedSource> {
    let file = File::open(path).map_err(|e| SourceError::FileOpen {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    // Create a hint with the file extension
    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let mut probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| SourceError::Format {
            path: path.to_path_buf(),
            source: e,
        })?;

    // Tags can live in front of the container (ID3) or inside it
    let mut tags = SourceTags::default();
    if let Some(metadata) = probed.metadata.get() {
        if let Some(revision) = metadata.current() {
            absorb_tags(&mut tags, revision.tags());
        }
    }

    let mut format = probed.format;
    if let Some(revision) = format.metadata().current() {
        absorb_tags(&mut tags, revision.tags());
    }

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| SourceError::NoAudioTrack {
            path: path.to_path_buf(),
        })?;

    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| SourceError::MissingSampleRate {
            path: path.to_path_buf(),
        })?;
    let mut channels = track
        .codec_params
        .channels
        .map(|c| c.count())
        .unwrap_or(2);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| SourceError::Decoder {
            path: path.to_path_buf(),
            source: e,
        })?;

    let mut interleaved: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;
    let mut sample_buf_frames = 0usize;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(e) => {
                log::warn!("Error reading packet from '{}': {}", path.display(), e);
                break;
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                log::warn!("Skipping undecodable packet in '{}': {}", path.display(), e);
                continue;
            }
            Err(e) => {
                log::warn!("Decoding stopped for '{}': {}", path.display(), e);
                break;
            }
        };

        // (Re)create the sample buffer when a packet is larger than the last one
        if sample_buf.is_none() || decoded.capacity() > sample_buf_frames {
            let spec = *decoded.spec();
            channels = spec.channels.count();
            sample_buf_frames = decoded.capacity();
            sample_buf = Some(SampleBuffer::new(sample_buf_frames as u64, spec));
        }

        if let Some(buf) = sample_buf.as_mut() {
            buf.copy_interleaved_ref(decoded);
            interleaved.extend_from_slice(buf.samples());
        }
    }

    if interleaved.is_empty() {
        return Err(SourceError::NoSamplesDecoded {
            path: path.to_path_buf(),
        });
    }

    Ok(DecodedSource::from_interleaved(&interleaved, channels, sample_rate).with_tags(tags))
}
