//! Decoded audio sources
//!
//! The engine never decodes on the audio thread. A [`SourceReader`] opens a
//! file on a control thread and produces an immutable, sample-addressable
//! [`AudioSource`]. Decks only read from it, so a source can be shared with
//! the render thread without any locking.

mod error;
mod reader;

use std::path::Path;

pub use error::{SourceError, SourceResult};
pub use reader::SymphoniaReader;

use crate::types::Sample;

/// Seekable, sample-addressable decoded audio with a fixed format
pub trait AudioSource: Send + Sync {
    /// Native sample rate in Hz
    fn sample_rate(&self) -> u32;

    /// Number of channels
    fn channels(&self) -> usize;

    /// Length in frames
    fn len_frames(&self) -> u64;

    /// Read one sample. Out-of-range channels or frames read as silence.
    fn sample(&self, channel: usize, frame: u64) -> Sample;

    /// Tags found in the stream
    fn tags(&self) -> &SourceTags;

    /// Length in seconds
    fn duration_seconds(&self) -> f64 {
        let rate = self.sample_rate();
        if rate == 0 {
            0.0
        } else {
            self.len_frames() as f64 / rate as f64
        }
    }
}

/// Opens files into decoded sources
pub trait SourceReader: Send + Sync {
    /// Open `path`. Unreadable, unsupported or corrupt files yield an error,
    /// never a panic.
    fn open(&self, path: &Path) -> SourceResult<Box<dyn AudioSource>>;
}

/// Title/artist tags read from a stream
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceTags {
    pub title: Option<String>,
    pub artist: Option<String>,
}

impl SourceTags {
    /// Tags with a title and artist
    pub fn new(title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            artist: Some(artist.into()),
        }
    }
}

/// Build the deck metadata text for a loaded source
///
/// Produces optional `Title: <t>` and `Artist: <a>` lines (only when the tag is
/// present and non-empty) followed by `Duration: <seconds>s` with two decimals.
pub fn format_metadata(tags: &SourceTags, duration_seconds: f64) -> String {
    let mut text = String::new();
    if let Some(title) = tags.title.as_deref().filter(|t| !t.is_empty()) {
        text.push_str("Title: ");
        text.push_str(title);
        text.push('\n');
    }
    if let Some(artist) = tags.artist.as_deref().filter(|a| !a.is_empty()) {
        text.push_str("Artist: ");
        text.push_str(artist);
        text.push('\n');
    }
    text.push_str(&format!("Duration: {:.2}s", duration_seconds));
    text
}

/// Fully decoded audio held in memory as planar f32
#[derive(Debug, Clone)]
pub struct DecodedSource {
    channels: Vec<Vec<Sample>>,
    sample_rate: u32,
    tags: SourceTags,
}

impl DecodedSource {
    /// Create from planar channel data
    ///
    /// # Panics
    ///
    /// Panics if the channels differ in length. Decoded input should go
    /// through [`DecodedSource::from_interleaved`], which cannot mismatch.
    pub fn from_planar(channels: Vec<Vec<Sample>>, sample_rate: u32) -> Self {
        let len = channels.first().map(|c| c.len()).unwrap_or(0);
        assert!(
            channels.iter().all(|c| c.len() == len),
            "Channel lengths must match"
        );
        Self {
            channels,
            sample_rate,
            tags: SourceTags::default(),
        }
    }

    /// Create from interleaved samples [c0, c1, .., c0, c1, ..]
    pub fn from_interleaved(interleaved: &[Sample], channels: usize, sample_rate: u32) -> Self {
        let channels = channels.max(1);
        let frames = interleaved.len() / channels;
        let mut planar = vec![Vec::with_capacity(frames); channels];
        for frame in interleaved.chunks_exact(channels) {
            for (ch, &sample) in frame.iter().enumerate() {
                planar[ch].push(sample);
            }
        }
        Self::from_planar(planar, sample_rate)
    }

    /// Generate a sine tone on every channel
    pub fn tone(
        frequency: f32,
        seconds: f64,
        sample_rate: u32,
        channels: usize,
        amplitude: Sample,
    ) -> Self {
        let frames = (seconds * sample_rate as f64).round() as usize;
        let step = std::f32::consts::TAU * frequency / sample_rate as f32;
        let data: Vec<Sample> = (0..frames)
            .map(|i| amplitude * (step * i as f32).sin())
            .collect();
        Self::from_planar(vec![data; channels.max(1)], sample_rate)
    }

    /// Attach stream tags
    pub fn with_tags(mut self, tags: SourceTags) -> Self {
        self.tags = tags;
        self
    }

    /// Planar data of one channel
    pub fn channel_data(&self, channel: usize) -> Option<&[Sample]> {
        self.channels.get(channel).map(|c| c.as_slice())
    }
}

impl AudioSource for DecodedSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> usize {
        self.channels.len()
    }

    fn len_frames(&self) -> u64 {
        self.channels.first().map(|c| c.len() as u64).unwrap_or(0)
    }

    #[inline]
    fn sample(&self, channel: usize, frame: u64) -> Sample {
        self.channels
            .get(channel)
            .and_then(|c| c.get(frame as usize))
            .copied()
            .unwrap_or(0.0)
    }

    fn tags(&self) -> &SourceTags {
        &self.tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[should_panic(expected = "Channel lengths must match")]
    fn test_from_planar_rejects_ragged_channels() {
        DecodedSource::from_planar(vec![vec![0.0; 4], vec![0.0; 3]], 44100);
    }

    #[test]
    fn test_from_interleaved_drops_partial_frame() {
        let source = DecodedSource::from_interleaved(&[0.1, 0.2, 0.3, 0.4, 0.5], 2, 44100);
        assert_eq!(source.len_frames(), 2);
        assert_eq!(source.channel_data(1), Some(&[0.2, 0.4][..]));
    }

    #[test]
    fn test_metadata_full() {
        let tags = SourceTags::new("Night Drive", "Solenne");
        assert_eq!(
            format_metadata(&tags, 201.456),
            "Title: Night Drive\nArtist: Solenne\nDuration: 201.46s"
        );
    }

    #[test]
    fn test_metadata_duration_only() {
        assert_eq!(format_metadata(&SourceTags::default(), 1.0), "Duration: 1.00s");

        // Empty tags count as missing
        let tags = SourceTags {
            title: Some(String::new()),
            artist: Some("Solenne".to_string()),
        };
        assert_eq!(format_metadata(&tags, 0.5), "Artist: Solenne\nDuration: 0.50s");
    }

    #[test]
    fn test_decoded_source_addressing() {
        let source = DecodedSource::from_interleaved(&[0.1, 0.2, 0.3, 0.4, 0.5, 0.6], 2, 44100);
        assert_eq!(source.channels(), 2);
        assert_eq!(source.len_frames(), 3);
        assert_eq!(source.sample(0, 1), 0.3);
        assert_eq!(source.sample(1, 2), 0.6);

        // Out of range reads as silence
        assert_eq!(source.sample(0, 3), 0.0);
        assert_eq!(source.sample(5, 0), 0.0);
    }

    #[test]
    fn test_tone_length() {
        let tone = DecodedSource::tone(440.0, 1.0, 44100, 1, 0.5);
        assert_eq!(tone.len_frames(), 44100);
        assert_eq!(tone.channels(), 1);
        assert!((tone.duration_seconds() - 1.0).abs() < 1e-12);
        assert!(tone.channel_data(0).unwrap().iter().all(|s| s.abs() <= 0.5));
    }
}
