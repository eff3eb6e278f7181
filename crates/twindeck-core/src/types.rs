//! Common types for Twindeck
//!
//! Channel-major audio buffers and the parameter ranges shared by the deck and
//! mixer controls.

/// Number of decks mixed by the engine
pub const NUM_DECKS: usize = 2;

/// Default output channel count (stereo)
pub const DEFAULT_CHANNELS: usize = 2;

/// Audio sample type (32-bit float throughout the render path)
pub type Sample = f32;

/// Deck gain range (linear)
pub const MIN_GAIN: f32 = 0.0;
pub const MAX_GAIN: f32 = 2.0;

/// Playback speed ratio range (1.0 = native speed)
pub const MIN_SPEED: f64 = 0.25;
pub const MAX_SPEED: f64 = 2.0;

/// Crossfade range (0.0 = only deck A, 1.0 = only deck B)
pub const MIN_CROSSFADE: f32 = 0.0;
pub const MAX_CROSSFADE: f32 = 1.0;

/// Clamp a control parameter into its valid range.
///
/// Out-of-range values are never rejected. NaN maps to the lower bound.
#[inline]
pub fn clamp_param<T: PartialOrd + Copy>(value: T, min: T, max: T) -> T {
    // NaN fails every comparison, so it falls through to `min`
    if value >= min && value <= max {
        value
    } else if value > max {
        max
    } else {
        min
    }
}

/// Deck identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum DeckId {
    A = 0,
    B = 1,
}

impl DeckId {
    /// Both decks in order
    pub const ALL: [DeckId; NUM_DECKS] = [DeckId::A, DeckId::B];

    /// Convert from index (0-1) to DeckId
    pub fn from_index(idx: usize) -> Option<Self> {
        match idx {
            0 => Some(DeckId::A),
            1 => Some(DeckId::B),
            _ => None,
        }
    }

    /// Get the display name of this deck
    pub fn name(&self) -> &'static str {
        match self {
            DeckId::A => "A",
            DeckId::B => "B",
        }
    }
}

impl std::fmt::Display for DeckId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Deck {}", self.name())
    }
}

/// A channel-major block of audio
///
/// Every channel owns a pre-allocated vector of `capacity` samples. The working
/// length is a separate field, so changing the block size on the audio thread
/// never reallocates.
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    channels: Vec<Vec<Sample>>,
    len: usize,
    capacity: usize,
}

impl AudioBuffer {
    /// Create a buffer of `channels` x `frames` silence (length = capacity)
    pub fn silence(channels: usize, frames: usize) -> Self {
        Self {
            channels: vec![vec![0.0; frames]; channels],
            len: frames,
            capacity: frames,
        }
    }

    /// Create a buffer with room for `frames` samples per channel and zero working length
    pub fn with_capacity(channels: usize, frames: usize) -> Self {
        let mut buffer = Self::silence(channels, frames);
        buffer.len = 0;
        buffer
    }

    /// Create a buffer from separate channel vectors
    ///
    /// # Panics
    ///
    /// Panics if the channel vectors differ in length.
    pub fn from_channels(channels: Vec<Vec<Sample>>) -> Self {
        let len = channels.first().map(|c| c.len()).unwrap_or(0);
        assert!(
            channels.iter().all(|c| c.len() == len),
            "Channel lengths must match"
        );
        Self {
            channels,
            len,
            capacity: len,
        }
    }

    /// Number of channels
    #[inline]
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Working length in frames
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the working length is zero
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Maximum frames this buffer can hold without reallocating
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Set the working length of a pre-allocated buffer (real-time safe)
    ///
    /// Lengths beyond the capacity are truncated to the capacity.
    #[inline]
    pub fn set_len_from_capacity(&mut self, new_len: usize) {
        debug_assert!(
            new_len <= self.capacity,
            "set_len_from_capacity called with len > capacity"
        );
        self.len = new_len.min(self.capacity);
    }

    /// Get the active region of one channel
    #[inline]
    pub fn channel(&self, channel: usize) -> &[Sample] {
        &self.channels[channel][..self.len]
    }

    /// Get the active region of one channel, mutably
    #[inline]
    pub fn channel_mut(&mut self, channel: usize) -> &mut [Sample] {
        &mut self.channels[channel][..self.len]
    }

    /// Fill the active region with silence
    pub fn fill_silence(&mut self) {
        let len = self.len;
        for channel in &mut self.channels {
            channel[..len].fill(0.0);
        }
    }

    /// Fill frames `from..len` of every channel with silence
    pub fn fill_silence_from(&mut self, from: usize) {
        let len = self.len;
        if from >= len {
            return;
        }
        for channel in &mut self.channels {
            channel[from..len].fill(0.0);
        }
    }

    /// Multiply the active region by a gain factor
    pub fn apply_gain(&mut self, gain: Sample) {
        if gain == 1.0 {
            return;
        }
        let len = self.len;
        for channel in &mut self.channels {
            for sample in &mut channel[..len] {
                *sample *= gain;
            }
        }
    }

    /// Check whether every sample in the active region is exactly zero
    pub fn is_silent(&self) -> bool {
        let len = self.len;
        self.channels
            .iter()
            .all(|c| c[..len].iter().all(|&s| s == 0.0))
    }

    /// Peak absolute amplitude across all channels of frame `index`
    pub fn frame_peak(&self, index: usize) -> Sample {
        self.channels
            .iter()
            .map(|c| c[index].abs())
            .fold(0.0, Sample::max)
    }

    /// Write the active region into an interleaved device buffer
    ///
    /// `output` holds `frames * out_channels` samples. Device channels without
    /// a matching buffer channel are zeroed.
    pub fn write_interleaved(&self, output: &mut [Sample], out_channels: usize) {
        if out_channels == 0 {
            return;
        }
        for (i, frame) in output.chunks_mut(out_channels).enumerate() {
            for (ch, out) in frame.iter_mut().enumerate() {
                *out = if i < self.len && ch < self.channels.len() {
                    self.channels[ch][i]
                } else {
                    0.0
                };
            }
        }
    }
}
