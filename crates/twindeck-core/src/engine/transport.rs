//! Transport - playback state machine and playhead
//!
//! The state machine ([`TransportStateCell`]) is written by control threads
//! and read by the render thread once per block. The playhead ([`Transport`])
//! belongs to the render thread alone; control threads move it by posting a
//! seek, never by writing it directly.

use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

/// Playback state of a deck
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum TransportState {
    #[default]
    Stopped = 0,
    Playing = 1,
    Paused = 2,
}

impl TransportState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => TransportState::Playing,
            2 => TransportState::Paused,
            _ => TransportState::Stopped,
        }
    }
}

/// What a playing deck does when the playhead reaches the end of the source
/// while its looping flag is off
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum EndOfTrackPolicy {
    /// Stay in the Playing state at the end, rendering silence
    Hold = 0,
    /// Switch to Stopped, leaving the playhead at the end
    #[default]
    Stop = 1,
    /// Wrap back to the start and keep playing
    Loop = 2,
}

impl EndOfTrackPolicy {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => EndOfTrackPolicy::Hold,
            2 => EndOfTrackPolicy::Loop,
            _ => EndOfTrackPolicy::Stop,
        }
    }
}

/// Lock-free transport state shared by control and render threads
#[derive(Debug)]
pub struct TransportStateCell(AtomicU8);

impl TransportStateCell {
    pub fn new() -> Self {
        Self(AtomicU8::new(TransportState::Stopped as u8))
    }

    #[inline]
    pub fn get(&self) -> TransportState {
        TransportState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Stopped or Paused -> Playing (idempotent when already playing)
    pub fn play(&self) {
        self.0.store(TransportState::Playing as u8, Ordering::Release);
    }

    /// Playing -> Paused. Returns false (and changes nothing) from any other state.
    pub fn pause(&self) -> bool {
        self.transition(TransportState::Playing, TransportState::Paused)
    }

    /// Any state -> Stopped
    pub fn stop(&self) {
        self.0.store(TransportState::Stopped as u8, Ordering::Release);
    }

    /// Atomically move `from` -> `to`. Returns false if the state was not `from`.
    pub fn transition(&self, from: TransportState, to: TransportState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl Default for TransportStateCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Render-side playhead over the current source, in source frames
///
/// Fractional positions are kept so that non-unity speeds advance smoothly.
#[derive(Debug, Clone, Default)]
pub struct Transport {
    cursor: f64,
    len: f64,
    /// Generation of the source the playhead refers to (0 = no source)
    generation: u64,
}

impl Transport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Point the playhead at a newly published source, rewound to the start
    pub fn attach(&mut self, len_frames: u64, generation: u64) {
        self.cursor = 0.0;
        self.len = len_frames as f64;
        self.generation = generation;
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Current position in source frames
    #[inline]
    pub fn cursor(&self) -> f64 {
        self.cursor
    }

    /// Source length in frames
    #[inline]
    pub fn len(&self) -> f64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len <= 0.0
    }

    /// Check if the playhead has reached the end of the source
    #[inline]
    pub fn is_at_end(&self) -> bool {
        self.cursor >= self.len
    }

    /// Jump to a frame position, clamped to `[0, len]`
    pub fn seek(&mut self, frame: f64) {
        self.cursor = if frame.is_nan() {
            0.0
        } else {
            frame.clamp(0.0, self.len.max(0.0))
        };
    }

    /// Jump to a position in seconds, clamped to the source
    pub fn seek_seconds(&mut self, seconds: f64, sample_rate: u32) {
        self.seek(seconds * sample_rate as f64);
    }

    /// Current position in seconds
    pub fn position_seconds(&self, sample_rate: u32) -> f64 {
        if sample_rate == 0 {
            0.0
        } else {
            self.cursor / sample_rate as f64
        }
    }

    /// Set the playhead after rendering (no clamping, may sit past the end)
    #[inline]
    pub(crate) fn advance_to(&mut self, cursor: f64) {
        self.cursor = cursor;
    }

    /// Wrap a playhead that ran past the end back into the source
    pub fn wrap_to_start(&mut self) {
        if self.len > 0.0 {
            self.cursor %= self.len;
        } else {
            self.cursor = 0.0;
        }
    }

    /// Pin the playhead to the end of the source
    pub fn park_at_end(&mut self) {
        self.cursor = self.len;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_machine() {
        let state = TransportStateCell::new();
        assert_eq!(state.get(), TransportState::Stopped);

        // Pause does not leave Stopped
        assert!(!state.pause());
        assert_eq!(state.get(), TransportState::Stopped);

        state.play();
        state.play();
        assert_eq!(state.get(), TransportState::Playing);

        assert!(state.pause());
        assert_eq!(state.get(), TransportState::Paused);

        state.play();
        assert_eq!(state.get(), TransportState::Playing);

        state.stop();
        assert_eq!(state.get(), TransportState::Stopped);
    }

    #[test]
    fn test_policy_roundtrip_through_u8() {
        for policy in [EndOfTrackPolicy::Hold, EndOfTrackPolicy::Stop, EndOfTrackPolicy::Loop] {
            assert_eq!(EndOfTrackPolicy::from_u8(policy as u8), policy);
        }
    }

    #[test]
    fn test_playhead_clamping() {
        let mut transport = Transport::new();
        transport.attach(44100, 1);
        assert_eq!(transport.cursor(), 0.0);

        transport.seek_seconds(0.5, 44100);
        assert_eq!(transport.cursor(), 22050.0);
        assert_eq!(transport.position_seconds(44100), 0.5);

        transport.seek(-10.0);
        assert_eq!(transport.cursor(), 0.0);

        transport.seek(1.0e9);
        assert_eq!(transport.cursor(), 44100.0);
        assert!(transport.is_at_end());
    }

    #[test]
    fn test_wrap_to_start() {
        let mut transport = Transport::new();
        transport.attach(1000, 1);
        transport.advance_to(1003.5);
        transport.wrap_to_start();
        assert_eq!(transport.cursor(), 3.5);

        let mut empty = Transport::new();
        empty.advance_to(12.0);
        empty.wrap_to_start();
        assert_eq!(empty.cursor(), 0.0);
    }
}
