//! Float parameters shared between control and render threads
//!
//! Stored as raw bit patterns in integer atomics. Plain parameters use
//! `Relaxed`: each is an independent value and the render thread only needs to
//! see the latest write at the next block boundary. The playhead and the seek
//! mailbox hand a position back and forth, so they use acquire/release.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Lock-free `f32` cell
#[derive(Debug)]
pub struct AtomicF32(AtomicU32);

impl AtomicF32 {
    pub fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    #[inline]
    pub fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

/// Lock-free `f64` cell
#[derive(Debug)]
pub struct AtomicF64(AtomicU64);

impl AtomicF64 {
    pub fn new(value: f64) -> Self {
        Self(AtomicU64::new(value.to_bits()))
    }

    #[inline]
    pub fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn store(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

/// Published playhead in seconds
///
/// Control threads store seek targets here directly. The render thread reads
/// the value at the start of a block and publishes its new playhead with
/// [`Playhead::publish`], which loses against any store made in between.
#[derive(Debug)]
pub struct Playhead(AtomicU64);

impl Playhead {
    pub fn new(seconds: f64) -> Self {
        Self(AtomicU64::new(seconds.to_bits()))
    }

    #[inline]
    pub fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Acquire))
    }

    #[inline]
    pub fn store(&self, seconds: f64) {
        self.0.store(seconds.to_bits(), Ordering::Release);
    }

    /// Replace `observed` with `seconds`. Returns false (and keeps the current
    /// value) if another thread stored a playhead since `observed` was read.
    #[inline]
    pub fn publish(&self, observed: f64, seconds: f64) -> bool {
        self.0
            .compare_exchange(
                observed.to_bits(),
                seconds.to_bits(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}

/// Single-slot mailbox for a pending seek target (seconds)
///
/// The control thread posts, the render thread takes at the start of a block.
/// A newer post replaces an untaken one.
#[derive(Debug)]
pub struct SeekMailbox(AtomicU64);

/// Bit pattern meaning "no seek pending" (a NaN never posted by `post`)
const NO_SEEK: u64 = u64::MAX;

impl SeekMailbox {
    pub fn new() -> Self {
        Self(AtomicU64::new(NO_SEEK))
    }

    /// Post a seek target in seconds
    #[inline]
    pub fn post(&self, seconds: f64) {
        let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
        self.0.store(seconds.to_bits(), Ordering::Release);
    }

    /// Take the pending target, leaving the mailbox empty
    #[inline]
    pub fn take(&self) -> Option<f64> {
        match self.0.swap(NO_SEEK, Ordering::AcqRel) {
            NO_SEEK => None,
            bits => Some(f64::from_bits(bits)),
        }
    }

}

impl Default for SeekMailbox {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_cells() {
        let gain = AtomicF32::new(1.0);
        gain.store(0.25);
        assert_eq!(gain.load(), 0.25);

        let speed = AtomicF64::new(1.0);
        speed.store(1.75);
        assert_eq!(speed.load(), 1.75);
    }

    #[test]
    fn test_playhead_publish_loses_to_seek() {
        let playhead = Playhead::new(0.0);
        let observed = playhead.load();
        assert!(playhead.publish(observed, 0.5));
        assert_eq!(playhead.load(), 0.5);

        // A seek lands while the block renders
        let observed = playhead.load();
        playhead.store(2.0);
        assert!(!playhead.publish(observed, 0.75));
        assert_eq!(playhead.load(), 2.0);
    }

    #[test]
    fn test_seek_mailbox() {
        let mailbox = SeekMailbox::new();
        assert_eq!(mailbox.take(), None);

        mailbox.post(1.0);
        mailbox.post(3.0);
        assert_eq!(mailbox.take(), Some(3.0));
        assert_eq!(mailbox.take(), None);

        // Garbage targets collapse to the start
        mailbox.post(f64::NAN);
        assert_eq!(mailbox.take(), Some(0.0));
        mailbox.post(-4.0);
        assert_eq!(mailbox.take(), Some(0.0));
    }
}
