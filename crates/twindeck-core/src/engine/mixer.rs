//! Mix engine - linear crossfade between two decks
//!
//! Each deck renders into its own scratch buffer before anything is written
//! to the output, then every sample is blended as
//! `out = a * (1 - x) + b * x`. The ends of the crossfader copy one deck
//! through untouched, so `x = 0` is bit-exact deck A and `x = 1` bit-exact
//! deck B.

use std::borrow::BorrowMut;
use std::sync::Arc;

use crate::types::{clamp_param, AudioBuffer, DeckId, Sample, MAX_CROSSFADE, MIN_CROSSFADE};

use super::atomics::AtomicF32;
use super::deck::Deck;

/// Crossfader position used until someone moves it
pub const DEFAULT_CROSSFADE: f32 = 0.5;

/// Blend one sample pair at crossfader position `x`
#[inline]
fn blend(a: Sample, b: Sample, x: f32) -> Sample {
    a * (1.0 - x) + b * x
}

/// Crossfader state shared with control threads
struct MixAtomics {
    crossfade: AtomicF32,
}

/// Control-thread handle for the mix engine
#[derive(Clone)]
pub struct MixController {
    atomics: Arc<MixAtomics>,
}

impl MixController {
    /// Move the crossfader (0 = deck A only, 1 = deck B only)
    pub fn set_crossfade(&self, crossfade: f32) {
        self.atomics
            .crossfade
            .store(clamp_param(crossfade, MIN_CROSSFADE, MAX_CROSSFADE));
    }

    pub fn crossfade(&self) -> f32 {
        self.atomics.crossfade.load()
    }
}

/// Two decks and a crossfader
///
/// `D` is either `Deck` (the engine owns its decks) or `&mut Deck` (the decks
/// belong to someone else and the borrow keeps them alive for as long as the
/// engine exists).
pub struct MixEngine<D: BorrowMut<Deck> = Deck> {
    deck_a: D,
    deck_b: D,
    atomics: Arc<MixAtomics>,
    scratch_a: AudioBuffer,
    scratch_b: AudioBuffer,
    max_block: usize,
    sample_rate: u32,
    prepared: bool,
}

impl<D: BorrowMut<Deck>> MixEngine<D> {
    pub fn new(deck_a: D, deck_b: D) -> Self {
        Self::with_crossfade(deck_a, deck_b, DEFAULT_CROSSFADE)
    }

    pub fn with_crossfade(deck_a: D, deck_b: D, crossfade: f32) -> Self {
        Self {
            deck_a,
            deck_b,
            atomics: Arc::new(MixAtomics {
                crossfade: AtomicF32::new(clamp_param(crossfade, MIN_CROSSFADE, MAX_CROSSFADE)),
            }),
            scratch_a: AudioBuffer::with_capacity(0, 0),
            scratch_b: AudioBuffer::with_capacity(0, 0),
            max_block: 0,
            sample_rate: 0,
            prepared: false,
        }
    }

    /// Create a control handle for the crossfader
    pub fn controller(&self) -> MixController {
        MixController {
            atomics: Arc::clone(&self.atomics),
        }
    }

    pub fn deck(&self, id: DeckId) -> &Deck {
        match id {
            DeckId::A => self.deck_a.borrow(),
            DeckId::B => self.deck_b.borrow(),
        }
    }

    pub fn deck_mut(&mut self, id: DeckId) -> &mut Deck {
        match id {
            DeckId::A => self.deck_a.borrow_mut(),
            DeckId::B => self.deck_b.borrow_mut(),
        }
    }

    /// Give back the decks
    pub fn into_decks(self) -> (D, D) {
        (self.deck_a, self.deck_b)
    }

    /// Allocate scratch space and prepare both decks
    ///
    /// Must be called before the first `render_block`. This is the only place
    /// the mix engine allocates.
    pub fn prepare(&mut self, max_block: usize, sample_rate: u32, channels: usize) {
        self.scratch_a = AudioBuffer::with_capacity(channels, max_block);
        self.scratch_b = AudioBuffer::with_capacity(channels, max_block);
        self.max_block = max_block;
        self.sample_rate = sample_rate;
        self.deck_a.borrow_mut().prepare(max_block, sample_rate);
        self.deck_b.borrow_mut().prepare(max_block, sample_rate);
        self.prepared = max_block > 0 && channels > 0 && sample_rate > 0;

        log::info!(
            "Mix engine prepared: {} Hz, {} channels, {} frame blocks",
            sample_rate,
            channels,
            max_block
        );
    }

    /// Release both decks; rendering yields silence until the next `prepare`
    pub fn release(&mut self) {
        self.deck_a.borrow_mut().release();
        self.deck_b.borrow_mut().release();
        self.prepared = false;
        log::info!("Mix engine released");
    }

    pub fn is_prepared(&self) -> bool {
        self.prepared
    }

    pub fn max_block(&self) -> usize {
        self.max_block
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Channels of the prepared scratch buffers
    pub fn channels(&self) -> usize {
        self.scratch_a.num_channels()
    }

    /// Render `out.len()` mixed frames
    ///
    /// Requests longer than the prepared block size are rendered in
    /// block-sized chunks. Output channels beyond the prepared channel count
    /// are silent.
    pub fn render_block(&mut self, out: &mut AudioBuffer) {
        if !self.prepared {
            out.fill_silence();
            return;
        }

        let frames = out.len();
        let channels = self.scratch_a.num_channels();
        let x = self.atomics.crossfade.load();
        let mut offset = 0;

        while offset < frames {
            let n = (frames - offset).min(self.max_block);

            // Both decks finish before any output is written
            self.scratch_a.set_len_from_capacity(n);
            self.scratch_b.set_len_from_capacity(n);
            self.deck_a.borrow_mut().render_block(&mut self.scratch_a);
            self.deck_b.borrow_mut().render_block(&mut self.scratch_b);

            for ch in 0..out.num_channels() {
                let dst = &mut out.channel_mut(ch)[offset..offset + n];
                if ch >= channels {
                    dst.fill(0.0);
                    continue;
                }
                let a = self.scratch_a.channel(ch);
                let b = self.scratch_b.channel(ch);
                if x <= MIN_CROSSFADE {
                    dst.copy_from_slice(a);
                } else if x >= MAX_CROSSFADE {
                    dst.copy_from_slice(b);
                } else {
                    for ((sample, &a), &b) in dst.iter_mut().zip(a).zip(b) {
                        *sample = blend(a, b, x);
                    }
                }
            }

            offset += n;
        }
    }
}
