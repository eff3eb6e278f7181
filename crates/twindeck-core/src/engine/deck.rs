//! Deck - one independent playback lane
//!
//! A deck is split in two halves that share one `DeckAtomics`:
//! - [`Deck`] is owned by the render thread and produces audio blocks.
//! - [`DeckController`] is a cloneable handle for control threads (UI, MIDI,
//!   scripts). Every control operation is a handful of atomic stores, except
//!   `load`, which decodes on the calling thread and then publishes the new
//!   source with a single `SharedCell` swap.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use basedrop::SharedCell;
use thiserror::Error;

use crate::source::{format_metadata, AudioSource, SourceError, SourceReader};
use crate::types::{
    clamp_param, AudioBuffer, DeckId, MAX_GAIN, MAX_SPEED, MIN_GAIN, MIN_SPEED,
};

use super::atomics::{AtomicF32, AtomicF64, Playhead, SeekMailbox};
use super::events::{event_channel, DeckEvent, EventReceiver, EventSender};
use super::gc::share;
use super::resample::{InterpolationMethod, ResamplingStage};
use super::transport::{EndOfTrackPolicy, Transport, TransportState, TransportStateCell};

/// Distance from the end that `go_to_end` lands on, in seconds
const GO_TO_END_OFFSET: f64 = 0.05;

/// Shortest source for which `go_to_end` does anything, in seconds
const GO_TO_END_MIN_LENGTH: f64 = 0.1;

/// Failure to load a file into a deck
///
/// The deck keeps whatever it had loaded before.
#[derive(Debug, Error)]
#[error("failed to load {}: {source}", path.display())]
pub struct LoadError {
    pub path: PathBuf,
    #[source]
    pub source: SourceError,
}

/// Immutable snapshot of a deck's loaded source
///
/// Published as a whole so the render thread sees either the old or the new
/// source, never a mix of the two.
pub(crate) struct LoadedSource {
    source: Option<Box<dyn AudioSource>>,
    metadata: String,
    /// Increments with every load; 0 means nothing has been loaded
    generation: u64,
}

impl LoadedSource {
    fn empty() -> Self {
        Self {
            source: None,
            metadata: String::new(),
            generation: 0,
        }
    }

    fn length_seconds(&self) -> f64 {
        self.source.as_ref().map(|s| s.duration_seconds()).unwrap_or(0.0)
    }
}

/// AB loop markers as seen from a control thread
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AbLoop {
    /// Start marker in seconds
    pub start: f64,
    /// End marker in seconds
    pub end: f64,
    pub enabled: bool,
}

/// Per-deck behavior that is fixed by configuration rather than live control
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DeckOptions {
    pub end_of_track: EndOfTrackPolicy,
    /// Wrap from the AB end marker back to the start marker during playback
    pub enforce_ab_loop: bool,
    pub interpolation: InterpolationMethod,
}

/// Lock-free deck state shared by the render thread and control threads
///
/// Numeric parameters use `Ordering::Relaxed`: they are independent values
/// and the render thread only needs to see each one eventually (next block).
pub(crate) struct DeckAtomics {
    id: DeckId,
    state: TransportStateCell,
    /// Playhead in seconds, published by the render thread after each block
    /// and written directly by control-thread seeks
    position: Playhead,
    pending_seek: SeekMailbox,
    gain: AtomicF32,
    speed: AtomicF64,
    muted: AtomicBool,
    looping: AtomicBool,
    ab_enabled: AtomicBool,
    loop_start: AtomicF64,
    loop_end: AtomicF64,
    end_of_track: AtomicU8,
    enforce_ab_loop: AtomicBool,
    generation: AtomicU64,
    source: SharedCell<LoadedSource>,
}

impl DeckAtomics {
    fn new(id: DeckId, options: &DeckOptions) -> Self {
        Self {
            id,
            state: TransportStateCell::new(),
            position: Playhead::new(0.0),
            pending_seek: SeekMailbox::new(),
            gain: AtomicF32::new(1.0),
            speed: AtomicF64::new(1.0),
            muted: AtomicBool::new(false),
            looping: AtomicBool::new(false),
            ab_enabled: AtomicBool::new(false),
            loop_start: AtomicF64::new(0.0),
            loop_end: AtomicF64::new(0.0),
            end_of_track: AtomicU8::new(options.end_of_track as u8),
            enforce_ab_loop: AtomicBool::new(options.enforce_ab_loop),
            generation: AtomicU64::new(0),
            source: SharedCell::new(share(LoadedSource::empty())),
        }
    }

    /// Gain applied to output: 0 while muted, the stored gain otherwise
    #[inline]
    fn effective_gain(&self) -> f32 {
        if self.muted.load(Ordering::Relaxed) {
            0.0
        } else {
            self.gain.load()
        }
    }

    #[inline]
    fn end_of_track(&self) -> EndOfTrackPolicy {
        EndOfTrackPolicy::from_u8(self.end_of_track.load(Ordering::Relaxed))
    }

    /// Move the playhead: visible to readers immediately, applied by the
    /// render thread at its next block
    fn seek(&self, seconds: f64) {
        // Posted first: once the render thread sees the new playhead, the
        // target is already in the mailbox
        self.pending_seek.post(seconds);
        self.position.store(seconds);
    }
}

/// Render-side half of a deck
pub struct Deck {
    atomics: Arc<DeckAtomics>,
    events: EventSender,
    receiver: Arc<EventReceiver>,
    transport: Transport,
    resampler: ResamplingStage,
    /// Engine (output) sample rate; 0 until prepared
    sample_rate: u32,
    prepared: bool,
    /// ReachedEnd already reported for the current stay at the end
    end_reported: bool,
}

impl Deck {
    pub fn new(id: DeckId, options: DeckOptions) -> Self {
        let (events, receiver) = event_channel();
        Self {
            atomics: Arc::new(DeckAtomics::new(id, &options)),
            events,
            receiver: Arc::new(receiver),
            transport: Transport::new(),
            resampler: ResamplingStage::new(options.interpolation),
            sample_rate: 0,
            prepared: false,
            end_reported: false,
        }
    }

    pub fn id(&self) -> DeckId {
        self.atomics.id
    }

    /// Create a control handle for this deck
    pub fn controller(&self, reader: Arc<dyn SourceReader>) -> DeckController {
        DeckController {
            atomics: Arc::clone(&self.atomics),
            events: Arc::clone(&self.receiver),
            reader,
        }
    }

    pub fn set_interpolation(&mut self, method: InterpolationMethod) {
        self.resampler.set_method(method);
    }

    /// Get ready to render at `sample_rate`
    ///
    /// The deck renders straight into the caller's buffer, so nothing is
    /// allocated here; `max_block` is only reported.
    pub fn prepare(&mut self, max_block: usize, sample_rate: u32) {
        self.sample_rate = sample_rate;
        self.prepared = sample_rate > 0;
        log::info!(
            "{} prepared: {} Hz, blocks up to {} frames",
            self.id(),
            sample_rate,
            max_block
        );
    }

    /// Stop producing audio until the next `prepare`
    pub fn release(&mut self) {
        self.prepared = false;
        log::info!("{} released", self.id());
    }

    pub fn is_prepared(&self) -> bool {
        self.prepared
    }

    /// Render `out.len()` frames into every channel of `out`
    ///
    /// Real-time safe: no allocation, no locks, no panics. Anything that keeps
    /// the deck from playing (nothing loaded, not prepared, not Playing) yields
    /// silence.
    pub fn render_block(&mut self, out: &mut AudioBuffer) {
        let observed = self.atomics.position.load();
        let snapshot = self.atomics.source.get();

        if snapshot.generation != self.transport.generation() {
            let len = snapshot.source.as_ref().map(|s| s.len_frames()).unwrap_or(0);
            self.transport.attach(len, snapshot.generation);
            self.end_reported = false;
            if snapshot.generation != 0 {
                self.events.send(DeckEvent::SourceChanged {
                    generation: snapshot.generation,
                });
            }
        }

        let Some(source) = snapshot.source.as_deref() else {
            out.fill_silence();
            return;
        };
        let source_rate = source.sample_rate();

        if let Some(seconds) = self.atomics.pending_seek.take() {
            self.transport.seek_seconds(seconds, source_rate);
            self.end_reported = false;
        }

        if self.prepared && self.atomics.state.get() == TransportState::Playing {
            self.render_playing(source, out);
            out.apply_gain(self.atomics.effective_gain());
        } else {
            out.fill_silence();
        }

        // A seek stored during this block wins over what was just rendered
        self.atomics
            .position
            .publish(observed, self.transport.position_seconds(source_rate));
    }

    /// AB range in source frames, when it applies to the current playhead
    fn ab_range(&self, source_rate: u32) -> Option<(f64, f64)> {
        let atomics = &self.atomics;
        if !atomics.enforce_ab_loop.load(Ordering::Relaxed)
            || !atomics.ab_enabled.load(Ordering::Relaxed)
        {
            return None;
        }
        let rate = source_rate as f64;
        let start = atomics.loop_start.load() * rate;
        let end = atomics.loop_end.load() * rate;
        // Past the end marker (e.g. after a seek) plays on normally
        (end > start && self.transport.cursor() < end).then_some((start, end))
    }

    fn render_playing(&mut self, source: &dyn AudioSource, out: &mut AudioBuffer) {
        let frames = out.len();
        let source_rate = source.sample_rate();
        let step = ResamplingStage::step(self.atomics.speed.load(), source_rate, self.sample_rate);

        if step <= 0.0 || !step.is_finite() || self.transport.is_empty() {
            out.fill_silence();
            return;
        }

        let source_channels = source.channels();
        let mut written = 0;

        while written < frames {
            let ab = self.ab_range(source_rate);
            let len = self.transport.len();
            let limit = ab.map(|(_, end)| end.min(len)).unwrap_or(len);
            let cursor = self.transport.cursor();

            if cursor >= limit {
                if self.handle_end_of_source() {
                    continue;
                }
                out.fill_silence_from(written);
                return;
            }

            let n = (((limit - cursor) / step).ceil() as usize).clamp(1, frames - written);
            for ch in 0..out.num_channels() {
                let dst = &mut out.channel_mut(ch)[written..written + n];
                if source_channels == 1 {
                    // Mono feeds every output channel
                    self.resampler.render(source, 0, dst, cursor, step);
                } else if ch < source_channels {
                    self.resampler.render(source, ch, dst, cursor, step);
                } else {
                    dst.fill(0.0);
                }
            }

            let next = cursor + n as f64 * step;
            written += n;

            match ab {
                Some((start, end)) if next >= end => {
                    self.transport.seek(start + (next - end));
                }
                _ => self.transport.advance_to(next),
            }
        }

        // The last chunk can step past the end when the block boundary and
        // the end of the source coincide
        if self.transport.is_at_end() {
            self.handle_end_of_source();
        }
    }

    /// Playhead ran off the end of the source. Returns true if playback
    /// continues (the playhead was wrapped).
    fn handle_end_of_source(&mut self) -> bool {
        let policy = self.atomics.end_of_track();

        if self.atomics.looping.load(Ordering::Relaxed) || policy == EndOfTrackPolicy::Loop {
            self.transport.wrap_to_start();
            self.end_reported = false;
            self.events.send(DeckEvent::Looped);
            return true;
        }

        self.transport.park_at_end();
        match policy {
            EndOfTrackPolicy::Stop => {
                if self
                    .atomics
                    .state
                    .transition(TransportState::Playing, TransportState::Stopped)
                {
                    self.events.send(DeckEvent::ReachedEnd);
                }
            }
            EndOfTrackPolicy::Hold | EndOfTrackPolicy::Loop => {
                if !self.end_reported {
                    self.end_reported = true;
                    self.events.send(DeckEvent::ReachedEnd);
                }
            }
        }
        false
    }
}

/// Control-thread half of a deck
///
/// Cheap to clone; every clone drives the same deck.
#[derive(Clone)]
pub struct DeckController {
    atomics: Arc<DeckAtomics>,
    events: Arc<EventReceiver>,
    reader: Arc<dyn SourceReader>,
}

impl DeckController {
    pub fn id(&self) -> DeckId {
        self.atomics.id
    }

    /// Decode `path` and make it the deck's source
    ///
    /// Decoding happens on the calling thread. On success the playhead moves
    /// to 0 and the transport state is left as it was. On failure nothing
    /// about the deck changes.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<(), LoadError> {
        let path = path.as_ref();
        match self.reader.open(path) {
            Ok(source) => {
                self.load_source(source);
                Ok(())
            }
            Err(source) => {
                log::warn!("{}: could not load {}: {}", self.id(), path.display(), source);
                Err(LoadError {
                    path: path.to_path_buf(),
                    source,
                })
            }
        }
    }

    /// Publish an already decoded source
    pub fn load_source(&self, source: Box<dyn AudioSource>) {
        let metadata = format_metadata(source.tags(), source.duration_seconds());
        let generation = self.atomics.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let frames = source.len_frames();
        let rate = source.sample_rate();

        let loaded = LoadedSource {
            source: Some(source),
            metadata,
            generation,
        };
        // A seek still pending belongs to the previous source. The render
        // thread rewinds to 0 when it picks up the new generation.
        self.atomics.pending_seek.take();
        // The previous snapshot is freed on the collector thread
        drop(self.atomics.source.replace(share(loaded)));
        self.atomics.position.store(0.0);

        log::info!(
            "{}: loaded source #{} ({} frames @ {} Hz)",
            self.id(),
            generation,
            frames,
            rate
        );
    }

    pub fn is_loaded(&self) -> bool {
        self.atomics.source.get().source.is_some()
    }

    /// Start or resume playback (no-op with nothing loaded)
    pub fn play(&self) {
        if self.is_loaded() {
            self.atomics.state.play();
        }
    }

    /// Pause, only if currently playing
    pub fn pause(&self) {
        self.atomics.state.pause();
    }

    /// Stop and rewind to the start
    pub fn stop(&self) {
        self.atomics.state.stop();
        self.atomics.seek(0.0);
    }

    /// Rewind to the start and play, unless the deck is paused
    pub fn restart(&self) {
        self.atomics.seek(0.0);
        if self.state() != TransportState::Paused {
            self.play();
        }
    }

    pub fn go_to_start(&self) {
        self.atomics.seek(0.0);
    }

    /// Jump to just before the end of the source
    pub fn go_to_end(&self) {
        let length = self.total_length();
        if length > GO_TO_END_MIN_LENGTH {
            self.atomics.seek((length - GO_TO_END_OFFSET).max(0.0));
        }
    }

    /// Seek to `seconds`, clamped to the loaded source
    pub fn set_position(&self, seconds: f64) {
        let seconds = if seconds.is_nan() {
            0.0
        } else {
            seconds.clamp(0.0, self.total_length())
        };
        self.atomics.seek(seconds);
    }

    pub fn set_gain(&self, gain: f32) {
        self.atomics.gain.store(clamp_param(gain, MIN_GAIN, MAX_GAIN));
    }

    /// Set the playback speed ratio (applies from the next block)
    pub fn set_speed(&self, speed: f64) {
        self.atomics.speed.store(clamp_param(speed, MIN_SPEED, MAX_SPEED));
    }

    /// Wrap to the start at the end of the source instead of following the
    /// end-of-track policy
    pub fn set_looping(&self, looping: bool) {
        self.atomics.looping.store(looping, Ordering::Relaxed);
    }

    pub fn toggle_mute(&self) {
        self.atomics.muted.fetch_xor(true, Ordering::Relaxed);
    }

    /// Mark the current position as the AB loop start
    pub fn set_ab_loop_start(&self) {
        self.atomics.loop_start.store(self.current_position());
    }

    /// Mark the current position as the AB loop end
    pub fn set_ab_loop_end(&self) {
        self.atomics.loop_end.store(self.current_position());
    }

    /// Turn the AB loop on (jumping to its start marker) or off
    pub fn enable_ab_loop(&self, enabled: bool) {
        self.atomics.ab_enabled.store(enabled, Ordering::Relaxed);
        if enabled {
            self.atomics.seek(self.atomics.loop_start.load());
        }
    }

    pub fn set_end_of_track(&self, policy: EndOfTrackPolicy) {
        self.atomics.end_of_track.store(policy as u8, Ordering::Relaxed);
    }

    pub fn set_enforce_ab_loop(&self, enforce: bool) {
        self.atomics.enforce_ab_loop.store(enforce, Ordering::Relaxed);
    }

    /// Playhead position in seconds
    pub fn current_position(&self) -> f64 {
        self.atomics.position.load()
    }

    /// Length of the loaded source in seconds (0 when nothing is loaded)
    pub fn total_length(&self) -> f64 {
        self.atomics.source.get().length_seconds()
    }

    pub fn state(&self) -> TransportState {
        self.atomics.state.get()
    }

    pub fn is_playing(&self) -> bool {
        self.state() == TransportState::Playing
    }

    pub fn is_paused(&self) -> bool {
        self.state() == TransportState::Paused
    }

    pub fn is_muted(&self) -> bool {
        self.atomics.muted.load(Ordering::Relaxed)
    }

    pub fn is_looping(&self) -> bool {
        self.atomics.looping.load(Ordering::Relaxed)
    }

    pub fn gain(&self) -> f32 {
        self.atomics.gain.load()
    }

    pub fn speed(&self) -> f64 {
        self.atomics.speed.load()
    }

    pub fn end_of_track(&self) -> EndOfTrackPolicy {
        self.atomics.end_of_track()
    }

    pub fn ab_loop(&self) -> AbLoop {
        AbLoop {
            start: self.atomics.loop_start.load(),
            end: self.atomics.loop_end.load(),
            enabled: self.atomics.ab_enabled.load(Ordering::Relaxed),
        }
    }

    /// Title/artist/duration text of the loaded source (empty when unloaded)
    pub fn metadata(&self) -> String {
        self.atomics.source.get().metadata.clone()
    }

    /// Drain events reported by the render thread since the last poll
    pub fn poll_events(&self) -> Vec<DeckEvent> {
        self.events.drain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{DecodedSource, SourceResult, SourceTags, SymphoniaReader};
    use crate::types::{Sample, DEFAULT_CHANNELS};

    const RATE: u32 = 44100;
    const BLOCK: usize = 512;

    /// Reader that hands out a fixed constant-level source for any path
    struct ConstReader {
        frames: usize,
        level: Sample,
    }

    impl SourceReader for ConstReader {
        fn open(&self, _path: &Path) -> SourceResult<Box<dyn AudioSource>> {
            let source = DecodedSource::from_planar(vec![vec![self.level; self.frames]], RATE)
                .with_tags(SourceTags::new("Const", "Tester"));
            Ok(Box::new(source))
        }
    }

    fn test_deck(options: DeckOptions) -> (Deck, DeckController) {
        let mut deck = Deck::new(DeckId::A, options);
        deck.prepare(BLOCK, RATE);
        let controller = deck.controller(Arc::new(SymphoniaReader::new()));
        (deck, controller)
    }

    fn dc(frames: usize, level: Sample) -> Box<dyn AudioSource> {
        Box::new(DecodedSource::from_planar(vec![vec![level; frames]], RATE))
    }

    fn ramp(frames: usize) -> Box<dyn AudioSource> {
        let data = (0..frames).map(|i| i as Sample / frames as Sample).collect();
        Box::new(DecodedSource::from_planar(vec![data], RATE))
    }

    fn render(deck: &mut Deck) -> AudioBuffer {
        let mut out = AudioBuffer::silence(DEFAULT_CHANNELS, BLOCK);
        deck.render_block(&mut out);
        out
    }

    fn count_non_silent(buffer: &AudioBuffer) -> usize {
        (0..buffer.len()).filter(|&i| buffer.frame_peak(i) > 0.0).count()
    }

    #[test]
    fn test_unloaded_deck_renders_silence() {
        let (mut deck, controller) = test_deck(DeckOptions::default());
        controller.play();
        assert!(!controller.is_playing());

        for frames in [0, 1, 64, 4096] {
            let mut out = AudioBuffer::silence(DEFAULT_CHANNELS, frames);
            out.channel_mut(0).iter_mut().for_each(|s| *s = 1.0);
            deck.render_block(&mut out);
            assert!(out.is_silent());
            assert_eq!(out.len(), frames);
        }
    }

    #[test]
    fn test_failed_load_keeps_silence() {
        let (mut deck, controller) = test_deck(DeckOptions::default());
        let result = controller.load("nonexistent.wav");
        assert!(result.is_err());
        assert!(!controller.is_loaded());
        assert!(render(&mut deck).is_silent());
    }

    #[test]
    fn test_failed_load_keeps_previous_source() {
        let (mut deck, controller) = test_deck(DeckOptions::default());
        controller.load_source(dc(RATE as usize, 0.5));
        controller.play();
        render(&mut deck);

        assert!(controller.load("nonexistent.wav").is_err());
        assert!(controller.is_playing());
        assert_eq!(controller.total_length(), 1.0);
        assert_eq!(count_non_silent(&render(&mut deck)), BLOCK);
    }

    #[test]
    fn test_load_through_reader_sets_metadata() {
        let mut deck = Deck::new(DeckId::B, DeckOptions::default());
        deck.prepare(BLOCK, RATE);
        let controller = deck.controller(Arc::new(ConstReader { frames: 22050, level: 0.25 }));

        controller.load("anything.wav").unwrap();
        assert_eq!(controller.metadata(), "Title: Const\nArtist: Tester\nDuration: 0.50s");
        assert_eq!(controller.total_length(), 0.5);
        assert_eq!(controller.current_position(), 0.0);
        assert_eq!(controller.state(), TransportState::Stopped);

        render(&mut deck);
        assert_eq!(
            controller.poll_events(),
            vec![DeckEvent::SourceChanged { generation: 1 }]
        );
    }

    #[test]
    fn test_gain_scales_exactly() {
        for gain in [0.0, 0.3, 1.0, 1.7, 2.0, 5.0, -1.0] {
            let (mut deck, controller) = test_deck(DeckOptions::default());
            controller.load_source(ramp(4 * BLOCK));
            controller.set_gain(gain);
            controller.play();
            let out = render(&mut deck);

            let expected_gain = gain.clamp(MIN_GAIN, MAX_GAIN);
            for i in 0..BLOCK {
                let input = i as Sample / (4 * BLOCK) as Sample;
                assert_eq!(out.channel(0)[i], input * expected_gain);
                assert_eq!(out.channel(1)[i], input * expected_gain);
            }
        }
    }

    #[test]
    fn test_mute_keeps_stored_gain() {
        let (mut deck, controller) = test_deck(DeckOptions::default());
        controller.load_source(dc(8 * BLOCK, 0.5));
        controller.set_gain(0.8);
        controller.play();

        controller.toggle_mute();
        assert!(controller.is_muted());
        assert!(render(&mut deck).is_silent());

        controller.set_gain(1.5);
        controller.toggle_mute();
        assert!(!controller.is_muted());
        assert_eq!(controller.gain(), 1.5);
        let out = render(&mut deck);
        assert_eq!(out.channel(0)[0], 0.5 * 1.5);
    }

    #[test]
    fn test_transport_transitions() {
        let (_deck, controller) = test_deck(DeckOptions::default());
        controller.load_source(dc(RATE as usize, 0.5));

        controller.pause();
        assert_eq!(controller.state(), TransportState::Stopped);

        controller.play();
        controller.play();
        assert!(controller.is_playing());

        controller.pause();
        assert!(controller.is_paused());

        controller.play();
        assert!(controller.is_playing());

        controller.stop();
        assert_eq!(controller.state(), TransportState::Stopped);
    }

    #[test]
    fn test_stop_always_rewinds() {
        let (mut deck, controller) = test_deck(DeckOptions::default());
        controller.load_source(dc(RATE as usize * 2, 0.5));

        controller.set_position(1.0);
        controller.stop();
        assert_eq!(controller.current_position(), 0.0);

        controller.play();
        for _ in 0..10 {
            render(&mut deck);
        }
        assert!(controller.current_position() > 0.0);
        controller.stop();
        assert_eq!(controller.current_position(), 0.0);
        render(&mut deck);
        assert_eq!(controller.current_position(), 0.0);

        controller.play();
        controller.pause();
        controller.stop();
        assert_eq!(controller.current_position(), 0.0);
    }

    #[test]
    fn test_pause_resume_continues_seamlessly() {
        let (mut deck, controller) = test_deck(DeckOptions::default());
        controller.load_source(ramp(RATE as usize));
        controller.play();
        for _ in 0..3 {
            render(&mut deck);
        }

        controller.pause();
        let paused_at = controller.current_position();
        assert_eq!(paused_at, (3 * BLOCK) as f64 / RATE as f64);
        assert!(render(&mut deck).is_silent());
        assert_eq!(controller.current_position(), paused_at);

        controller.play();
        let out = render(&mut deck);
        assert_eq!(out.channel(0)[0], (3 * BLOCK) as Sample / RATE as Sample);
    }

    #[test]
    fn test_restart_respects_pause() {
        let (mut deck, controller) = test_deck(DeckOptions::default());
        controller.load_source(dc(RATE as usize, 0.5));

        controller.restart();
        assert!(controller.is_playing());
        render(&mut deck);

        controller.pause();
        controller.restart();
        assert!(controller.is_paused());
        assert_eq!(controller.current_position(), 0.0);

        controller.play();
        controller.set_position(0.5);
        controller.restart();
        assert!(controller.is_playing());
        assert_eq!(controller.current_position(), 0.0);
    }

    #[test]
    fn test_go_to_end_and_start() {
        let (_deck, controller) = test_deck(DeckOptions::default());
        controller.go_to_end();
        assert_eq!(controller.current_position(), 0.0);

        controller.load_source(dc(RATE as usize, 0.5));
        controller.go_to_end();
        assert!((controller.current_position() - 0.95).abs() < 1e-9);
        controller.go_to_start();
        assert_eq!(controller.current_position(), 0.0);

        // Too short to jump
        controller.load_source(dc(RATE as usize / 20, 0.5));
        controller.go_to_end();
        assert_eq!(controller.current_position(), 0.0);
    }

    #[test]
    fn test_set_position_clamps() {
        let (_deck, controller) = test_deck(DeckOptions::default());
        controller.load_source(dc(RATE as usize, 0.5));
        controller.set_position(-3.0);
        assert_eq!(controller.current_position(), 0.0);
        controller.set_position(12.0);
        assert_eq!(controller.current_position(), 1.0);
        controller.set_position(f64::NAN);
        assert_eq!(controller.current_position(), 0.0);
    }

    #[test]
    fn test_speed_is_clamped() {
        let (_deck, controller) = test_deck(DeckOptions::default());
        controller.set_speed(10.0);
        assert_eq!(controller.speed(), MAX_SPEED);
        controller.set_speed(0.0);
        assert_eq!(controller.speed(), MIN_SPEED);
        controller.set_speed(1.25);
        assert_eq!(controller.speed(), 1.25);
    }

    /// Render until the deck stops, returning (render calls, non-silent frames)
    fn play_to_end(speed: f64) -> (usize, usize) {
        let (mut deck, controller) = test_deck(DeckOptions::default());
        controller.load_source(Box::new(DecodedSource::from_planar(
            vec![vec![0.5; RATE as usize]],
            RATE,
        )));
        controller.set_speed(speed);
        controller.play();

        let mut calls = 0;
        let mut frames = 0;
        while controller.is_playing() && calls < 1000 {
            frames += count_non_silent(&render(&mut deck));
            calls += 1;
        }
        (calls, frames)
    }

    #[test]
    fn test_one_second_tone_plays_out() {
        let (calls, frames) = play_to_end(1.0);
        assert!((frames as i64 - RATE as i64).abs() <= BLOCK as i64);
        assert_eq!(calls, (RATE as usize).div_ceil(BLOCK));
    }

    #[test]
    fn test_double_speed_consumes_twice_as_fast() {
        let (normal_calls, _) = play_to_end(1.0);
        let (fast_calls, fast_frames) = play_to_end(2.0);
        assert!((fast_frames as i64 - (RATE / 2) as i64).abs() <= BLOCK as i64);
        assert!((fast_calls as i64 - (normal_calls / 2) as i64).abs() <= 1);
    }

    #[test]
    fn test_stop_policy_reports_end() {
        let (mut deck, controller) = test_deck(DeckOptions::default());
        controller.load_source(dc(300, 0.5));
        controller.play();

        let out = render(&mut deck);
        assert_eq!(count_non_silent(&out), 300);
        assert_eq!(controller.state(), TransportState::Stopped);
        assert!((controller.current_position() - 300.0 / RATE as f64).abs() < 1e-12);
        assert_eq!(
            controller.poll_events(),
            vec![DeckEvent::SourceChanged { generation: 1 }, DeckEvent::ReachedEnd]
        );
    }

    #[test]
    fn test_end_on_block_boundary_keeps_position_in_range() {
        // 1023 frames at double speed end inside the last output frame
        for policy in [EndOfTrackPolicy::Stop, EndOfTrackPolicy::Hold, EndOfTrackPolicy::Loop] {
            let (mut deck, controller) = test_deck(DeckOptions {
                end_of_track: policy,
                ..DeckOptions::default()
            });
            controller.load_source(dc(1023, 0.5));
            controller.set_speed(2.0);
            controller.play();

            assert_eq!(count_non_silent(&render(&mut deck)), BLOCK);
            let position = controller.current_position();
            assert!((0.0..=controller.total_length()).contains(&position));

            let events = controller.poll_events();
            match policy {
                EndOfTrackPolicy::Stop => {
                    assert_eq!(controller.state(), TransportState::Stopped);
                    assert_eq!(position, controller.total_length());
                    assert!(events.contains(&DeckEvent::ReachedEnd));
                }
                EndOfTrackPolicy::Hold => {
                    assert!(controller.is_playing());
                    assert_eq!(position, controller.total_length());
                    assert!(render(&mut deck).is_silent());
                    let ends = events
                        .iter()
                        .chain(controller.poll_events().iter())
                        .filter(|e| **e == DeckEvent::ReachedEnd)
                        .count();
                    assert_eq!(ends, 1);
                }
                EndOfTrackPolicy::Loop => {
                    assert!(controller.is_playing());
                    assert!(position < controller.total_length());
                    assert!(events.contains(&DeckEvent::Looped));
                }
            }
        }
    }

    #[test]
    fn test_mismatched_rate_end_stays_in_range() {
        let (mut deck, controller) = test_deck(DeckOptions::default());
        controller.load_source(Box::new(DecodedSource::from_planar(
            vec![vec![0.5; 4000]],
            48000,
        )));
        controller.play();

        let mut calls = 0;
        while controller.is_playing() && calls < 100 {
            render(&mut deck);
            assert!(controller.current_position() <= controller.total_length());
            calls += 1;
        }
        assert_eq!(controller.state(), TransportState::Stopped);
        assert_eq!(controller.current_position(), controller.total_length());
    }

    #[test]
    fn test_seek_for_previous_source_is_dropped_on_load() {
        let (mut deck, controller) = test_deck(DeckOptions::default());
        controller.load_source(ramp(RATE as usize));
        render(&mut deck);

        controller.set_position(0.5);
        controller.load_source(ramp(RATE as usize));
        assert_eq!(controller.current_position(), 0.0);

        controller.play();
        let out = render(&mut deck);
        assert_eq!(out.channel(0)[0], 0.0);
        assert_eq!(controller.current_position(), BLOCK as f64 / RATE as f64);
    }

    #[test]
    fn test_control_thread_races_render_thread() {
        use std::thread;
        use std::time::Duration;

        // Power-of-two rate and seek targets keep the playhead on whole
        // frames, so every rendered sample is an exact source level
        const POW2_RATE: u32 = 32768;
        const FRAMES: usize = 3072;
        let mut deck = Deck::new(
            DeckId::A,
            DeckOptions {
                end_of_track: EndOfTrackPolicy::Loop,
                ..DeckOptions::default()
            },
        );
        deck.prepare(BLOCK, POW2_RATE);
        let controller = deck.controller(Arc::new(SymphoniaReader::new()));
        let level_source = |level: Sample| -> Box<dyn AudioSource> {
            Box::new(DecodedSource::from_planar(vec![vec![level; FRAMES]], POW2_RATE))
        };
        controller.load_source(level_source(0.25));
        controller.play();
        let length = controller.total_length();

        let done = Arc::new(AtomicBool::new(false));
        let control = {
            let controller = controller.clone();
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut i = 0usize;
                while !done.load(Ordering::Relaxed) {
                    match i % 4 {
                        0 => {
                            let level = if i % 8 == 0 { 0.25 } else { 0.5 };
                            controller.load_source(level_source(level));
                        }
                        1 => controller.set_position((i % 6) as f64 / 64.0),
                        2 => controller.set_gain(if i % 3 == 0 { 1.0 } else { 2.0 }),
                        _ => {
                            controller.stop();
                            controller.play();
                        }
                    }
                    i += 1;
                    // Replaced sources are only freed every collector pass
                    thread::sleep(Duration::from_micros(50));
                }
            })
        };

        let allowed = [0.25, 0.5, 1.0];
        for _ in 0..5000 {
            let out = render(&mut deck);
            // One block comes from exactly one source snapshot and one gain
            let first = out.channel(0).iter().copied().find(|&s| s != 0.0);
            if let Some(level) = first {
                assert!(allowed.contains(&level), "unexpected level {level}");
            }
            for ch in 0..out.num_channels() {
                assert!(out.channel(ch).iter().all(|&s| s == 0.0 || Some(s) == first));
            }

            let position = controller.current_position();
            assert!(
                (0.0..=length).contains(&position),
                "position {position} outside [0, {length}]"
            );
            thread::yield_now();
        }

        done.store(true, Ordering::Relaxed);
        control.join().unwrap();
    }

    #[test]
    fn test_hold_policy_keeps_playing_silently() {
        let (mut deck, controller) = test_deck(DeckOptions {
            end_of_track: EndOfTrackPolicy::Hold,
            ..DeckOptions::default()
        });
        controller.load_source(dc(300, 0.5));
        controller.play();

        assert_eq!(count_non_silent(&render(&mut deck)), 300);
        assert!(render(&mut deck).is_silent());
        assert!(controller.is_playing());

        let ends = controller
            .poll_events()
            .into_iter()
            .filter(|e| *e == DeckEvent::ReachedEnd)
            .count();
        assert_eq!(ends, 1);
    }

    #[test]
    fn test_looping_wraps_without_gap() {
        let (mut deck, controller) = test_deck(DeckOptions::default());
        controller.load_source(dc(300, 0.5));
        controller.set_looping(true);
        controller.play();

        let out = render(&mut deck);
        assert_eq!(count_non_silent(&out), BLOCK);
        assert!(controller.is_playing());
        let expected = (BLOCK % 300) as f64 / RATE as f64;
        assert!((controller.current_position() - expected).abs() < 1e-12);
        assert!(controller.poll_events().contains(&DeckEvent::Looped));
    }

    #[test]
    fn test_loop_policy_wraps() {
        let (mut deck, controller) = test_deck(DeckOptions {
            end_of_track: EndOfTrackPolicy::Loop,
            ..DeckOptions::default()
        });
        controller.load_source(dc(300, 0.5));
        controller.play();
        for _ in 0..4 {
            assert_eq!(count_non_silent(&render(&mut deck)), BLOCK);
        }
        assert!(controller.is_playing());
    }

    #[test]
    fn test_enable_ab_loop_seeks_to_start() {
        let (mut deck, controller) = test_deck(DeckOptions::default());
        controller.load_source(dc(RATE as usize * 5, 0.5));
        controller.set_position(3.0);
        render(&mut deck);
        controller.set_ab_loop_start();
        controller.set_position(4.0);
        controller.set_ab_loop_end();

        controller.enable_ab_loop(true);
        assert_eq!(controller.current_position(), 3.0);
        render(&mut deck);
        assert_eq!(controller.current_position(), 3.0);
        assert_eq!(
            controller.ab_loop(),
            AbLoop { start: 3.0, end: 4.0, enabled: true }
        );
    }

    #[test]
    fn test_ab_loop_not_enforced_by_default() {
        let (mut deck, controller) = test_deck(DeckOptions::default());
        controller.load_source(dc(RATE as usize, 0.5));
        controller.set_ab_loop_start();
        controller.set_position(0.01);
        controller.set_ab_loop_end();
        controller.enable_ab_loop(true);
        controller.play();

        for _ in 0..4 {
            render(&mut deck);
        }
        assert!(controller.current_position() > 0.01);
    }

    #[test]
    fn test_ab_loop_enforced_wraps_sample_accurately() {
        // Power-of-two rate keeps marker seconds exact
        const POW2_RATE: u32 = 32768;
        let mut deck = Deck::new(
            DeckId::A,
            DeckOptions {
                enforce_ab_loop: true,
                ..DeckOptions::default()
            },
        );
        deck.prepare(BLOCK, POW2_RATE);
        let controller = deck.controller(Arc::new(SymphoniaReader::new()));
        let data = (0..POW2_RATE).map(|i| i as Sample).collect();
        controller.load_source(Box::new(DecodedSource::from_planar(vec![data], POW2_RATE)));

        controller.set_position(100.0 / POW2_RATE as f64);
        controller.set_ab_loop_start();
        controller.set_position(400.0 / POW2_RATE as f64);
        controller.set_ab_loop_end();
        controller.enable_ab_loop(true);
        controller.play();

        let out = render(&mut deck);
        // 300 frames of loop, then straight back to the start marker
        assert_eq!(out.channel(0)[0], 100.0);
        assert_eq!(out.channel(0)[299], 399.0);
        assert_eq!(out.channel(0)[300], 100.0);
        assert_eq!(out.channel(0)[BLOCK - 1], (100 + BLOCK - 1 - 300) as Sample);
        assert!(controller.is_playing());
    }

    #[test]
    fn test_stereo_source_extra_channels_silent() {
        let mut deck = Deck::new(DeckId::A, DeckOptions::default());
        deck.prepare(BLOCK, RATE);
        let controller = deck.controller(Arc::new(SymphoniaReader::new()));
        controller.load_source(Box::new(DecodedSource::from_planar(
            vec![vec![0.25; 4096], vec![-0.25; 4096]],
            RATE,
        )));
        controller.play();

        let mut out = AudioBuffer::silence(4, 64);
        deck.render_block(&mut out);
        assert!(out.channel(0).iter().all(|&s| s == 0.25));
        assert!(out.channel(1).iter().all(|&s| s == -0.25));
        assert!(out.channel(2).iter().all(|&s| s == 0.0));
        assert!(out.channel(3).iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_unprepared_deck_is_silent() {
        let mut deck = Deck::new(DeckId::A, DeckOptions::default());
        let controller = deck.controller(Arc::new(SymphoniaReader::new()));
        controller.load_source(dc(4096, 0.5));
        controller.play();
        assert!(render(&mut deck).is_silent());

        deck.prepare(BLOCK, RATE);
        assert!(!render(&mut deck).is_silent());
        deck.release();
        assert!(render(&mut deck).is_silent());
    }

    #[test]
    fn test_controller_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<DeckController>();
        fn assert_send<T: Send>() {}
        assert_send::<Deck>();
    }
}
