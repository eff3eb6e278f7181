//! Playback engine - decks, crossfade mixer and their control handles
//!
//! - Deck: one playback lane (transport, resampling, gain/mute, loops)
//! - MixEngine: linear crossfade of two decks into one output
//! - DualDeckEngine: builds a session and hands out control handles
//!
//! The render side (`Deck`, `MixEngine`) is owned by the audio thread and
//! takes `&mut self`. Control threads use the cloneable controllers, which
//! only touch atomics and the deck's `SharedCell` source slot.

mod atomics;
mod deck;
mod engine;
mod events;
mod gc;
mod mixer;
mod resample;
mod transport;

pub use deck::{AbLoop, Deck, DeckController, DeckOptions, LoadError};
pub use engine::{DualDeckEngine, EngineControls};
pub use events::{DeckEvent, EVENT_QUEUE_CAPACITY};
pub use mixer::{MixController, MixEngine, DEFAULT_CROSSFADE};
pub use resample::{InterpolationMethod, ResamplingStage};
pub use transport::{EndOfTrackPolicy, Transport, TransportState};
