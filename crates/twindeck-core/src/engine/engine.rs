//! Session assembly - two decks, a mixer and their control handles

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::source::{SourceReader, SymphoniaReader};
use crate::types::DeckId;

use super::{Deck, DeckController, MixController, MixEngine};

/// Control handles for a dual-deck session
///
/// Everything here is `Clone + Send + Sync`; hand copies to as many control
/// threads as needed. The render side lives in the matching [`MixEngine`].
#[derive(Clone)]
pub struct EngineControls {
    pub deck_a: DeckController,
    pub deck_b: DeckController,
    pub mixer: MixController,
}

impl EngineControls {
    pub fn deck(&self, id: DeckId) -> &DeckController {
        match id {
            DeckId::A => &self.deck_a,
            DeckId::B => &self.deck_b,
        }
    }
}

/// Builder for a two-deck session
pub struct DualDeckEngine;

impl DualDeckEngine {
    /// Build both decks and the mixer, decoding files with symphonia
    pub fn new(config: &EngineConfig) -> (MixEngine<Deck>, EngineControls) {
        Self::with_reader(config, Arc::new(SymphoniaReader::new()))
    }

    /// Build both decks and the mixer with a custom source reader
    pub fn with_reader(
        config: &EngineConfig,
        reader: Arc<dyn SourceReader>,
    ) -> (MixEngine<Deck>, EngineControls) {
        let options = config.deck_options();
        let deck_a = Deck::new(DeckId::A, options);
        let deck_b = Deck::new(DeckId::B, options);

        let controls_a = deck_a.controller(Arc::clone(&reader));
        let controls_b = deck_b.controller(reader);

        let engine = MixEngine::with_crossfade(deck_a, deck_b, config.initial_crossfade);
        let mixer = engine.controller();

        log::info!(
            "Dual-deck engine created (end of track: {:?}, AB loop enforced: {}, {})",
            config.end_of_track,
            config.enforce_ab_loop,
            config.interpolation.display_name()
        );

        (
            engine,
            EngineControls {
                deck_a: controls_a,
                deck_b: controls_b,
                mixer,
            },
        )
    }
}
