//! Engine configuration

use serde::{Deserialize, Serialize};

use crate::audio::AudioConfig;
use crate::engine::{DeckOptions, EndOfTrackPolicy, InterpolationMethod, DEFAULT_CROSSFADE};

/// Everything needed to build and run a dual-deck session
///
/// ```yaml
/// end_of_track: stop        # hold | stop | loop
/// enforce_ab_loop: false
/// interpolation: cubic      # linear | cubic
/// initial_crossfade: 0.5
/// audio:
///   device: null
///   buffer_size: Default    # or !Fixed 256
///   sample_rate: 48000
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// What a deck does when it plays off the end of its source
    /// Default: stop
    pub end_of_track: EndOfTrackPolicy,

    /// Wrap playback from the AB end marker to the start marker while the AB
    /// loop is enabled. When off the markers only serve as seek targets.
    /// Default: false
    pub enforce_ab_loop: bool,

    /// Interpolation used for varispeed and sample rate conversion
    /// Default: cubic
    pub interpolation: InterpolationMethod,

    /// Crossfader position at startup (0 = deck A, 1 = deck B)
    /// Default: 0.5
    pub initial_crossfade: f32,

    /// Output device settings
    pub audio: AudioConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            end_of_track: EndOfTrackPolicy::default(),
            enforce_ab_loop: false,
            interpolation: InterpolationMethod::default(),
            initial_crossfade: DEFAULT_CROSSFADE,
            audio: AudioConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Per-deck options derived from this configuration
    pub fn deck_options(&self) -> DeckOptions {
        DeckOptions {
            end_of_track: self.end_of_track,
            enforce_ab_loop: self.enforce_ab_loop,
            interpolation: self.interpolation,
        }
    }
}
