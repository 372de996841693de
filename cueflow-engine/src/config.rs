//! Engine configuration
//!
//! Tunables with documented defaults. There is no configuration file: the
//! engine is embedded as a library and hosts construct this struct directly.

use std::time::Duration;

/// Playback engine tunables
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Time/fade broadcaster tick interval (default: 100ms)
    ///
    /// Chosen for smooth fade countdown display; longer periods are safe for
    /// correctness but make fade progress visibly chunky.
    pub tick_interval: Duration,

    /// Volume threshold for fade completion detection (default: 0.001)
    ///
    /// Tunable rather than a hard constant: at very low configured cue
    /// volumes a coarse epsilon can fire early, so completion also keys off
    /// elapsed fade time regardless of this value.
    pub fade_epsilon: f32,

    /// Event bus buffer capacity (default: 256 events)
    pub event_bus_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(100),
            fade_epsilon: 0.001,
            event_bus_capacity: 256,
        }
    }
}
