//! Per-cue time/fade broadcaster tasks
//!
//! Each playing cue gets one interval task that posts generation-tagged
//! ticks back into the engine queue; the engine builds and emits the actual
//! `TimeUpdate` so the snapshot always reflects the authoritative registry.
//! The task handle lives on the playback state and is aborted whenever the
//! voice is paused, stopped, or superseded; a tick that slips through after
//! that is dropped by its generation tag.

use super::core::Engine;
use super::EngineMsg;
use crate::fade;
use crate::registry::PlaybackStatus;
use cueflow_common::{CueId, EngineEvent};

impl Engine {
    /// Start (or restart) the broadcaster task for a cue
    ///
    /// The first tick fires one period after start; the caller emits the
    /// immediate update itself, so the interval must not duplicate it.
    pub(super) fn start_broadcaster(&mut self, cue_id: CueId) {
        let tx = self.msg_tx.clone();
        let period = self.config.tick_interval;
        let Some(state) = self.registry.currently_playing.get_mut(&cue_id) else {
            return;
        };
        if let Some(handle) = state.time_task.take() {
            handle.abort();
        }
        let generation = state.generation;
        state.time_task = Some(tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut ticker = tokio::time::interval_at(start, period);
            loop {
                ticker.tick().await;
                if tx.send(EngineMsg::Tick { cue_id, generation }).is_err() {
                    break;
                }
            }
        }));
    }

    /// Process one broadcaster tick
    ///
    /// Doubles as the engine-side fade watchdog: voices are only obliged to
    /// emit sparse `FadeTick`s, so completion is also checked here against
    /// the fade clock.
    pub(super) fn handle_tick(&mut self, cue_id: CueId, generation: u64) {
        let epsilon = self.config.fade_epsilon;
        let Some(state) = self.registry.currently_playing.get_mut(&cue_id) else {
            return;
        };
        if state.generation != generation {
            return;
        }

        // Ticking in a non-playing state means the abort raced the tick;
        // terminate the loop now
        if matches!(
            state.status,
            PlaybackStatus::Paused { .. } | PlaybackStatus::Cued { .. } | PlaybackStatus::Loading
        ) || (matches!(state.status, PlaybackStatus::Playing) && !state.is_audibly_playing())
        {
            if let Some(handle) = state.time_task.take() {
                handle.abort();
            }
            return;
        }

        let volume = state.voice.as_ref().map(|v| v.volume()).unwrap_or(0.0);
        match state.status {
            PlaybackStatus::FadingOut { started_at, total } => {
                if volume <= epsilon || started_at.elapsed() >= total {
                    let reason = state.stop_reason;
                    self.stop_cue(cue_id, reason);
                    return;
                }
            }
            PlaybackStatus::FadingIn {
                started_at,
                total,
                target_volume,
            } => {
                if fade::is_complete(volume, target_volume, epsilon, started_at, total) {
                    state.status = PlaybackStatus::Playing;
                }
            }
            _ => {}
        }

        let Some(state) = self.registry.currently_playing.get(&cue_id) else {
            return;
        };
        let update = self.build_time_update(state);
        let _ = self.events.send(EngineEvent::TimeUpdate { cue_id, update });
    }
}
