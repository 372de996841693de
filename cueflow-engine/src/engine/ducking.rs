//! Cross-cue ducking coordination
//!
//! Ducking is an axis orthogonal to play/fade status: a cue can be ducked
//! while playing, fading, or paused. A trigger cue starting lowers every
//! duckable cue; the trigger ending (by any path - natural end, stop,
//! retrigger) restores each ducked cue to the exact volume captured when it
//! was ducked. The restore is verbatim: operator volume changes made while
//! ducked are intentionally discarded.

use super::core::Engine;
use crate::ducking::ducked_volume;
use cueflow_common::{Cue, CueId};
use tracing::{debug, warn};

impl Engine {
    /// A trigger cue started: duck every other playing cue that opts in
    pub(super) fn duck_other_cues(&mut self, trigger: &Cue) {
        let level_percent = trigger.ducking_level_percent;
        for (cue_id, state) in self.registry.currently_playing.iter_mut() {
            if *cue_id == trigger.id || state.is_ducked {
                continue;
            }
            // Paused and still-loading cues are left alone; if they start
            // while the trigger is live, duck_self_on_play catches them
            if !state.is_audibly_playing() {
                continue;
            }
            let duckable = self
                .store
                .cue_by_id(cue_id)
                .map(|c| c.enable_ducking)
                .unwrap_or(false);
            if !duckable {
                continue;
            }
            let Some(voice) = state.voice.as_mut() else {
                continue;
            };

            let original = voice.volume();
            state.original_volume_before_duck = original;
            state.is_ducked = true;
            state.active_ducking_trigger = Some(trigger.id);
            voice.set_volume(ducked_volume(original, level_percent));
            debug!(%cue_id, trigger = %trigger.id, original, level_percent, "Ducked");
        }
    }

    /// A duckable cue started: if a trigger is already active, enter ducked
    /// immediately rather than waiting for the next trigger
    pub(super) fn duck_self_on_play(&mut self, cue: &Cue) {
        let active_trigger = self
            .registry
            .currently_playing
            .iter()
            .filter(|(id, state)| **id != cue.id && state.is_audibly_playing())
            .map(|(id, _)| *id)
            .find(|id| {
                self.store
                    .cue_by_id(id)
                    .map(|c| c.is_ducking_trigger)
                    .unwrap_or(false)
            });

        let trigger = match active_trigger {
            Some(id) => self.store.cue_by_id(&id),
            None => None,
        };

        let Some(state) = self.registry.currently_playing.get_mut(&cue.id) else {
            return;
        };

        match trigger {
            Some(trigger) => {
                if state.is_ducked {
                    return;
                }
                let Some(voice) = state.voice.as_mut() else {
                    return;
                };
                let original = voice.volume();
                state.original_volume_before_duck = original;
                state.is_ducked = true;
                state.active_ducking_trigger = Some(trigger.id);
                voice.set_volume(ducked_volume(original, trigger.ducking_level_percent));
                debug!(cue_id = %cue.id, trigger = %trigger.id, "Ducked on entry");
            }
            None => {
                // Self-heal: a ducked flag with no live trigger means the
                // trigger's revert never reached this cue
                if state.is_ducked {
                    warn!(cue_id = %cue.id, "Ducked with no active trigger; restoring volume");
                    let original = state.original_volume_before_duck;
                    state.is_ducked = false;
                    state.active_ducking_trigger = None;
                    if let Some(voice) = state.voice.as_mut() {
                        voice.set_volume(original);
                    }
                }
            }
        }
    }

    /// A trigger cue ended: restore every cue it ducked
    pub(super) fn revert_ducking_for_trigger(&mut self, trigger_id: CueId) {
        for (cue_id, state) in self.registry.currently_playing.iter_mut() {
            if state.active_ducking_trigger != Some(trigger_id) {
                continue;
            }
            let original = state.original_volume_before_duck;
            state.is_ducked = false;
            state.active_ducking_trigger = None;
            if let Some(voice) = state.voice.as_mut() {
                voice.set_volume(original);
            }
            debug!(%cue_id, trigger = %trigger_id, restored = original, "Ducking reverted");
        }
    }
}
