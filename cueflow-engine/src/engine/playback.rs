//! Operator operations - toggle, retrigger resolution, stop-all, navigation
//!
//! Everything in this module runs inside the engine task. Supersession is
//! always performed here, synchronously: the superseded voice is stopped
//! before the replacement is created, so the old voice's late events arrive
//! with a stale generation and are suppressed at dispatch.

use super::core::Engine;
use crate::fade;
use crate::registry::{CrossfadeInfo, PlaybackState, PlaybackStatus, StopReason};
use crate::traversal;
use crate::trim::voice_handles_looping;
use crate::voice::VoiceEventTx;
use cueflow_common::{Cue, CueId, EngineEvent, RetriggerBehavior, TimeUpdate};
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Playlist traversal fields carried across an item change
pub(super) struct PlaylistCarry {
    pub order: Vec<usize>,
    pub failed: HashSet<usize>,
    pub preserved_for_navigation: bool,
}

impl Engine {
    /// Resolve an operator trigger for one cue
    pub(super) fn toggle(
        &mut self,
        cue_id: CueId,
        force_pause: bool,
        retrigger_override: Option<RetriggerBehavior>,
    ) {
        let Some(cue) = self.store.cue_by_id(&cue_id) else {
            warn!(%cue_id, "Toggle for unknown cue ignored");
            return;
        };

        let Some(state) = self.registry.currently_playing.get(&cue_id) else {
            // No prior state: fresh start
            self.start_cue(&cue, None);
            return;
        };

        match state.status {
            PlaybackStatus::Paused { resume_at_secs } => {
                if !force_pause {
                    self.resume_cue(&cue, resume_at_secs);
                }
            }
            PlaybackStatus::Cued { next_index } => {
                // Cued playlist resumes at the cued item rather than
                // restarting from scratch
                self.start_cue(&cue, Some(next_index));
            }
            _ => {
                if force_pause {
                    self.pause_cue(cue_id);
                    return;
                }
                let behavior = retrigger_override.unwrap_or(cue.retrigger_behavior);
                debug!(%cue_id, ?behavior, "Retrigger while active");
                match behavior {
                    RetriggerBehavior::Restart => self.start_cue(&cue, None),
                    RetriggerBehavior::Stop => self.stop_cue(cue_id, StopReason::RetriggerStop),
                    RetriggerBehavior::FadeOutAndStop => {
                        self.begin_fade_out(cue_id, StopReason::FadeOutAndStop)
                    }
                    RetriggerBehavior::DoNothing => {
                        if cue.allow_overlap {
                            self.spawn_independent(&cue);
                        }
                    }
                }
            }
        }
    }

    /// Start (or restart) a cue from the top, superseding any prior instance
    pub(super) fn start_cue(&mut self, cue: &Cue, item_index_hint: Option<usize>) {
        if cue.is_playlist() {
            let order = traversal::build_playback_order(cue.items().len(), cue.playlist_play_mode);
            let Some(first) = item_index_hint.or_else(|| {
                traversal::first_playable_item(&order, &HashSet::new())
            }) else {
                warn!(cue_id = %cue.id, "Playlist cue has no items");
                return;
            };
            self.attach(
                cue,
                Some(first),
                None,
                None,
                Some(PlaylistCarry {
                    order,
                    failed: HashSet::new(),
                    preserved_for_navigation: false,
                }),
                false,
            );
        } else {
            self.attach(cue, None, None, None, None, false);
        }
    }

    /// Create a voice for a cue (or playlist item), wire its callbacks, and
    /// make it the authoritative instance
    ///
    /// `supersede_unload` selects the cleanup tier for the replaced voice:
    /// playlist item handoffs unload the item's voice, retrigger restarts
    /// only stop it (it may still be referenced by in-flight callbacks).
    pub(super) fn attach(
        &mut self,
        cue: &Cue,
        item_index: Option<usize>,
        resume_secs: Option<f64>,
        crossfade: Option<CrossfadeInfo>,
        carry: Option<PlaylistCarry>,
        supersede_unload: bool,
    ) {
        // Supersede: the old voice always receives stop() before the new
        // voice exists, and its tasks are released before replacement
        if let Some(mut old) = self.registry.currently_playing.remove(&cue.id) {
            old.release_tasks();
            if let Some(mut voice) = old.voice.take() {
                self.registry.all_voices.remove(&voice.id());
                voice.stop();
                if supersede_unload {
                    voice.unload();
                }
                debug!(cue_id = %cue.id, old_generation = old.generation, "Superseded prior voice");
            }
        }

        let Some(path) = cue.source_path(item_index).cloned() else {
            warn!(cue_id = %cue.id, ?item_index, "Cue has no source for requested item");
            return;
        };

        self.generation_counter += 1;
        let generation = self.generation_counter;
        let voice_id = Uuid::new_v4();

        let tx = VoiceEventTx::new(self.voice_tx.clone(), voice_id, cue.id, generation);
        let mut voice = self.factory.create(tx);

        let (trim_start, trim_end, loop_enabled) = cue.effective_trim(item_index);
        voice.set_looping(loop_enabled && voice_handles_looping(trim_start, trim_end));

        let entering_silent = crossfade.as_ref().map(|cf| cf.is_crossfade_in).unwrap_or(false);
        voice.set_volume(if entering_silent { 0.0 } else { cue.volume });

        // Registered before load completes so stop-all can reach it
        self.registry.all_voices.insert(voice_id, cue.id);
        voice.load(&path);

        let mut state = PlaybackState::new(
            generation,
            cue.is_playlist(),
            carry.as_ref().map(|c| c.order.clone()).unwrap_or_default(),
        );
        state.voice = Some(voice);
        state.current_item_index = item_index.unwrap_or(0);
        state.crossfade = crossfade;
        state.pending_seek_secs = resume_secs.or((trim_start > 0.0).then_some(trim_start));
        if let Some(carry) = carry {
            state.failed_item_indices = carry.failed;
            state.preserved_for_navigation = carry.preserved_for_navigation;
        }

        info!(
            cue_id = %cue.id,
            generation,
            item = ?item_index,
            path = %path.display(),
            "Attached voice"
        );
        self.registry.currently_playing.insert(cue.id, state);
    }

    /// Pause with minimal cleanup: tasks cleared, voice preserved so a loop
    /// can continue uninterrupted on resume
    pub(super) fn pause_cue(&mut self, cue_id: CueId) {
        let item_name = self.active_item_name(&cue_id);
        let Some(state) = self.registry.currently_playing.get_mut(&cue_id) else {
            return;
        };
        let Some(voice) = state.voice.as_mut() else {
            return;
        };

        let resume_at_secs = voice.position();
        voice.pause();
        state.release_tasks();
        state.status = PlaybackStatus::Paused { resume_at_secs };

        debug!(%cue_id, resume_at_secs, "Paused");
        self.emit_playing_state(cue_id, false, item_name);
    }

    /// Resume a paused cue from its captured position
    pub(super) fn resume_cue(&mut self, cue: &Cue, resume_at_secs: f64) {
        let Some(state) = self.registry.currently_playing.get_mut(&cue.id) else {
            return;
        };
        let Some(voice) = state.voice.as_mut() else {
            // Voice was unloaded while paused; restart from the resume point
            let item = state.is_playlist.then_some(state.current_item_index);
            let carry = state.is_playlist.then(|| PlaylistCarry {
                order: state.playback_order.clone(),
                failed: state.failed_item_indices.clone(),
                preserved_for_navigation: false,
            });
            let cue = cue.clone();
            self.attach(&cue, item, Some(resume_at_secs), None, carry, false);
            return;
        };

        voice.seek(resume_at_secs);
        voice.play();
        debug!(cue_id = %cue.id, resume_at_secs, "Resuming");
        // Adoption (broadcaster, trim, ducking) happens on the play event
    }

    /// Deliberate stop with tiered cleanup
    ///
    /// Tier selection by reason:
    /// - StopAll: stop + force-unload (tearing down many cues at once)
    /// - Retrigger/fade-completed: stop without force-unload
    /// - PlaylistItemEnd: unload just this item's voice, keep the state for
    ///   traversal
    /// - None (plain stop): stop + unload + delete state
    pub(super) fn stop_cue(&mut self, cue_id: CueId, reason: StopReason) {
        let item_name = self.active_item_name(&cue_id);
        let is_trigger = self
            .store
            .cue_by_id(&cue_id)
            .map(|c| c.is_ducking_trigger)
            .unwrap_or(false);

        let Some(state) = self.registry.currently_playing.get_mut(&cue_id) else {
            return;
        };
        state.release_tasks();

        match reason {
            StopReason::PlaylistItemEnd => {
                if let Some(mut voice) = state.voice.take() {
                    self.registry.all_voices.remove(&voice.id());
                    voice.stop();
                    voice.unload();
                }
                // State survives: traversal needs it
            }
            StopReason::RetriggerStop | StopReason::FadeOutAndStop => {
                if let Some(mut voice) = state.voice.take() {
                    self.registry.all_voices.remove(&voice.id());
                    voice.stop();
                }
                self.registry.remove(&cue_id);
            }
            StopReason::StopAll => {
                if let Some(mut voice) = state.voice.take() {
                    self.registry.all_voices.remove(&voice.id());
                    voice.stop();
                    voice.unload();
                }
                self.registry.remove(&cue_id);
            }
            StopReason::None => {
                if let Some(mut voice) = state.voice.take() {
                    self.registry.all_voices.remove(&voice.id());
                    voice.stop();
                    voice.unload();
                }
                self.registry.remove(&cue_id);
            }
        }

        if is_trigger {
            self.revert_ducking_for_trigger(cue_id);
        }

        info!(%cue_id, ?reason, "Stopped");
        self.emit_playing_state(cue_id, false, item_name);
    }

    /// Begin a fade to silence; the stop itself happens when the fade
    /// completes (volume at the epsilon, or duration elapsed)
    pub(super) fn begin_fade_out(&mut self, cue_id: CueId, reason: StopReason) {
        let fade_out_ms = self.store.cue_by_id(&cue_id).map(|cue| {
            let item = self
                .registry
                .currently_playing
                .get(&cue_id)
                .filter(|s| s.is_playlist)
                .map(|s| s.current_item_index);
            cue.effective_fade_out_ms(item)
        });

        let fade_out_ms = fade_out_ms.unwrap_or(0);
        if fade_out_ms == 0 {
            self.stop_cue(cue_id, reason);
            return;
        }

        let Some(state) = self.registry.currently_playing.get_mut(&cue_id) else {
            return;
        };
        let Some(voice) = state.voice.as_mut() else {
            return;
        };

        let total = Duration::from_millis(fade_out_ms);
        voice.fade(voice.volume(), 0.0, total);
        state.status = PlaybackStatus::FadingOut {
            started_at: Instant::now(),
            total,
        };
        state.stop_reason = reason;
        debug!(%cue_id, fade_out_ms, ?reason, "Fading out to stop");
    }

    /// Stop every playing cue and every independent voice
    pub(super) fn stop_all(&mut self, use_fade: bool) {
        let cue_ids: Vec<CueId> = self.registry.currently_playing.keys().copied().collect();
        info!(count = cue_ids.len(), use_fade, "Stop all");

        for cue_id in cue_ids {
            let fade_eligible = use_fade
                && self
                    .registry
                    .currently_playing
                    .get(&cue_id)
                    .map(|s| s.is_audibly_playing())
                    .unwrap_or(false);
            if fade_eligible {
                self.begin_fade_out(cue_id, StopReason::StopAll);
                // Degenerate fade durations fall through to an immediate stop
                // inside begin_fade_out
            } else {
                self.stop_cue(cue_id, StopReason::StopAll);
            }
        }

        let independents: Vec<_> = self.registry.independent_voices.keys().copied().collect();
        for voice_id in independents {
            if let Some(mut voice) = self.registry.independent_voices.remove(&voice_id) {
                voice.stop();
                voice.unload();
            }
            self.registry.all_voices.remove(&voice_id);
        }
    }

    /// Operator navigation within a playing playlist
    ///
    /// The outgoing item crossfades out as a detached tail when a fade-out is
    /// configured; the incoming item enters silent and fades up when a
    /// fade-in is configured.
    pub(super) fn navigate(&mut self, cue_id: CueId, forward: bool) {
        let Some(cue) = self.store.cue_by_id(&cue_id) else {
            warn!(%cue_id, "Navigation for unknown cue ignored");
            return;
        };
        if !cue.is_playlist() {
            warn!(%cue_id, "Navigation on a non-playlist cue ignored");
            return;
        }
        // Resolve the target before touching the state: if nothing is
        // playable the cue must keep playing undisturbed
        let Some(state) = self.registry.currently_playing.get(&cue_id) else {
            return;
        };
        let current = state.current_item_index;
        let target = if forward {
            traversal::find_next_playable_item(&state.playback_order, &state.failed_item_indices, current)
                .or_else(|| traversal::first_playable_item(&state.playback_order, &state.failed_item_indices))
        } else {
            traversal::find_previous_playable_item(&state.playback_order, &state.failed_item_indices, current)
                .or_else(|| {
                    state
                        .playback_order
                        .iter()
                        .rev()
                        .copied()
                        .find(|i| !state.failed_item_indices.contains(i))
                })
        };
        let Some(target) = target else {
            warn!(%cue_id, "No playable item to navigate to");
            return;
        };

        let Some(mut state) = self.registry.currently_playing.remove(&cue_id) else {
            return;
        };
        state.release_tasks();

        // Retire the outgoing voice: crossfade tail when configured, hard
        // stop otherwise
        if let Some(mut voice) = state.voice.take() {
            let fade_out_ms = cue.effective_fade_out_ms(Some(current));
            if fade_out_ms > 0 && voice.is_playing() {
                voice.fade(voice.volume(), 0.0, Duration::from_millis(fade_out_ms));
                debug!(%cue_id, item = current, fade_out_ms, "Outgoing item parked as crossfade tail");
                self.registry.independent_voices.insert(voice.id(), voice);
            } else {
                self.registry.all_voices.remove(&voice.id());
                voice.stop();
                voice.unload();
            }
        }

        let fade_in_ms = cue.effective_fade_in_ms(Some(target));
        let crossfade = (fade_in_ms > 0).then_some(CrossfadeInfo {
            is_crossfade_in: true,
            duration_ms: fade_in_ms,
            target_volume: cue.volume,
        });

        info!(%cue_id, from = current, to = target, forward, "Playlist navigation");
        self.attach(
            &cue,
            Some(target),
            None,
            crossfade,
            Some(PlaylistCarry {
                order: state.playback_order,
                failed: state.failed_item_indices,
                preserved_for_navigation: true,
            }),
            true,
        );
    }

    /// Spawn an overlapping one-shot outside the authoritative slot
    pub(super) fn spawn_independent(&mut self, cue: &Cue) {
        let Some(path) = cue.source_path(None).cloned() else {
            return;
        };
        let voice_id = Uuid::new_v4();
        // Generation 0 is never assigned to authoritative voices; dispatch
        // for independents is by voice id, not generation
        let tx = VoiceEventTx::new(self.voice_tx.clone(), voice_id, cue.id, 0);
        let mut voice = self.factory.create(tx);
        voice.set_looping(false);
        voice.set_volume(cue.volume);
        voice.load(&path);

        debug!(cue_id = %cue.id, %voice_id, "Spawned independent overlap instance");
        self.registry.all_voices.insert(voice_id, cue.id);
        self.registry.independent_voices.insert(voice_id, voice);
    }

    /// Time/fade snapshot for one cue
    pub(super) fn build_time_update(&self, state: &PlaybackState) -> TimeUpdate {
        let current_secs = match state.status {
            PlaybackStatus::Paused { resume_at_secs } => resume_at_secs,
            _ => state.voice.as_ref().map(|v| v.position()).unwrap_or(0.0),
        };
        let duration_secs = state
            .known_duration_secs
            .or_else(|| state.voice.as_ref().and_then(|v| v.duration()));
        let remaining_secs = duration_secs.map(|d| (d - current_secs).max(0.0));

        let (is_fading_in, is_fading_out, fade_remaining_ms) = match state.status {
            PlaybackStatus::FadingIn { started_at, total, .. } => {
                (true, false, Some(fade::remaining_ms(started_at, total)))
            }
            PlaybackStatus::FadingOut { started_at, total } => {
                (false, true, Some(fade::remaining_ms(started_at, total)))
            }
            _ => (false, false, None),
        };

        TimeUpdate {
            current_secs,
            duration_secs,
            remaining_secs,
            is_fading_in,
            is_fading_out,
            fade_remaining_ms,
        }
    }

    /// Display name of the item active for a cue right now
    pub(super) fn active_item_name(&self, cue_id: &CueId) -> Option<String> {
        let cue = self.store.cue_by_id(cue_id)?;
        let item = self
            .registry
            .currently_playing
            .get(cue_id)
            .filter(|s| s.is_playlist)
            .map(|s| s.current_item_index);
        Some(cue.item_name(item).to_string())
    }

    /// Emit a playing-state notification (fire-and-forget)
    pub(super) fn emit_playing_state(&self, cue_id: CueId, is_playing: bool, item_name: Option<String>) {
        let _ = self.events.send(EngineEvent::PlayingStateChanged {
            cue_id,
            is_playing,
            item_name,
            timestamp: chrono::Utc::now(),
        });
    }
}
