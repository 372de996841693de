//! Voice lifecycle handling - load/play/end/stop/fade/errors
//!
//! Every handler runs inside the engine task after the dispatcher has
//! verified the event's generation against the authoritative state for its
//! cue. Events from superseded voices never reach these handlers: they are
//! suppressed at dispatch (a stale callback is expected traffic, not an
//! error). Events for cues with no state at all are treated as normal late
//! arrivals and dropped.

use super::core::Engine;
use super::playback::PlaylistCarry;
use super::EngineMsg;
use crate::fade;
use crate::registry::{PlaybackStatus, StopReason};
use crate::traversal;
use crate::trim::{compute_next_enforcement, voice_handles_looping, TrimAction};
use crate::voice::{VoiceEvent, VoiceEventKind};
use cueflow_common::{Cue, CueId, CueStatus, EngineEvent, PlaylistPlayMode};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

impl Engine {
    /// Dispatch one voice lifecycle event
    pub(super) fn handle_voice_event(&mut self, ev: VoiceEvent) {
        if self.registry.independent_voices.contains_key(&ev.voice_id) {
            self.on_independent_event(ev);
            return;
        }

        match self.registry.currently_playing.get(&ev.cue_id) {
            None => {
                trace!(cue_id = %ev.cue_id, voice_id = %ev.voice_id, kind = ?ev.kind,
                    "Event for cue with no playback state dropped");
            }
            Some(state) if state.generation != ev.generation => {
                trace!(cue_id = %ev.cue_id, stale = ev.generation, current = state.generation,
                    kind = ?ev.kind, "Stale callback suppressed");
            }
            Some(_) => match ev.kind {
                VoiceEventKind::Loaded => self.on_load(ev.cue_id),
                VoiceEventKind::Played => self.on_play(ev.cue_id),
                VoiceEventKind::Paused => {}
                VoiceEventKind::Ended => self.on_end(ev.cue_id),
                VoiceEventKind::Stopped => self.on_stop(ev.cue_id),
                VoiceEventKind::FadeTick { volume } => self.on_fade(ev.cue_id, volume),
                VoiceEventKind::LoadError { message } => self.on_load_error(ev.cue_id, message),
                VoiceEventKind::PlayError { message } => self.on_play_error(ev.cue_id, message),
            },
        }
    }

    /// Source finished loading: apply start offset and fade-in, then play
    fn on_load(&mut self, cue_id: CueId) {
        let Some(cue) = self.store.cue_by_id(&cue_id) else {
            // Cue deleted while its voice was loading
            self.stop_cue(cue_id, StopReason::None);
            return;
        };

        let mut discovered: Option<(Option<usize>, f64)> = None;
        {
            let Some(state) = self.registry.currently_playing.get_mut(&cue_id) else {
                return;
            };
            let item = state.is_playlist.then_some(state.current_item_index);
            let Some(voice) = state.voice.as_mut() else {
                return;
            };

            if let Some(duration_secs) = voice.duration() {
                state.known_duration_secs = Some(duration_secs);
                discovered = Some((item, duration_secs));
            }

            // Effective start offset: resume position if resuming, else the
            // trim start (both staged at attach time)
            if let Some(seek_secs) = state.pending_seek_secs.take() {
                voice.seek(seek_secs);
            }

            // Crossfade entry wins over the configured fade-in
            let ramp = if let Some(cf) = state.crossfade.take() {
                Some((cf.target_volume, cf.duration_ms))
            } else {
                let fade_in_ms = cue.effective_fade_in_ms(item);
                (fade_in_ms > 0).then_some((cue.volume, fade_in_ms))
            };
            if let Some((target_volume, duration_ms)) = ramp {
                let total = Duration::from_millis(duration_ms);
                voice.set_volume(0.0);
                voice.fade(0.0, target_volume, total);
                state.status = PlaybackStatus::FadingIn {
                    started_at: Instant::now(),
                    total,
                    target_volume,
                };
            }

            // The fade alone must never be relied upon to start playback: a
            // voice that never played must be explicitly played
            voice.play();
        }

        if let Some((item_index, duration_secs)) = discovered {
            let _ = self.events.send(EngineEvent::DurationDiscovered {
                cue_id,
                item_index,
                duration_secs,
                timestamp: chrono::Utc::now(),
            });
        }
    }

    /// Playback actually started: adopt, duck, broadcast, enforce trim
    fn on_play(&mut self, cue_id: CueId) {
        let Some(cue) = self.store.cue_by_id(&cue_id) else {
            self.stop_cue(cue_id, StopReason::None);
            return;
        };

        {
            let Some(state) = self.registry.currently_playing.get_mut(&cue_id) else {
                return;
            };
            // A deliberate stop is in flight (fade-out, retrigger): this play
            // must not resurrect the instance
            if state.stop_reason != StopReason::None {
                debug!(%cue_id, reason = ?state.stop_reason, "Play during deliberate stop suppressed");
                if let Some(voice) = state.voice.as_mut() {
                    voice.stop();
                }
                return;
            }
            if !matches!(state.status, PlaybackStatus::FadingIn { .. }) {
                state.status = PlaybackStatus::Playing;
            }
        }

        if cue.is_ducking_trigger {
            self.duck_other_cues(&cue);
        }
        if cue.enable_ducking {
            self.duck_self_on_play(&cue);
        }

        self.start_broadcaster(cue_id);

        // One immediate time update ahead of the first broadcaster tick
        if let Some(state) = self.registry.currently_playing.get(&cue_id) {
            let update = self.build_time_update(state);
            let _ = self.events.send(EngineEvent::TimeUpdate { cue_id, update });
        }

        self.run_trim_enforcement(cue_id);

        let item_name = self.active_item_name(&cue_id);
        self.emit_playing_state(cue_id, true, item_name);
    }

    /// Natural end of media
    fn on_end(&mut self, cue_id: CueId) {
        let Some(cue) = self.store.cue_by_id(&cue_id) else {
            self.stop_cue(cue_id, StopReason::None);
            return;
        };

        if cue.is_playlist() {
            self.playlist_item_complete(&cue);
            return;
        }

        let (trim_start, trim_end, loop_enabled) = cue.effective_trim(None);
        if loop_enabled && voice_handles_looping(trim_start, trim_end) {
            // The voice's own loop restarts playback; manually re-invoking
            // play here would stack a second audible instance
            trace!(%cue_id, "Voice-internal loop wrap");
            return;
        }

        let item_name = self.active_item_name(&cue_id);
        let preserved = self
            .registry
            .currently_playing
            .get(&cue_id)
            .map(|s| s.preserved_for_navigation)
            .unwrap_or(false);

        if cue.is_ducking_trigger {
            self.revert_ducking_for_trigger(cue_id);
        }

        if preserved {
            if let Some(state) = self.registry.currently_playing.get_mut(&cue_id) {
                state.release_tasks();
            }
        } else if let Some(mut state) = self.registry.remove(&cue_id) {
            if let Some(mut voice) = state.voice.take() {
                voice.unload();
            }
        }

        debug!(%cue_id, "Natural end");
        self.emit_playing_state(cue_id, false, item_name);
    }

    /// Voice-confirmed deliberate stop
    ///
    /// Engine-initiated stops clean up synchronously at initiation, so most
    /// stop confirmations arrive stale and never reach here. Reaching here
    /// with a matching generation means the voice stopped on its own; run
    /// the cleanup tier for whatever reason is recorded.
    fn on_stop(&mut self, cue_id: CueId) {
        let reason = self
            .registry
            .currently_playing
            .get(&cue_id)
            .map(|s| s.stop_reason)
            .unwrap_or(StopReason::None);
        if reason == StopReason::PlaylistItemEnd {
            // Item handoff owns this stop
            return;
        }
        self.stop_cue(cue_id, reason);
    }

    /// Fade progress tick from the voice
    ///
    /// Two independent concerns: a fade-out that reached silence completes
    /// its deliberate stop (carrying the recorded reason so the cleanup tier
    /// stays correct), and a fade-in that reached its target drops the fade
    /// indicator with one final update.
    fn on_fade(&mut self, cue_id: CueId, volume: f32) {
        let epsilon = self.config.fade_epsilon;
        let Some(state) = self.registry.currently_playing.get_mut(&cue_id) else {
            return;
        };

        match state.status {
            PlaybackStatus::FadingOut { started_at, total } => {
                if volume <= epsilon || started_at.elapsed() >= total {
                    let reason = state.stop_reason;
                    self.stop_cue(cue_id, reason);
                }
            }
            PlaybackStatus::FadingIn {
                started_at,
                total,
                target_volume,
            } => {
                if fade::is_complete(volume, target_volume, epsilon, started_at, total) {
                    state.status = PlaybackStatus::Playing;
                    if let Some(state) = self.registry.currently_playing.get(&cue_id) {
                        let update = self.build_time_update(state);
                        let _ = self.events.send(EngineEvent::TimeUpdate { cue_id, update });
                    }
                }
            }
            _ => {}
        }
    }

    /// Source failed to open or decode
    ///
    /// Terminal for this voice attempt, never retried automatically. Single
    /// cues purge their state (unless preserved for navigation); playlist
    /// cues record the failed index and let traversal skip it.
    fn on_load_error(&mut self, cue_id: CueId, message: String) {
        warn!(%cue_id, %message, "Audio load error");

        let cue = self.store.cue_by_id(&cue_id);
        let item = self
            .registry
            .currently_playing
            .get(&cue_id)
            .filter(|s| s.is_playlist)
            .map(|s| s.current_item_index);
        let hint = cue
            .as_ref()
            .and_then(|c| c.source_path(item))
            .map(|p| codec_hint(p))
            .unwrap_or_else(|| message.clone());

        let _ = self.events.send(EngineEvent::CueStatus {
            cue_id,
            status: CueStatus::AudioLoadError,
            details: Some(hint),
            timestamp: chrono::Utc::now(),
        });

        let Some(state) = self.registry.currently_playing.get_mut(&cue_id) else {
            return;
        };

        if state.is_playlist {
            let failed_index = state.current_item_index;
            state.failed_item_indices.insert(failed_index);
            if let Some(mut voice) = state.voice.take() {
                self.registry.all_voices.remove(&voice.id());
                voice.unload();
            }
            if let Some(cue) = cue {
                debug!(%cue_id, failed_index, "Playlist item failed, advancing");
                self.playlist_item_complete(&cue);
            }
        } else if state.preserved_for_navigation {
            state.release_tasks();
            if let Some(mut voice) = state.voice.take() {
                self.registry.all_voices.remove(&voice.id());
                voice.unload();
            }
        } else if let Some(mut state) = self.registry.remove(&cue_id) {
            if let Some(mut voice) = state.voice.take() {
                voice.unload();
            }
        }
    }

    /// Device or codec rejected playback start: purge and report
    fn on_play_error(&mut self, cue_id: CueId, message: String) {
        warn!(%cue_id, %message, "Audio play error");

        let _ = self.events.send(EngineEvent::CueStatus {
            cue_id,
            status: CueStatus::AudioPlayError,
            details: Some(message),
            timestamp: chrono::Utc::now(),
        });

        if let Some(mut state) = self.registry.remove(&cue_id) {
            if let Some(mut voice) = state.voice.take() {
                voice.stop();
                voice.unload();
            }
        }
        self.emit_playing_state(cue_id, false, None);
    }

    /// Trim region enforcement: (re)arm or act
    ///
    /// Reads the cue definition fresh on every run so live trim edits take
    /// effect, and recomputes from the voice's actual position so a fire
    /// after an edit that extended the region simply re-arms.
    pub(super) fn run_trim_enforcement(&mut self, cue_id: CueId) {
        let Some(cue) = self.store.cue_by_id(&cue_id) else {
            return;
        };

        let (action, trim_start, trim_end, loop_enabled, generation) = {
            let Some(state) = self.registry.currently_playing.get_mut(&cue_id) else {
                return;
            };
            if let Some(handle) = state.trim_task.take() {
                handle.abort();
            }
            let item = state.is_playlist.then_some(state.current_item_index);
            let (trim_start, trim_end, loop_enabled) = cue.effective_trim(item);
            let Some(voice) = state.voice.as_ref() else {
                return;
            };
            let action =
                compute_next_enforcement(trim_start, trim_end, loop_enabled, voice.position());
            (action, trim_start, trim_end, loop_enabled, state.generation)
        };

        match action {
            TrimAction::Disabled => {}
            TrimAction::Schedule { delay } => {
                self.arm_trim_timer(cue_id, generation, delay);
            }
            TrimAction::LoopNow => {
                // Trim-confined loop: back to the region start, keep playing,
                // re-arm one full cycle
                let next = {
                    let Some(state) = self.registry.currently_playing.get_mut(&cue_id) else {
                        return;
                    };
                    let Some(voice) = state.voice.as_mut() else {
                        return;
                    };
                    voice.seek(trim_start);
                    if !voice.is_playing() {
                        voice.play();
                    }
                    compute_next_enforcement(trim_start, trim_end, loop_enabled, voice.position())
                };
                trace!(%cue_id, trim_start, "Trim loop wrap");
                if let TrimAction::Schedule { delay } = next {
                    self.arm_trim_timer(cue_id, generation, delay);
                }
            }
            TrimAction::StopNow => {
                debug!(%cue_id, ?trim_end, "Trim end reached");
                if cue.is_playlist() {
                    // A trimmed item ending is an item completion, not a cue
                    // stop: traversal decides what plays next
                    self.playlist_item_complete(&cue);
                } else {
                    self.stop_cue(cue_id, StopReason::None);
                }
            }
        }
    }

    /// Arm the single-shot trim timer for one enforcement cycle
    fn arm_trim_timer(&mut self, cue_id: CueId, generation: u64, delay: Duration) {
        let tx = self.msg_tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(EngineMsg::TrimFired { cue_id, generation });
        });
        if let Some(state) = self.registry.currently_playing.get_mut(&cue_id) {
            state.trim_task = Some(handle);
        } else {
            handle.abort();
        }
    }

    /// A playlist item finished (natural end or failed load): decide the
    /// continuation per play mode
    pub(super) fn playlist_item_complete(&mut self, cue: &Cue) {
        let cue_id = cue.id;
        let (current, order, failed) = {
            let Some(state) = self.registry.currently_playing.get(&cue_id) else {
                return;
            };
            (
                state.current_item_index,
                state.playback_order.clone(),
                state.failed_item_indices.clone(),
            )
        };

        match cue.playlist_play_mode {
            PlaylistPlayMode::RepeatOne => {
                // Replay the current item, unless it is the item that failed
                let target = if failed.contains(&current) {
                    traversal::first_playable_item(&order, &failed)
                } else {
                    Some(current)
                };
                match target {
                    Some(index) => self.advance_to_item(cue, index),
                    None => self.stop_cue(cue_id, StopReason::None),
                }
            }
            PlaylistPlayMode::StopAndCueNext => {
                let next = traversal::find_next_playable_item(&order, &failed, current)
                    .or_else(|| traversal::first_playable_item(&order, &failed));
                self.cue_next_item(cue, next);
            }
            PlaylistPlayMode::Continue => {
                let next = traversal::find_next_playable_item(&order, &failed, current)
                    // Exhausted: wrap to the first playable item
                    .or_else(|| traversal::first_playable_item(&order, &failed));
                match next {
                    Some(index) => self.advance_to_item(cue, index),
                    None => self.stop_cue(cue_id, StopReason::None),
                }
            }
            PlaylistPlayMode::Shuffle => {
                match traversal::find_next_playable_item(&order, &failed, current) {
                    Some(index) => self.advance_to_item(cue, index),
                    None => self.stop_cue(cue_id, StopReason::None),
                }
            }
        }
    }

    /// Hand off to the next playlist item (tier-3 cleanup of the outgoing
    /// item's voice, then attach the next)
    fn advance_to_item(&mut self, cue: &Cue, target: usize) {
        let carry = {
            let Some(state) = self.registry.currently_playing.get(&cue.id) else {
                return;
            };
            PlaylistCarry {
                order: state.playback_order.clone(),
                failed: state.failed_item_indices.clone(),
                preserved_for_navigation: false,
            }
        };

        let fade_in_ms = cue.effective_fade_in_ms(Some(target));
        let crossfade = (fade_in_ms > 0).then_some(crate::registry::CrossfadeInfo {
            is_crossfade_in: true,
            duration_ms: fade_in_ms,
            target_volume: cue.volume,
        });

        debug!(cue_id = %cue.id, target, "Advancing playlist");
        self.attach(cue, Some(target), None, crossfade, Some(carry), true);
    }

    /// Stop-and-cue-next: stop the item but keep the state visible as
    /// "cued", so the next trigger resumes instead of restarting
    fn cue_next_item(&mut self, cue: &Cue, next: Option<usize>) {
        let cue_id = cue.id;
        let item_name = self.active_item_name(&cue_id);

        let cued = {
            let Some(state) = self.registry.currently_playing.get_mut(&cue_id) else {
                return;
            };
            state.release_tasks();
            // The voice's own stop confirmation arrives with a matching
            // generation; the recorded reason tells on_stop the handoff owns
            // this stop, so the cued state survives
            state.stop_reason = StopReason::PlaylistItemEnd;
            if let Some(mut voice) = state.voice.take() {
                self.registry.all_voices.remove(&voice.id());
                voice.stop();
                voice.unload();
            }
            match next {
                Some(next_index) => {
                    state.status = PlaybackStatus::Cued { next_index };
                    true
                }
                None => false,
            }
        };

        if !cued {
            self.registry.remove(&cue_id);
        }
        self.emit_playing_state(cue_id, false, item_name);

        if let Some(next_index) = next {
            let next_name = cue.item_name(Some(next_index)).to_string();
            debug!(%cue_id, next_index, "Playlist cued");
            let _ = self.events.send(EngineEvent::CueStatus {
                cue_id,
                status: CueStatus::CuedNext,
                details: Some(next_name),
                timestamp: chrono::Utc::now(),
            });
        }
    }

    /// Events from voices outside the authoritative slot (overlapping
    /// one-shots and crossfade-out tails)
    fn on_independent_event(&mut self, ev: VoiceEvent) {
        match ev.kind {
            VoiceEventKind::Loaded => {
                if let Some(voice) = self.registry.independent_voices.get_mut(&ev.voice_id) {
                    voice.play();
                }
            }
            VoiceEventKind::FadeTick { volume } => {
                // Crossfade tails retire themselves at silence
                if volume <= self.config.fade_epsilon {
                    self.retire_independent(ev.voice_id);
                }
            }
            VoiceEventKind::Ended
            | VoiceEventKind::Stopped
            | VoiceEventKind::LoadError { .. }
            | VoiceEventKind::PlayError { .. } => {
                self.retire_independent(ev.voice_id);
            }
            VoiceEventKind::Played | VoiceEventKind::Paused => {}
        }
    }

    fn retire_independent(&mut self, voice_id: crate::voice::VoiceId) {
        if let Some(mut voice) = self.registry.independent_voices.remove(&voice_id) {
            voice.stop();
            voice.unload();
        }
        self.registry.all_voices.remove(&voice_id);
    }
}

/// Filetype-specific hint for load failures
fn codec_hint(path: &Path) -> String {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("m4a") | Some("aac") | Some("mp4") => {
            "AAC/M4A decode failed; the file may use an unsupported profile or DRM".to_string()
        }
        Some("wma") => "WMA is not a supported format; convert to WAV or FLAC".to_string(),
        Some("opus") | Some("ogg") => {
            "Ogg/Opus decode failed; the file may be corrupt or use an unsupported codec".to_string()
        }
        Some("wav") | Some("aiff") | Some("aif") => {
            "PCM decode failed; the file may be truncated or use a non-PCM codec in a WAV container"
                .to_string()
        }
        Some(other) => format!(".{other} could not be decoded; try WAV, FLAC, MP3 or OGG"),
        None => "File has no extension and could not be decoded".to_string(),
    }
}
