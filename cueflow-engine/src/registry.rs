//! Cue registry and per-cue playback state
//!
//! The registry is the single authoritative answer to "what is cue X doing
//! right now". It is owned exclusively by the engine task; all mutation
//! happens inside that task, so no locking is needed.
//!
//! Invariants:
//! - At most one playback state per cue is authoritative at any time. A
//!   voice whose generation differs from the stored state's generation is
//!   stale and must not mutate cue-visible state.
//! - "Is playing" is never read from a flag: it is derived by asking the
//!   authoritative voice.
//! - Every timer/task handle stored in a playback state is aborted before
//!   the state is removed or its voice replaced.

use crate::voice::{AudioVoice, VoiceId};
use cueflow_common::CueId;
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// Why a stop was initiated, selecting the cleanup tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopReason {
    /// No deliberate stop in progress
    #[default]
    None,
    /// Global stop-all: force-unload underlying resources immediately
    StopAll,
    /// Stopped by a retrigger with stop behavior
    RetriggerStop,
    /// Fading out to a stop
    FadeOutAndStop,
    /// A playlist item finished; traversal decides what happens next
    PlaylistItemEnd,
}

/// Play/fade axis of a cue's playback state
///
/// A tagged enum rather than independent booleans so invalid combinations
/// (fading in while paused, cued while fading out) cannot be represented.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlaybackStatus {
    /// Voice created, source still loading
    Loading,
    /// Ramping from silence to the target volume
    FadingIn {
        /// When the fade started
        started_at: Instant,
        /// Total fade duration
        total: Duration,
        /// Volume the fade lands on
        target_volume: f32,
    },
    /// Audible at steady volume
    Playing,
    /// Paused with a captured resume position
    Paused {
        /// Seek position to resume from, in seconds
        resume_at_secs: f64,
    },
    /// Ramping to silence; the stop reason on the state says why
    FadingOut {
        /// When the fade started
        started_at: Instant,
        /// Total fade duration
        total: Duration,
    },
    /// Playlist exhausted in stop-and-cue-next mode: not playing, but the
    /// next trigger resumes at this item instead of restarting
    Cued {
        /// Item index the next trigger will play
        next_index: usize,
    },
}

/// Crossfade entry parameters for an incoming voice
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrossfadeInfo {
    /// Incoming side of a crossfade (starts silent)
    pub is_crossfade_in: bool,
    /// Crossfade duration in milliseconds
    pub duration_ms: u64,
    /// Volume the incoming voice fades up to
    pub target_volume: f32,
}

/// Authoritative playback state for one cue
///
/// Owned by the registry; never cloned. The voice is exclusively owned here
/// until superseded.
pub struct PlaybackState {
    /// Current voice, if one exists
    pub voice: Option<Box<dyn AudioVoice>>,

    /// Generation the current voice was created under; events tagged with
    /// any other generation are stale
    pub generation: u64,

    /// Play/fade axis
    pub status: PlaybackStatus,

    /// Ducking axis (orthogonal to play/fade)
    pub is_ducked: bool,

    /// Volume to restore verbatim when ducking reverts (the operator may
    /// have adjusted volume while ducked)
    pub original_volume_before_duck: f32,

    /// Trigger cue currently ducking this cue
    pub active_ducking_trigger: Option<CueId>,

    /// Playlist traversal state
    pub is_playlist: bool,
    /// Index (into the cue's item list) of the active item
    pub current_item_index: usize,
    /// Precomputed traversal order (identity order unless shuffled)
    pub playback_order: Vec<usize>,
    /// Items whose voices failed to load; skipped by traversal
    pub failed_item_indices: HashSet<usize>,

    /// Crossfade entry parameters, consumed at load
    pub crossfade: Option<CrossfadeInfo>,

    /// Deliberate stop in progress, governing the cleanup tier
    pub stop_reason: StopReason,

    /// Keep this state across a load failure or item stop because a
    /// navigation is replacing the item
    pub preserved_for_navigation: bool,

    /// Seek position applied once the voice finishes loading (resume
    /// position, or the trim start)
    pub pending_seek_secs: Option<f64>,

    /// Time/fade broadcaster task handle
    pub time_task: Option<JoinHandle<()>>,

    /// Trim enforcement timer task handle
    pub trim_task: Option<JoinHandle<()>>,

    /// Media duration once discovered, in seconds
    pub known_duration_secs: Option<f64>,
}

impl PlaybackState {
    /// Fresh state for a newly attached voice
    pub fn new(generation: u64, is_playlist: bool, playback_order: Vec<usize>) -> Self {
        Self {
            voice: None,
            generation,
            status: PlaybackStatus::Loading,
            is_ducked: false,
            original_volume_before_duck: 1.0,
            active_ducking_trigger: None,
            is_playlist,
            current_item_index: 0,
            playback_order,
            failed_item_indices: HashSet::new(),
            crossfade: None,
            stop_reason: StopReason::None,
            preserved_for_navigation: false,
            pending_seek_secs: None,
            time_task: None,
            trim_task: None,
            known_duration_secs: None,
        }
    }

    /// Derived is-playing: asks the voice, never a flag
    pub fn is_audibly_playing(&self) -> bool {
        if matches!(self.status, PlaybackStatus::Paused { .. } | PlaybackStatus::Cued { .. }) {
            return false;
        }
        self.voice.as_ref().map(|v| v.is_playing()).unwrap_or(false)
    }

    /// Abort and release both scheduled-task handles
    ///
    /// Must run before the state is removed from the registry or before a
    /// new voice replaces the old one.
    pub fn release_tasks(&mut self) {
        if let Some(handle) = self.time_task.take() {
            handle.abort();
        }
        if let Some(handle) = self.trim_task.take() {
            handle.abort();
        }
    }
}

/// Process-wide playback bookkeeping, owned by the engine task
#[derive(Default)]
pub struct CueRegistry {
    /// Authoritative playback state per cue
    pub currently_playing: HashMap<CueId, PlaybackState>,

    /// Voices deliberately excluded from the single-authoritative-instance
    /// contract: overlapping one-shots and crossfade-out tails. Reachable
    /// only here (and by stop-all).
    pub independent_voices: HashMap<VoiceId, Box<dyn AudioVoice>>,

    /// Every live voice, registered at creation (before load completes) so
    /// a global stop-all can account for all of them
    pub all_voices: HashMap<VoiceId, CueId>,
}

impl CueRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an event generation matches the authoritative state for a cue
    pub fn is_authoritative(&self, cue_id: &CueId, generation: u64) -> bool {
        self.currently_playing
            .get(cue_id)
            .map(|s| s.generation == generation)
            .unwrap_or(false)
    }

    /// Remove a cue's state, releasing its task handles first
    pub fn remove(&mut self, cue_id: &CueId) -> Option<PlaybackState> {
        let mut state = self.currently_playing.remove(cue_id)?;
        state.release_tasks();
        if let Some(voice) = &state.voice {
            self.all_voices.remove(&voice.id());
        }
        Some(state)
    }

    /// Number of live voices (authoritative + independent)
    pub fn voice_count(&self) -> usize {
        self.all_voices.len()
    }
}
