//! Audio voice port
//!
//! `AudioVoice` is one playable instance of one audio source. The engine
//! consumes this trait but never implements it: decoding and device output
//! belong to the host. Voices report lifecycle transitions asynchronously by
//! sending tagged `VoiceEvent`s into the engine's event queue.
//!
//! Within one voice, lifecycle events fire in a fixed relative order
//! (load -> play -> {pause/play}* -> end|stop), but events from different
//! voices interleave arbitrarily. Every event carries the generation the
//! voice was created under so the engine can detect callbacks from
//! superseded instances.

use cueflow_common::CueId;
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Voice identifier
pub type VoiceId = Uuid;

/// Load progress of a voice's audio source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// No source attached yet, or source was unloaded
    Unloaded,
    /// Source is being opened/decoded
    Loading,
    /// Source is ready for playback
    Loaded,
}

/// Lifecycle event payloads emitted by a voice
#[derive(Debug, Clone)]
pub enum VoiceEventKind {
    /// Source finished loading; duration is now known
    Loaded,
    /// Playback actually started (after `play()`)
    Played,
    /// Playback paused
    Paused,
    /// Natural end of media
    Ended,
    /// Deliberate stop completed
    Stopped,
    /// Fade progress tick with the voice's current volume
    FadeTick {
        /// Volume at this tick, 0.0-1.0
        volume: f32,
    },
    /// Source failed to open or decode
    LoadError {
        /// Decoder/backend message
        message: String,
    },
    /// Playback start was rejected
    PlayError {
        /// Device/backend message
        message: String,
    },
}

/// A lifecycle event tagged with the emitting voice's identity
#[derive(Debug, Clone)]
pub struct VoiceEvent {
    /// Voice that emitted the event
    pub voice_id: VoiceId,
    /// Cue the voice was created for
    pub cue_id: CueId,
    /// Generation the voice was created under; mismatch against the
    /// registry's current generation marks the event as stale
    pub generation: u64,
    /// Event payload
    pub kind: VoiceEventKind,
}

/// Pre-tagged sender handed to each voice at creation
///
/// Wraps the engine's voice-event channel so the voice only ever supplies
/// the event kind; identity tagging cannot be forged or forgotten. Send
/// errors are ignored: a shut-down engine simply no longer listens.
#[derive(Debug, Clone)]
pub struct VoiceEventTx {
    tx: mpsc::UnboundedSender<VoiceEvent>,
    voice_id: VoiceId,
    cue_id: CueId,
    generation: u64,
}

impl VoiceEventTx {
    /// Create a tagged sender for one voice
    pub fn new(
        tx: mpsc::UnboundedSender<VoiceEvent>,
        voice_id: VoiceId,
        cue_id: CueId,
        generation: u64,
    ) -> Self {
        Self {
            tx,
            voice_id,
            cue_id,
            generation,
        }
    }

    /// Emit a lifecycle event
    pub fn send(&self, kind: VoiceEventKind) {
        let _ = self.tx.send(VoiceEvent {
            voice_id: self.voice_id,
            cue_id: self.cue_id,
            generation: self.generation,
            kind,
        });
    }

    /// Voice identity this sender tags events with
    pub fn voice_id(&self) -> VoiceId {
        self.voice_id
    }
}

/// One playable instance of one audio source
///
/// Methods are synchronous commands; completion is reported via events. A
/// voice is exclusively owned by the playback state that created it until
/// superseded; supersession always stops the superseded voice.
pub trait AudioVoice: Send {
    /// Voice identity (matches the `VoiceEventTx` tag)
    fn id(&self) -> VoiceId;

    /// Begin loading the audio source; emits `Loaded` or `LoadError`
    fn load(&mut self, source: &Path);

    /// Start or resume playback; emits `Played` or `PlayError`
    fn play(&mut self);

    /// Pause playback; emits `Paused`
    fn pause(&mut self);

    /// Stop playback; emits `Stopped`
    fn stop(&mut self);

    /// Release the underlying decoder/device resources immediately
    fn unload(&mut self);

    /// Seek to a position in seconds; returns the applied position
    fn seek(&mut self, secs: f64) -> f64;

    /// Current playback position in seconds
    fn position(&self) -> f64;

    /// Current volume, 0.0-1.0
    fn volume(&self) -> f32;

    /// Set volume immediately (bypasses any running fade)
    fn set_volume(&mut self, volume: f32);

    /// Ramp volume from `from` to `to` over `duration`; emits `FadeTick`
    /// events while ramping
    fn fade(&mut self, from: f32, to: f32, duration: Duration);

    /// Whether the voice is currently rendering audio
    fn is_playing(&self) -> bool;

    /// Media duration in seconds, once known
    fn duration(&self) -> Option<f64>;

    /// Load progress
    fn load_state(&self) -> LoadState;

    /// Enable voice-internal whole-file looping
    ///
    /// Only used when the cue has no trim boundaries; trimmed loops are
    /// driven by the engine's trim enforcement instead.
    fn set_looping(&mut self, looping: bool);
}

/// Factory through which the engine obtains voices
pub trait VoiceFactory: Send + Sync {
    /// Create a fresh voice wired to the given event sender
    fn create(&self, events: VoiceEventTx) -> Box<dyn AudioVoice>;
}
