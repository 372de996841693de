//! Playback coordination engine for a live cue player
//!
//! Coordinates the lifecycle of audio voices for triggered cues: the
//! per-cue state machine, retrigger resolution, fades and crossfades,
//! cross-cue ducking, trim-region enforcement, and playlist traversal.
//! Audio decoding and device output are behind the [`voice::AudioVoice`]
//! port; cue configuration is behind [`store::CueStore`]; hosts drive the
//! engine through [`engine::EngineHandle`] and observe it on a broadcast
//! event bus.
//!
//! All registry-mutating inputs - operator commands, voice callbacks, trim
//! timers, broadcaster ticks - are funneled through one queue consumed by a
//! single task, and every voice carries a generation counter so callbacks
//! from superseded voices are detected and suppressed.

pub mod config;
pub mod ducking;
pub mod engine;
pub mod error;
pub mod fade;
pub mod registry;
pub mod store;
pub mod traversal;
pub mod trim;
pub mod voice;

pub use config::EngineConfig;
pub use engine::{spawn, EngineHandle, StopAllOptions};
pub use error::{Error, Result};
pub use store::{CueStore, InMemoryCueStore};
pub use voice::{
    AudioVoice, LoadState, VoiceEvent, VoiceEventKind, VoiceEventTx, VoiceFactory, VoiceId,
};
