//! # CueFlow Shared Types (cueflow-common)
//!
//! Data model and event vocabulary shared between the playback engine and
//! its collaborators (UI processes, trigger transports, persistence).
//!
//! **Purpose:** Define cue configuration (`Cue`, `PlaylistItem`) and the
//! engine's outbound event stream (`EngineEvent`) so that consumers never
//! depend on engine internals.

pub mod cue;
pub mod events;

pub use cue::{Cue, CueId, CueKind, PlaylistItem, PlaylistPlayMode, RetriggerBehavior};
pub use events::{CueStatus, EngineEvent, TimeUpdate};
