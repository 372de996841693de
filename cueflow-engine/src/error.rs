//! Error types for cueflow-engine
//!
//! Defines engine-specific error types using thiserror for clear error
//! propagation.
//!
//! Stale lifecycle callbacks and ducking state desyncs are deliberately not
//! represented here: both are expected runtime conditions that the engine
//! suppresses or self-heals locally (logged, never propagated).

use cueflow_common::CueId;
use thiserror::Error;

/// Main error type for the playback engine
#[derive(Error, Debug)]
pub enum Error {
    /// Audio source failed to decode or open
    #[error("Audio load error: {0}")]
    Load(String),

    /// Device or codec rejected playback start
    #[error("Audio play error: {0}")]
    Play(String),

    /// Cue is not known to the cue store
    #[error("Cue not found: {0}")]
    CueNotFound(CueId),

    /// Operation is invalid for the cue's current playback state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Engine task is gone or a reply channel was dropped
    #[error("Engine channel error: {0}")]
    Channel(String),
}

/// Convenience Result type using the engine Error
pub type Result<T> = std::result::Result<T, Error>;
