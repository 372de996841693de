//! Playback coordination engine
//!
//! The engine owns the cue registry and processes everything that can
//! mutate it — operator commands, voice lifecycle events, trim timers,
//! broadcaster ticks — as messages on a single-consumer queue. One task
//! consumes the queue, so registry mutation is serialized by construction;
//! callbacks from superseded voices are detected by generation counter and
//! suppressed.
//!
//! Module layout mirrors the split of concerns:
//! - `core`: engine struct, message loop, spawn/shutdown
//! - `playback`: operator operations (toggle, stop-all, navigation)
//! - `lifecycle`: voice event handlers, cleanup tiers, playlist advance
//! - `ducking`: cross-cue volume arbitration
//! - `broadcaster`: per-cue time/fade reporting tasks
//! - `handle`: the public `EngineHandle` API

mod broadcaster;
mod core;
mod ducking;
mod handle;
mod lifecycle;
mod playback;

pub use self::core::spawn;
pub use handle::{EngineHandle, StopAllOptions};

use cueflow_common::{CueId, RetriggerBehavior, TimeUpdate};
use tokio::sync::oneshot;

/// Messages processed by the engine task
///
/// Operator operations and internal timer callbacks share one queue with
/// voice lifecycle events so that no two of them can interleave mid-mutation.
#[derive(Debug)]
pub(crate) enum EngineMsg {
    /// Operator trigger: play/pause/retrigger resolution for one cue
    Toggle {
        cue_id: CueId,
        force_pause: bool,
        retrigger_override: Option<RetriggerBehavior>,
    },
    /// Stop every playing cue (workspace switch, panic button)
    StopAll { use_fade: bool },
    /// Jump a playlist cue to its next playable item
    NavigateNext { cue_id: CueId },
    /// Jump a playlist cue to its previous playable item
    NavigatePrevious { cue_id: CueId },
    /// Snapshot a cue's time/fade progress
    GetTimes {
        cue_id: CueId,
        reply: oneshot::Sender<Option<TimeUpdate>>,
    },
    /// Broadcaster tick for one cue (generation-tagged)
    Tick { cue_id: CueId, generation: u64 },
    /// Trim enforcement timer fired (generation-tagged)
    TrimFired { cue_id: CueId, generation: u64 },
    /// Stop everything and exit the engine task
    Shutdown { reply: oneshot::Sender<()> },
}
