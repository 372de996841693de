//! Public engine handle
//!
//! Cheap to clone; every operation is a message posted onto the engine
//! queue. Commands are fire-and-forget (ordering within one handle is the
//! queue order); queries await a oneshot reply.

use super::EngineMsg;
use crate::error::{Error, Result};
use cueflow_common::{CueId, EngineEvent, RetriggerBehavior, TimeUpdate};
use tokio::sync::{broadcast, mpsc, oneshot};

/// Options for a global stop
#[derive(Debug, Clone, Copy, Default)]
pub struct StopAllOptions {
    /// Fade audible cues out over their configured fade-out instead of
    /// cutting them immediately
    pub use_fade: bool,
}

/// Handle to a running playback engine
#[derive(Clone)]
pub struct EngineHandle {
    msg_tx: mpsc::UnboundedSender<EngineMsg>,
    events: broadcast::Sender<EngineEvent>,
}

impl EngineHandle {
    pub(super) fn new(
        msg_tx: mpsc::UnboundedSender<EngineMsg>,
        events: broadcast::Sender<EngineEvent>,
    ) -> Self {
        Self { msg_tx, events }
    }

    /// Operator trigger for one cue: starts it, or resolves the cue's
    /// retrigger behavior if it is already active
    pub fn toggle(&self, cue_id: CueId) -> Result<()> {
        self.toggle_with(cue_id, false, None)
    }

    /// Trigger with explicit pause/retrigger control
    ///
    /// `force_pause` pauses an active cue instead of applying its retrigger
    /// behavior; `retrigger_override` substitutes the cue's configured
    /// behavior for this one trigger.
    pub fn toggle_with(
        &self,
        cue_id: CueId,
        force_pause: bool,
        retrigger_override: Option<RetriggerBehavior>,
    ) -> Result<()> {
        self.send(EngineMsg::Toggle {
            cue_id,
            force_pause,
            retrigger_override,
        })
    }

    /// Pause an active cue, capturing its resume position
    pub fn pause(&self, cue_id: CueId) -> Result<()> {
        self.toggle_with(cue_id, true, None)
    }

    /// Stop every playing cue and every independent voice
    pub fn stop_all(&self, options: StopAllOptions) -> Result<()> {
        self.send(EngineMsg::StopAll {
            use_fade: options.use_fade,
        })
    }

    /// Jump a playing playlist cue to its next playable item
    pub fn playlist_navigate_next(&self, cue_id: CueId) -> Result<()> {
        self.send(EngineMsg::NavigateNext { cue_id })
    }

    /// Jump a playing playlist cue to its previous playable item
    pub fn playlist_navigate_previous(&self, cue_id: CueId) -> Result<()> {
        self.send(EngineMsg::NavigatePrevious { cue_id })
    }

    /// Snapshot a cue's time/fade progress; `None` if the cue has no
    /// playback state
    pub async fn playback_times(&self, cue_id: CueId) -> Result<Option<TimeUpdate>> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineMsg::GetTimes { cue_id, reply })?;
        rx.await
            .map_err(|_| Error::Channel("engine dropped the reply".to_string()))
    }

    /// Subscribe to the engine's event stream
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Stop all playback and shut the engine task down; resolves once the
    /// task has drained
    pub async fn shutdown(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineMsg::Shutdown { reply })?;
        rx.await
            .map_err(|_| Error::Channel("engine dropped the reply".to_string()))
    }

    fn send(&self, msg: EngineMsg) -> Result<()> {
        self.msg_tx
            .send(msg)
            .map_err(|_| Error::Channel("engine task is not running".to_string()))
    }
}
