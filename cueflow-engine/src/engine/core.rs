//! Core engine task - construction, message loop, shutdown

use super::handle::EngineHandle;
use super::EngineMsg;
use crate::config::EngineConfig;
use crate::registry::CueRegistry;
use crate::store::CueStore;
use crate::voice::{VoiceEvent, VoiceFactory};
use cueflow_common::events::{event_bus, EngineEvent};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, trace};

/// Playback coordination engine
///
/// Owns all registries; exists only inside its own task. Hosts interact
/// through [`EngineHandle`].
pub(super) struct Engine {
    /// Tunables
    pub(super) config: EngineConfig,

    /// Live cue configuration source (re-read on trim re-arm and ducking
    /// decisions)
    pub(super) store: Arc<dyn CueStore>,

    /// Voice factory (host-supplied audio backend)
    pub(super) factory: Arc<dyn VoiceFactory>,

    /// Outbound event bus (UI sinks, persistence listeners)
    pub(super) events: broadcast::Sender<EngineEvent>,

    /// Authoritative playback bookkeeping
    pub(super) registry: CueRegistry,

    /// Sender for internal timer tasks (ticks, trim fires)
    pub(super) msg_tx: mpsc::UnboundedSender<EngineMsg>,

    /// Sender cloned into every created voice
    pub(super) voice_tx: mpsc::UnboundedSender<VoiceEvent>,

    /// Monotonic generation counter; each attached voice gets the next value
    pub(super) generation_counter: u64,
}

/// Start the engine task and return its handle
pub fn spawn(
    config: EngineConfig,
    store: Arc<dyn CueStore>,
    factory: Arc<dyn VoiceFactory>,
) -> EngineHandle {
    let (msg_tx, msg_rx) = mpsc::unbounded_channel();
    let (voice_tx, voice_rx) = mpsc::unbounded_channel();
    let events = event_bus(config.event_bus_capacity);

    let engine = Engine {
        config,
        store,
        factory,
        events: events.clone(),
        registry: CueRegistry::new(),
        msg_tx: msg_tx.clone(),
        voice_tx,
        generation_counter: 0,
    };

    tokio::spawn(engine.run(msg_rx, voice_rx));
    info!("Playback engine started");

    EngineHandle::new(msg_tx, events)
}

impl Engine {
    /// Message loop: single consumer of all registry-mutating inputs
    async fn run(
        mut self,
        mut msg_rx: mpsc::UnboundedReceiver<EngineMsg>,
        mut voice_rx: mpsc::UnboundedReceiver<VoiceEvent>,
    ) {
        loop {
            tokio::select! {
                msg = msg_rx.recv() => {
                    match msg {
                        Some(msg) => {
                            if self.handle_msg(msg) {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                ev = voice_rx.recv() => {
                    match ev {
                        Some(ev) => self.handle_voice_event(ev),
                        None => break,
                    }
                }
            }
        }
        debug!("Engine task exited");
    }

    /// Dispatch one control message; returns true on shutdown
    fn handle_msg(&mut self, msg: EngineMsg) -> bool {
        match msg {
            EngineMsg::Toggle {
                cue_id,
                force_pause,
                retrigger_override,
            } => {
                self.toggle(cue_id, force_pause, retrigger_override);
                false
            }
            EngineMsg::StopAll { use_fade } => {
                self.stop_all(use_fade);
                false
            }
            EngineMsg::NavigateNext { cue_id } => {
                self.navigate(cue_id, true);
                false
            }
            EngineMsg::NavigatePrevious { cue_id } => {
                self.navigate(cue_id, false);
                false
            }
            EngineMsg::GetTimes { cue_id, reply } => {
                let snapshot = self
                    .registry
                    .currently_playing
                    .get(&cue_id)
                    .map(|state| self.build_time_update(state));
                let _ = reply.send(snapshot);
                false
            }
            EngineMsg::Tick { cue_id, generation } => {
                self.handle_tick(cue_id, generation);
                false
            }
            EngineMsg::TrimFired { cue_id, generation } => {
                if self.registry.is_authoritative(&cue_id, generation) {
                    self.run_trim_enforcement(cue_id);
                } else {
                    trace!(%cue_id, generation, "Trim fire from superseded voice ignored");
                }
                false
            }
            EngineMsg::Shutdown { reply } => {
                info!("Engine shutting down");
                self.stop_all(false);
                let _ = reply.send(());
                true
            }
        }
    }
}
