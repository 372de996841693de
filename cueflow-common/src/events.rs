//! Engine event stream
//!
//! Outbound notifications from the playback engine to UI sinks and other
//! collaborators. All notifications are fire-and-forget: the engine never
//! waits for acknowledgement, and a sink that lags or disconnects is not an
//! error.

use crate::cue::CueId;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Time and fade progress snapshot for one cue
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeUpdate {
    /// Current playback position in seconds
    pub current_secs: f64,
    /// Media duration in seconds (None until discovered)
    pub duration_secs: Option<f64>,
    /// Remaining time in seconds (None until duration discovered)
    pub remaining_secs: Option<f64>,
    /// A fade-in is in progress
    pub is_fading_in: bool,
    /// A fade-out is in progress
    pub is_fading_out: bool,
    /// Remaining fade time in milliseconds, if fading
    pub fade_remaining_ms: Option<u64>,
}

/// Structured status attached to `EngineEvent::CueStatus`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CueStatus {
    /// Source failed to decode or open; not retried automatically
    AudioLoadError,
    /// Device or codec rejected playback start
    AudioPlayError,
    /// Playlist exhausted with the next item cued for the following trigger
    CuedNext,
}

/// Events broadcast by the playback engine
///
/// Serializable for one-way IPC transports (the engine itself owns no wire
/// protocol). Timestamps are attached at emission time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EngineEvent {
    /// A cue started or stopped being audible
    ///
    /// Triggers:
    /// - UI: toggle the cue button's playing indicator
    /// - UI: show/clear the active item name for playlist cues
    PlayingStateChanged {
        /// Cue that changed
        cue_id: CueId,
        /// Whether the cue is now playing
        is_playing: bool,
        /// Name of the item active at the time of the change
        item_name: Option<String>,
        /// When the change happened
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Periodic time/fade progress report (~100ms while playing)
    ///
    /// Triggers:
    /// - UI: update elapsed/remaining display and fade countdown
    TimeUpdate {
        /// Cue being reported
        cue_id: CueId,
        /// Snapshot payload
        update: TimeUpdate,
    },

    /// Media duration discovered after load
    ///
    /// Triggers:
    /// - Persistence: record duration against the cue or playlist item
    /// - UI: size the progress display
    DurationDiscovered {
        /// Cue whose media was measured
        cue_id: CueId,
        /// Playlist item index the duration belongs to (None for singles)
        item_index: Option<usize>,
        /// Measured duration in seconds
        duration_secs: f64,
        /// When the duration was discovered
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Structured cue status (errors, cued-next)
    ///
    /// Triggers:
    /// - UI: surface a toast/modal (the engine never owns presentation)
    CueStatus {
        /// Cue the status applies to
        cue_id: CueId,
        /// Status discriminant
        status: CueStatus,
        /// Human-oriented detail (e.g. codec hint for load failures)
        details: Option<String>,
        /// When the status was raised
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl EngineEvent {
    /// Cue this event concerns
    pub fn cue_id(&self) -> CueId {
        match self {
            EngineEvent::PlayingStateChanged { cue_id, .. }
            | EngineEvent::TimeUpdate { cue_id, .. }
            | EngineEvent::DurationDiscovered { cue_id, .. }
            | EngineEvent::CueStatus { cue_id, .. } => *cue_id,
        }
    }
}

/// Create an engine event bus
///
/// Buffers up to `capacity` events; slow subscribers observe `Lagged` and
/// resubscribe, which is acceptable for purely informational streams.
pub fn event_bus(capacity: usize) -> broadcast::Sender<EngineEvent> {
    let (tx, _) = broadcast::channel(capacity);
    tx
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_event_serialization_tagged() {
        let event = EngineEvent::PlayingStateChanged {
            cue_id: Uuid::new_v4(),
            is_playing: true,
            item_name: Some("Opener".into()),
            timestamp: chrono::Utc::now(),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"PlayingStateChanged\""));

        let back: EngineEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.cue_id(), event.cue_id());
    }

    #[tokio::test]
    async fn test_event_bus_delivery() {
        let bus = event_bus(16);
        let mut rx = bus.subscribe();

        let cue_id = Uuid::new_v4();
        bus.send(EngineEvent::CueStatus {
            cue_id,
            status: CueStatus::AudioLoadError,
            details: None,
            timestamp: chrono::Utc::now(),
        })
        .unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.cue_id(), cue_id);
    }

    #[test]
    fn test_send_without_subscribers_is_ok() {
        let bus = event_bus(4);
        // No receivers: fire-and-forget, error ignored by convention
        let _ = bus.send(EngineEvent::TimeUpdate {
            cue_id: Uuid::new_v4(),
            update: TimeUpdate {
                current_secs: 1.0,
                duration_secs: Some(10.0),
                remaining_secs: Some(9.0),
                is_fading_in: false,
                is_fading_out: false,
                fade_remaining_ms: None,
            },
        });
    }
}
