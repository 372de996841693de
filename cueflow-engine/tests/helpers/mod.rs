//! Test helpers for playback engine integration tests
//!
//! Provides a scripted audio backend (`MockFactory`/`MockVoiceHandle`) so
//! tests can drive voice lifecycle events deterministically, plus small
//! utilities for settling the engine queue and draining the event bus.

pub mod mock_audio;

pub use mock_audio::{MockFactory, MockVoiceHandle};

use cueflow_common::EngineEvent;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

/// Install a tracing subscriber for test debugging (idempotent; enable with
/// RUST_LOG)
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Give the engine task time to drain both of its queues
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(30)).await;
}

/// Pull every event currently buffered on a subscription
pub fn drain_events(rx: &mut broadcast::Receiver<EngineEvent>) -> Vec<EngineEvent> {
    let mut events = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        events.push(ev);
    }
    events
}

/// Count PlayingStateChanged events matching the given playing flag
pub fn count_playing_changes(events: &[EngineEvent], is_playing: bool) -> usize {
    events
        .iter()
        .filter(|ev| matches!(ev, EngineEvent::PlayingStateChanged { is_playing: p, .. } if *p == is_playing))
        .count()
}
