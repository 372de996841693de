//! Retrigger resolution and stale-callback suppression
//!
//! Covers the single-authoritative-instance contract: a retrigger restart
//! supersedes the old voice synchronously, and every late event the old
//! voice queued is dropped by its generation tag.

mod helpers;

use cueflow_common::{Cue, RetriggerBehavior};
use cueflow_engine::{spawn, EngineConfig, EngineHandle, InMemoryCueStore};
use helpers::{count_playing_changes, drain_events, init_tracing, settle, MockFactory};
use std::sync::Arc;
use uuid::Uuid;

fn setup() -> (Arc<InMemoryCueStore>, Arc<MockFactory>, EngineHandle) {
    init_tracing();
    let store = Arc::new(InMemoryCueStore::new());
    let factory = MockFactory::new();
    let handle = spawn(EngineConfig::default(), store.clone(), factory.clone());
    (store, factory, handle)
}

#[tokio::test]
async fn test_toggle_starts_playback() {
    let (store, factory, handle) = setup();
    let id = Uuid::new_v4();
    store.upsert(Cue::single(id, "sting", "/audio/sting.wav"));
    let mut events = handle.subscribe();

    handle.toggle(id).unwrap();
    settle().await;

    assert_eq!(factory.voice_count(), 1);
    let voice = factory.voice(0);
    assert!(voice.was_called("load:/audio/sting.wav"));
    assert!(voice.is_playing());

    let collected = drain_events(&mut events);
    assert_eq!(count_playing_changes(&collected, true), 1);

    let times = handle.playback_times(id).await.unwrap().unwrap();
    assert_eq!(times.duration_secs, Some(30.0));
    assert!(!times.is_fading_in);
}

#[tokio::test]
async fn test_retrigger_restart_supersedes_old_voice() {
    let (store, factory, handle) = setup();
    let id = Uuid::new_v4();
    store.upsert(Cue::single(id, "sting", "/audio/sting.wav"));
    let mut events = handle.subscribe();

    handle.toggle(id).unwrap();
    settle().await;
    handle.toggle(id).unwrap();
    settle().await;

    assert_eq!(factory.voice_count(), 2);
    let old = factory.voice(0);
    let new = factory.voice(1);
    assert!(old.was_called("stop"));
    assert!(!old.is_playing());
    assert!(new.is_playing());

    // The restart is seamless from the outside: two starts, no stop
    // notification in between
    let collected = drain_events(&mut events);
    assert_eq!(count_playing_changes(&collected, true), 2);
    assert_eq!(count_playing_changes(&collected, false), 0);
}

#[tokio::test]
async fn test_stale_events_from_superseded_voice_are_suppressed() {
    let (store, factory, handle) = setup();
    let id = Uuid::new_v4();
    store.upsert(Cue::single(id, "sting", "/audio/sting.wav"));

    handle.toggle(id).unwrap();
    settle().await;
    handle.toggle(id).unwrap();
    settle().await;

    let mut events = handle.subscribe();
    // The superseded voice reports a natural end after the fact
    factory.voice(0).emit_ended();
    settle().await;

    // The authoritative instance is untouched
    assert!(factory.voice(1).is_playing());
    assert!(handle.playback_times(id).await.unwrap().is_some());
    let collected = drain_events(&mut events);
    assert_eq!(count_playing_changes(&collected, false), 0);
}

#[tokio::test]
async fn test_retrigger_stop_ends_playback() {
    let (store, factory, handle) = setup();
    let id = Uuid::new_v4();
    let mut cue = Cue::single(id, "drone", "/audio/drone.flac");
    cue.retrigger_behavior = RetriggerBehavior::Stop;
    store.upsert(cue);
    let mut events = handle.subscribe();

    handle.toggle(id).unwrap();
    settle().await;
    handle.toggle(id).unwrap();
    settle().await;

    assert_eq!(factory.voice_count(), 1);
    assert!(factory.voice(0).was_called("stop"));
    assert!(handle.playback_times(id).await.unwrap().is_none());
    let collected = drain_events(&mut events);
    assert_eq!(count_playing_changes(&collected, false), 1);
}

#[tokio::test]
async fn test_retrigger_fade_out_and_stop() {
    let (store, factory, handle) = setup();
    let id = Uuid::new_v4();
    let mut cue = Cue::single(id, "bed", "/audio/bed.flac");
    cue.retrigger_behavior = RetriggerBehavior::FadeOutAndStop;
    cue.fade_out_ms = 200;
    store.upsert(cue);

    handle.toggle(id).unwrap();
    settle().await;
    handle.toggle(id).unwrap();
    settle().await;

    let voice = factory.voice(0);
    assert!(voice.was_called("fade:1.000->0.000:200ms"));
    // Instant mock fades report silence immediately, completing the stop
    assert!(voice.was_called("stop"));
    assert!(handle.playback_times(id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_fade_out_with_zero_duration_stops_immediately() {
    let (store, factory, handle) = setup();
    let id = Uuid::new_v4();
    let mut cue = Cue::single(id, "bed", "/audio/bed.flac");
    cue.retrigger_behavior = RetriggerBehavior::FadeOutAndStop;
    cue.fade_out_ms = 0;
    store.upsert(cue);

    handle.toggle(id).unwrap();
    settle().await;
    handle.toggle(id).unwrap();
    settle().await;

    let voice = factory.voice(0);
    assert!(!voice.was_called("fade:"));
    assert!(voice.was_called("stop"));
    assert!(handle.playback_times(id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_do_nothing_with_overlap_spawns_independent_instance() {
    let (store, factory, handle) = setup();
    let id = Uuid::new_v4();
    let mut cue = Cue::single(id, "applause", "/audio/applause.wav");
    cue.retrigger_behavior = RetriggerBehavior::DoNothing;
    cue.allow_overlap = true;
    store.upsert(cue);

    handle.toggle(id).unwrap();
    settle().await;
    handle.toggle(id).unwrap();
    settle().await;

    // Both instances render; the first remains the authoritative one
    assert_eq!(factory.voice_count(), 2);
    assert!(factory.voice(0).is_playing());
    assert!(factory.voice(1).is_playing());
    assert!(handle.playback_times(id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_do_nothing_without_overlap_ignores_trigger() {
    let (store, factory, handle) = setup();
    let id = Uuid::new_v4();
    let mut cue = Cue::single(id, "applause", "/audio/applause.wav");
    cue.retrigger_behavior = RetriggerBehavior::DoNothing;
    store.upsert(cue);

    handle.toggle(id).unwrap();
    settle().await;
    handle.toggle(id).unwrap();
    settle().await;

    assert_eq!(factory.voice_count(), 1);
    assert!(factory.voice(0).is_playing());
}

#[tokio::test]
async fn test_toggle_unknown_cue_is_ignored() {
    let (_store, factory, handle) = setup();

    handle.toggle(Uuid::new_v4()).unwrap();
    settle().await;

    assert_eq!(factory.voice_count(), 0);
}
