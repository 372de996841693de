//! Scripted audio voice backend
//!
//! `MockVoice` fulfils the `AudioVoice` contract without touching any audio
//! device. Load succeeds or fails by path, positions advance on the real
//! clock while "playing" (so timer-based behavior is exercised for real),
//! and every call is recorded for assertion. Natural ends never happen on
//! their own: tests fire them through `MockVoiceHandle::emit_ended`.
//!
//! Fades complete instantly by default (the voice jumps to the target and
//! reports one tick at it). Construct the factory with manual fades when a
//! test needs to hold a fade open and drive the ticks itself.

use cueflow_engine::voice::{
    AudioVoice, LoadState, VoiceEventKind, VoiceEventTx, VoiceFactory, VoiceId,
};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

const DEFAULT_DURATION_SECS: f64 = 30.0;

struct VoiceInner {
    load_state: LoadState,
    playing: bool,
    volume: f32,
    base_position: f64,
    play_started_at: Option<Instant>,
    duration: Option<f64>,
    looping: bool,
    calls: Vec<String>,
}

impl VoiceInner {
    fn position(&self) -> f64 {
        match (self.playing, self.play_started_at) {
            (true, Some(started)) => self.base_position + started.elapsed().as_secs_f64(),
            _ => self.base_position,
        }
    }
}

/// Inspection and scripting handle for one created voice
#[derive(Clone)]
pub struct MockVoiceHandle {
    /// Voice identity as seen by the engine
    pub voice_id: VoiceId,
    inner: Arc<Mutex<VoiceInner>>,
    events: VoiceEventTx,
}

impl MockVoiceHandle {
    /// Fire a natural end of media
    pub fn emit_ended(&self) {
        self.inner.lock().unwrap().playing = false;
        self.events.send(VoiceEventKind::Ended);
    }

    /// Fire a fade progress tick at the given volume
    pub fn emit_fade_tick(&self, volume: f32) {
        self.inner.lock().unwrap().volume = volume;
        self.events.send(VoiceEventKind::FadeTick { volume });
    }

    pub fn volume(&self) -> f32 {
        self.inner.lock().unwrap().volume
    }

    pub fn is_playing(&self) -> bool {
        self.inner.lock().unwrap().playing
    }

    pub fn is_unloaded(&self) -> bool {
        self.inner.lock().unwrap().load_state == LoadState::Unloaded
    }

    pub fn position(&self) -> f64 {
        self.inner.lock().unwrap().position()
    }

    pub fn looping(&self) -> bool {
        self.inner.lock().unwrap().looping
    }

    /// Overwrite the playback position (resets the play clock)
    pub fn set_position(&self, secs: f64) {
        let mut inner = self.inner.lock().unwrap();
        inner.base_position = secs;
        inner.play_started_at = Some(Instant::now());
    }

    /// Directly set the voice volume, as an external volume change would
    pub fn set_volume_external(&self, volume: f32) {
        self.inner.lock().unwrap().volume = volume;
    }

    /// Snapshot of every call made on this voice, in order
    pub fn calls(&self) -> Vec<String> {
        self.inner.lock().unwrap().calls.clone()
    }

    /// Whether any recorded call starts with the given prefix
    pub fn was_called(&self, prefix: &str) -> bool {
        self.inner
            .lock()
            .unwrap()
            .calls
            .iter()
            .any(|c| c.starts_with(prefix))
    }
}

struct MockVoice {
    inner: Arc<Mutex<VoiceInner>>,
    events: VoiceEventTx,
    fail_paths: Arc<Mutex<HashSet<PathBuf>>>,
    durations: Arc<Mutex<HashMap<PathBuf, f64>>>,
    manual_fades: bool,
}

impl AudioVoice for MockVoice {
    fn id(&self) -> VoiceId {
        self.events.voice_id()
    }

    fn load(&mut self, source: &Path) {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(format!("load:{}", source.display()));
        if self.fail_paths.lock().unwrap().contains(source) {
            self.events.send(VoiceEventKind::LoadError {
                message: format!("cannot decode {}", source.display()),
            });
            return;
        }
        inner.load_state = LoadState::Loaded;
        inner.duration = Some(
            self.durations
                .lock()
                .unwrap()
                .get(source)
                .copied()
                .unwrap_or(DEFAULT_DURATION_SECS),
        );
        self.events.send(VoiceEventKind::Loaded);
    }

    fn play(&mut self) {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push("play".to_string());
        inner.playing = true;
        inner.play_started_at = Some(Instant::now());
        self.events.send(VoiceEventKind::Played);
    }

    fn pause(&mut self) {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push("pause".to_string());
        inner.base_position = inner.position();
        inner.playing = false;
        self.events.send(VoiceEventKind::Paused);
    }

    fn stop(&mut self) {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push("stop".to_string());
        inner.playing = false;
        inner.base_position = 0.0;
        self.events.send(VoiceEventKind::Stopped);
    }

    fn unload(&mut self) {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push("unload".to_string());
        inner.playing = false;
        inner.load_state = LoadState::Unloaded;
    }

    fn seek(&mut self, secs: f64) -> f64 {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(format!("seek:{secs:.3}"));
        inner.base_position = secs;
        if inner.playing {
            inner.play_started_at = Some(Instant::now());
        }
        secs
    }

    fn position(&self) -> f64 {
        self.inner.lock().unwrap().position()
    }

    fn volume(&self) -> f32 {
        self.inner.lock().unwrap().volume
    }

    fn set_volume(&mut self, volume: f32) {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(format!("set_volume:{volume:.3}"));
        inner.volume = volume;
    }

    fn fade(&mut self, from: f32, to: f32, duration: Duration) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .calls
            .push(format!("fade:{from:.3}->{to:.3}:{}ms", duration.as_millis()));
        if !self.manual_fades {
            inner.volume = to;
            self.events.send(VoiceEventKind::FadeTick { volume: to });
        }
    }

    fn is_playing(&self) -> bool {
        self.inner.lock().unwrap().playing
    }

    fn duration(&self) -> Option<f64> {
        self.inner.lock().unwrap().duration
    }

    fn load_state(&self) -> LoadState {
        self.inner.lock().unwrap().load_state
    }

    fn set_looping(&mut self, looping: bool) {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(format!("set_looping:{looping}"));
        inner.looping = looping;
    }
}

/// Factory producing scripted voices, retaining a handle to each
pub struct MockFactory {
    fail_paths: Arc<Mutex<HashSet<PathBuf>>>,
    durations: Arc<Mutex<HashMap<PathBuf, f64>>>,
    manual_fades: bool,
    voices: Mutex<Vec<MockVoiceHandle>>,
}

impl MockFactory {
    /// Factory whose fades complete instantly
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            fail_paths: Arc::new(Mutex::new(HashSet::new())),
            durations: Arc::new(Mutex::new(HashMap::new())),
            manual_fades: false,
            voices: Mutex::new(Vec::new()),
        })
    }

    /// Factory whose fades stay open until the test emits ticks
    pub fn with_manual_fades() -> Arc<Self> {
        Arc::new(Self {
            fail_paths: Arc::new(Mutex::new(HashSet::new())),
            durations: Arc::new(Mutex::new(HashMap::new())),
            manual_fades: true,
            voices: Mutex::new(Vec::new()),
        })
    }

    /// Make every future load of this path fail
    pub fn fail_path(&self, path: impl Into<PathBuf>) {
        self.fail_paths.lock().unwrap().insert(path.into());
    }

    /// Report this duration for future loads of the path
    pub fn set_duration(&self, path: impl Into<PathBuf>, secs: f64) {
        self.durations.lock().unwrap().insert(path.into(), secs);
    }

    /// Number of voices created so far
    pub fn voice_count(&self) -> usize {
        self.voices.lock().unwrap().len()
    }

    /// Handle to the n-th created voice (creation order)
    pub fn voice(&self, index: usize) -> MockVoiceHandle {
        self.voices.lock().unwrap()[index].clone()
    }

    /// Handle to the most recently created voice
    pub fn latest_voice(&self) -> MockVoiceHandle {
        self.voices.lock().unwrap().last().unwrap().clone()
    }
}

impl VoiceFactory for MockFactory {
    fn create(&self, events: VoiceEventTx) -> Box<dyn AudioVoice> {
        let inner = Arc::new(Mutex::new(VoiceInner {
            load_state: LoadState::Unloaded,
            playing: false,
            volume: 1.0,
            base_position: 0.0,
            play_started_at: None,
            duration: None,
            looping: false,
            calls: Vec::new(),
        }));
        self.voices.lock().unwrap().push(MockVoiceHandle {
            voice_id: events.voice_id(),
            inner: inner.clone(),
            events: events.clone(),
        });
        Box::new(MockVoice {
            inner,
            events,
            fail_paths: self.fail_paths.clone(),
            durations: self.durations.clone(),
            manual_fades: self.manual_fades,
        })
    }
}
