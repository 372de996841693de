//! Cue store port
//!
//! The authoritative live source of cue configuration. The engine re-reads
//! cue definitions through this trait on every trim re-arm and ducking
//! decision, so edits made while a cue is playing (trim points, loop flag,
//! ducking levels) take effect without restarting playback.

use cueflow_common::{Cue, CueId};
use std::collections::HashMap;
use std::sync::RwLock;

/// Live cue configuration source
pub trait CueStore: Send + Sync {
    /// Fetch the current definition of a cue, or None if it was deleted
    fn cue_by_id(&self, id: &CueId) -> Option<Cue>;
}

/// Simple in-memory cue store
///
/// Suitable for hosts that keep cue definitions in their own state layer
/// and mirror them here, and for tests. Uses a std RwLock because reads
/// happen in synchronous contexts inside the engine task.
#[derive(Default)]
pub struct InMemoryCueStore {
    cues: RwLock<HashMap<CueId, Cue>>,
}

impl InMemoryCueStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a cue definition
    pub fn upsert(&self, cue: Cue) {
        self.cues.write().unwrap().insert(cue.id, cue);
    }

    /// Remove a cue definition
    pub fn remove(&self, id: &CueId) -> Option<Cue> {
        self.cues.write().unwrap().remove(id)
    }

    /// Apply an in-place edit to a cue definition, if present
    ///
    /// This is the live-edit path: trim/loop/ducking changes made through
    /// here are observed by the engine on its next read.
    pub fn update<F: FnOnce(&mut Cue)>(&self, id: &CueId, f: F) -> bool {
        let mut cues = self.cues.write().unwrap();
        match cues.get_mut(id) {
            Some(cue) => {
                f(cue);
                true
            }
            None => false,
        }
    }
}

impl CueStore for InMemoryCueStore {
    fn cue_by_id(&self, id: &CueId) -> Option<Cue> {
        self.cues.read().unwrap().get(id).cloned()
    }
}
