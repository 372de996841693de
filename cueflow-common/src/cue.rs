//! Cue configuration model
//!
//! A cue is a named playable unit: either a single audio file or an ordered
//! playlist of items. Cue configuration is owned by an external store and is
//! re-read live by the engine (trim and loop settings may change while the
//! cue is playing).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Cue identifier
pub type CueId = Uuid;

/// What to do when an already-playing cue is triggered again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RetriggerBehavior {
    /// Stop the current instance and start a fresh one from the top
    #[default]
    Restart,
    /// Stop playback immediately
    Stop,
    /// Fade out over the cue's fade-out duration, then stop
    FadeOutAndStop,
    /// Ignore the trigger entirely
    DoNothing,
}

/// Playlist continuation mode after an item finishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PlaylistPlayMode {
    /// Play items in order, advancing automatically
    #[default]
    Continue,
    /// Play items in a precomputed shuffled order
    Shuffle,
    /// Repeat the current item indefinitely
    RepeatOne,
    /// Stop after each item, cueing the next for the following trigger
    StopAndCueNext,
}

/// One entry of a playlist cue
///
/// Per-item trim/fade overrides take precedence over the cue-level values
/// when present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistItem {
    /// Item identifier (stable across reorders)
    pub id: Uuid,

    /// Audio source path
    pub path: PathBuf,

    /// Display name (reported in playing-state notifications)
    pub name: String,

    /// Trim region start override in seconds
    pub trim_start: Option<f64>,

    /// Trim region end override in seconds
    pub trim_end: Option<f64>,

    /// Fade-in override in milliseconds
    pub fade_in_ms: Option<u64>,

    /// Fade-out override in milliseconds
    pub fade_out_ms: Option<u64>,

    /// Known media duration in seconds, if previously discovered
    pub duration_secs: Option<f64>,
}

impl PlaylistItem {
    /// Create a bare item with no overrides
    pub fn new(path: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            path: path.into(),
            name: name.into(),
            trim_start: None,
            trim_end: None,
            fade_in_ms: None,
            fade_out_ms: None,
            duration_secs: None,
        }
    }
}

/// Source shape of a cue
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CueKind {
    /// One audio file with optional trim region and loop
    Single {
        /// Audio source path
        file_path: PathBuf,
        /// Trim region start in seconds (0.0 = start of file)
        trim_start: f64,
        /// Trim region end in seconds; `None` or non-positive disables
        /// end-of-region enforcement
        trim_end: Option<f64>,
        /// Loop playback (confined to the trim region when one is set)
        loop_enabled: bool,
    },
    /// Ordered list of playlist items
    Playlist {
        /// Items in configured order
        items: Vec<PlaylistItem>,
    },
}

/// A named playable unit with volume/fade/ducking/retrigger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cue {
    /// Cue identifier
    pub id: CueId,

    /// Operator-visible name
    pub name: String,

    /// Single file or playlist
    pub kind: CueKind,

    /// Target volume, 0.0-1.0
    pub volume: f32,

    /// Fade-in duration in milliseconds (0 = no fade)
    pub fade_in_ms: u64,

    /// Fade-out duration in milliseconds (0 = no fade)
    pub fade_out_ms: u64,

    /// Behavior when triggered while already playing
    pub retrigger_behavior: RetriggerBehavior,

    /// Allow overlapping independent instances of this cue
    ///
    /// Overlap instances never occupy the authoritative playback slot; they
    /// are reachable only by stop-all.
    pub allow_overlap: bool,

    /// This cue ducks other cues while it plays
    pub is_ducking_trigger: bool,

    /// This cue's volume is reduced while a ducking trigger plays
    pub enable_ducking: bool,

    /// Ducking depth: percentage of volume removed while ducked, 0-100
    pub ducking_level_percent: u8,

    /// Continuation mode for playlist cues
    pub playlist_play_mode: PlaylistPlayMode,
}

impl Cue {
    /// Create a single-file cue with defaults (full volume, no fades,
    /// restart on retrigger, no ducking)
    pub fn single(id: CueId, name: impl Into<String>, file_path: impl Into<PathBuf>) -> Self {
        Self {
            id,
            name: name.into(),
            kind: CueKind::Single {
                file_path: file_path.into(),
                trim_start: 0.0,
                trim_end: None,
                loop_enabled: false,
            },
            volume: 1.0,
            fade_in_ms: 0,
            fade_out_ms: 0,
            retrigger_behavior: RetriggerBehavior::Restart,
            allow_overlap: false,
            is_ducking_trigger: false,
            enable_ducking: false,
            ducking_level_percent: 0,
            playlist_play_mode: PlaylistPlayMode::Continue,
        }
    }

    /// Create a playlist cue with defaults
    pub fn playlist(id: CueId, name: impl Into<String>, items: Vec<PlaylistItem>) -> Self {
        Self {
            id,
            name: name.into(),
            kind: CueKind::Playlist { items },
            volume: 1.0,
            fade_in_ms: 0,
            fade_out_ms: 0,
            retrigger_behavior: RetriggerBehavior::Restart,
            allow_overlap: false,
            is_ducking_trigger: false,
            enable_ducking: false,
            ducking_level_percent: 0,
            playlist_play_mode: PlaylistPlayMode::Continue,
        }
    }

    /// Whether this cue is a playlist
    pub fn is_playlist(&self) -> bool {
        matches!(self.kind, CueKind::Playlist { .. })
    }

    /// Playlist items, or an empty slice for single cues
    pub fn items(&self) -> &[PlaylistItem] {
        match &self.kind {
            CueKind::Playlist { items } => items,
            CueKind::Single { .. } => &[],
        }
    }

    /// Effective trim region for the cue or one of its playlist items
    ///
    /// Returns `(trim_start, trim_end, loop_enabled)`. Playlist items never
    /// loop individually; their trim values fall back to no trimming when
    /// unset.
    pub fn effective_trim(&self, item_index: Option<usize>) -> (f64, Option<f64>, bool) {
        match &self.kind {
            CueKind::Single {
                trim_start,
                trim_end,
                loop_enabled,
                ..
            } => (*trim_start, *trim_end, *loop_enabled),
            CueKind::Playlist { items } => {
                let item = item_index.and_then(|i| items.get(i));
                match item {
                    Some(item) => (item.trim_start.unwrap_or(0.0), item.trim_end, false),
                    None => (0.0, None, false),
                }
            }
        }
    }

    /// Effective fade-in duration for the cue or one of its playlist items
    pub fn effective_fade_in_ms(&self, item_index: Option<usize>) -> u64 {
        item_index
            .and_then(|i| self.items().get(i))
            .and_then(|item| item.fade_in_ms)
            .unwrap_or(self.fade_in_ms)
    }

    /// Effective fade-out duration for the cue or one of its playlist items
    pub fn effective_fade_out_ms(&self, item_index: Option<usize>) -> u64 {
        item_index
            .and_then(|i| self.items().get(i))
            .and_then(|item| item.fade_out_ms)
            .unwrap_or(self.fade_out_ms)
    }

    /// Source path for the cue or one of its playlist items
    pub fn source_path(&self, item_index: Option<usize>) -> Option<&PathBuf> {
        match &self.kind {
            CueKind::Single { file_path, .. } => Some(file_path),
            CueKind::Playlist { items } => item_index.and_then(|i| items.get(i)).map(|item| &item.path),
        }
    }

    /// Display name for the active item (item name for playlists, cue name
    /// for singles)
    pub fn item_name(&self, item_index: Option<usize>) -> &str {
        match &self.kind {
            CueKind::Single { .. } => &self.name,
            CueKind::Playlist { items } => item_index
                .and_then(|i| items.get(i))
                .map(|item| item.name.as_str())
                .unwrap_or(&self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_trim_single() {
        let mut cue = Cue::single(Uuid::new_v4(), "music", "/audio/music.flac");
        if let CueKind::Single {
            trim_start,
            trim_end,
            loop_enabled,
            ..
        } = &mut cue.kind
        {
            *trim_start = 2.0;
            *trim_end = Some(5.0);
            *loop_enabled = true;
        }

        assert_eq!(cue.effective_trim(None), (2.0, Some(5.0), true));
    }

    #[test]
    fn test_effective_trim_playlist_item_overrides() {
        let mut item = PlaylistItem::new("/audio/a.wav", "a");
        item.trim_start = Some(1.5);
        item.trim_end = Some(9.0);
        let plain = PlaylistItem::new("/audio/b.wav", "b");

        let cue = Cue::playlist(Uuid::new_v4(), "walk-in", vec![item, plain]);

        // Item with overrides
        assert_eq!(cue.effective_trim(Some(0)), (1.5, Some(9.0), false));
        // Item without overrides falls back to no trimming
        assert_eq!(cue.effective_trim(Some(1)), (0.0, None, false));
    }

    #[test]
    fn test_effective_fades_fall_back_to_cue() {
        let mut item = PlaylistItem::new("/audio/a.wav", "a");
        item.fade_in_ms = Some(250);
        let plain = PlaylistItem::new("/audio/b.wav", "b");

        let mut cue = Cue::playlist(Uuid::new_v4(), "underscore", vec![item, plain]);
        cue.fade_in_ms = 1000;
        cue.fade_out_ms = 2000;

        assert_eq!(cue.effective_fade_in_ms(Some(0)), 250);
        assert_eq!(cue.effective_fade_in_ms(Some(1)), 1000);
        assert_eq!(cue.effective_fade_out_ms(Some(0)), 2000);
    }

    #[test]
    fn test_item_name() {
        let item = PlaylistItem::new("/audio/opener.wav", "Opener");
        let cue = Cue::playlist(Uuid::new_v4(), "preshow", vec![item]);

        assert_eq!(cue.item_name(Some(0)), "Opener");
        assert_eq!(cue.item_name(Some(7)), "preshow");

        let single = Cue::single(Uuid::new_v4(), "sting", "/audio/sting.wav");
        assert_eq!(single.item_name(None), "sting");
    }

    #[test]
    fn test_serde_round_trip() {
        let cue = Cue::single(Uuid::new_v4(), "sfx", "/audio/door.wav");
        let json = serde_json::to_string(&cue).unwrap();
        let back: Cue = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, cue.id);
        assert_eq!(back.name, "sfx");
    }
}
