//! Ducking arithmetic
//!
//! Volume math for cross-cue ducking. The coordination itself (which cues
//! duck, when to revert) lives in the engine; these helpers keep the
//! arithmetic in one unit-testable place.

/// Ducked volume for a cue
///
/// `level_percent` is the percentage of volume removed while ducked:
/// level 80 on a base volume of 1.0 yields 0.2.
pub fn ducked_volume(base_volume: f32, level_percent: u8) -> f32 {
    let level = (level_percent.min(100)) as f32 / 100.0;
    (base_volume * (1.0 - level)).clamp(0.0, 1.0)
}
