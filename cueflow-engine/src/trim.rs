//! Trim region enforcement arithmetic
//!
//! A trim region confines playback (and looping) to `[trim_start, trim_end)`
//! of the source. Enforcement runs as a small state machine: a single-shot
//! timer is armed for the time remaining until the trim end, and on fire the
//! engine either loops back to the trim start or stops the voice.
//!
//! The decision is a pure function of the latest trim configuration and the
//! current seek position, so it is unit-testable without real timers and the
//! timer task can simply recompute on every fire. Re-reading the
//! configuration fresh at each (re)arm is what makes live trim edits take
//! effect mid-playback.

use std::time::Duration;

/// Next enforcement step for a playing voice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrimAction {
    /// No valid trim end: play full duration, no timer
    Disabled,
    /// Arm a single-shot timer; on fire, recompute
    Schedule {
        /// Time until the trim end is reached at normal playback rate
        delay: Duration,
    },
    /// Position is already at/past the trim end and looping is enabled:
    /// seek to the trim start, ensure playing, and re-arm
    LoopNow,
    /// Position is already at/past the trim end and looping is disabled:
    /// stop the voice
    StopNow,
}

/// Compute the next enforcement step
///
/// `trim_end` of `None`, a non-positive value, or a value not beyond
/// `trim_start` disables enforcement entirely (full-duration playback).
pub fn compute_next_enforcement(
    trim_start: f64,
    trim_end: Option<f64>,
    loop_enabled: bool,
    current_seek: f64,
) -> TrimAction {
    let Some(trim_end) = trim_end else {
        return TrimAction::Disabled;
    };
    if trim_end <= 0.0 || trim_end <= trim_start {
        return TrimAction::Disabled;
    }

    let effective_pos = current_seek.max(trim_start);
    let remaining_secs = trim_end - effective_pos;

    if remaining_secs > 0.0 {
        TrimAction::Schedule {
            delay: Duration::from_secs_f64(remaining_secs),
        }
    } else if loop_enabled {
        TrimAction::LoopNow
    } else {
        TrimAction::StopNow
    }
}

/// Whether the voice itself should handle looping
///
/// Only when no trim boundaries are set; otherwise the engine owns loop
/// restart to keep the loop confined to the trimmed region.
pub fn voice_handles_looping(trim_start: f64, trim_end: Option<f64>) -> bool {
    trim_start <= 0.0
        && match trim_end {
            None => true,
            Some(end) => end <= 0.0,
        }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_trim_end_disables() {
        assert_eq!(
            compute_next_enforcement(0.0, None, true, 1.0),
            TrimAction::Disabled
        );
    }

    #[test]
    fn test_degenerate_bounds_disable() {
        // trim_end <= 0
        assert_eq!(
            compute_next_enforcement(0.0, Some(0.0), false, 1.0),
            TrimAction::Disabled
        );
        assert_eq!(
            compute_next_enforcement(0.0, Some(-3.0), false, 1.0),
            TrimAction::Disabled
        );
        // trim_end <= trim_start
        assert_eq!(
            compute_next_enforcement(5.0, Some(5.0), true, 1.0),
            TrimAction::Disabled
        );
        assert_eq!(
            compute_next_enforcement(5.0, Some(2.0), true, 1.0),
            TrimAction::Disabled
        );
    }

    #[test]
    fn test_schedules_remaining_time() {
        // Playing at 3.0s with trim end at 5.0s: 2s remain
        let action = compute_next_enforcement(2.0, Some(5.0), false, 3.0);
        assert_eq!(
            action,
            TrimAction::Schedule {
                delay: Duration::from_secs_f64(2.0)
            }
        );
    }

    #[test]
    fn test_position_before_trim_start_uses_trim_start() {
        // Seek position 0.5 is before the region; the full region remains
        let action = compute_next_enforcement(2.0, Some(5.0), true, 0.5);
        assert_eq!(
            action,
            TrimAction::Schedule {
                delay: Duration::from_secs_f64(3.0)
            }
        );
    }

    #[test]
    fn test_past_end_loops_when_looping() {
        // Resumed past the boundary: act immediately instead of scheduling
        assert_eq!(
            compute_next_enforcement(2.0, Some(5.0), true, 5.0),
            TrimAction::LoopNow
        );
        assert_eq!(
            compute_next_enforcement(2.0, Some(5.0), true, 7.5),
            TrimAction::LoopNow
        );
    }

    #[test]
    fn test_past_end_stops_when_not_looping() {
        assert_eq!(
            compute_next_enforcement(2.0, Some(5.0), false, 6.0),
            TrimAction::StopNow
        );
    }

    #[test]
    fn test_loop_cycle_delay_after_seek_to_start() {
        // After looping back to trim_start the recomputed schedule is one
        // full loop cycle
        let action = compute_next_enforcement(2.0, Some(5.0), true, 2.0);
        assert_eq!(
            action,
            TrimAction::Schedule {
                delay: Duration::from_secs_f64(3.0)
            }
        );
    }

    #[test]
    fn test_voice_handles_looping_only_without_boundaries() {
        assert!(voice_handles_looping(0.0, None));
        assert!(voice_handles_looping(0.0, Some(0.0)));
        assert!(!voice_handles_looping(1.0, None));
        assert!(!voice_handles_looping(0.0, Some(10.0)));
        assert!(!voice_handles_looping(2.0, Some(5.0)));
    }
}
