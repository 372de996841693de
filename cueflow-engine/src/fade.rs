//! Fade progress arithmetic
//!
//! Engine-side fade tracking over a monotonic clock. The voice performs the
//! actual volume ramp; the engine independently tracks progress so that
//! completion can be detected on broadcaster ticks even if the voice's own
//! fade ticks are sparse, and so fade countdowns can be reported to the UI.

use std::time::{Duration, Instant};

/// Linear interpolated volume at `elapsed` into a fade
pub fn volume_at(from: f32, to: f32, total: Duration, elapsed: Duration) -> f32 {
    if total.is_zero() || elapsed >= total {
        return to;
    }
    let progress = (elapsed.as_secs_f64() / total.as_secs_f64()).clamp(0.0, 1.0) as f32;
    (from + (to - from) * progress).clamp(0.0, 1.0)
}

/// Whether a fade has reached its target
///
/// Completion keys off both the volume epsilon and elapsed time: at very low
/// target volumes the epsilon alone is unreliable (the whole fade may sit
/// inside it), so a fade is always complete once its duration has elapsed.
pub fn is_complete(
    current_volume: f32,
    target_volume: f32,
    epsilon: f32,
    started_at: Instant,
    total: Duration,
) -> bool {
    if started_at.elapsed() >= total {
        return true;
    }
    (current_volume - target_volume).abs() <= epsilon
}

/// Remaining fade time in milliseconds (0 once elapsed)
pub fn remaining_ms(started_at: Instant, total: Duration) -> u64 {
    total.saturating_sub(started_at.elapsed()).as_millis() as u64
}
