//! Playlist traversal
//!
//! Computes the order playlist items are walked in and locates the next or
//! previous playable item, skipping indices whose voices failed to load.
//! Pure functions over the traversal order; the engine decides what to do
//! when the order is exhausted (stop, wrap, or cue the next item) based on
//! the cue's play mode.

use cueflow_common::PlaylistPlayMode;
use std::collections::HashSet;

/// Build the order item indices are walked in
///
/// Sequential index order for all modes except shuffle, which precomputes a
/// Fisher-Yates permutation so the shuffled order is stable for the life of
/// the playback state.
pub fn build_playback_order(item_count: usize, mode: PlaylistPlayMode) -> Vec<usize> {
    let mut order: Vec<usize> = (0..item_count).collect();
    if mode == PlaylistPlayMode::Shuffle {
        for i in (1..order.len()).rev() {
            let j = fastrand::usize(..=i);
            order.swap(i, j);
        }
    }
    order
}

/// Find the next playable item after `current_index`
///
/// Locates `current_index`'s position in the traversal order and scans
/// forward linearly for the first index not in `failed`. Returns None when
/// the order is exhausted. Each position is visited at most once, so a
/// playlist of all-failed items terminates rather than looping.
pub fn find_next_playable_item(
    order: &[usize],
    failed: &HashSet<usize>,
    current_index: usize,
) -> Option<usize> {
    let pos = order.iter().position(|&i| i == current_index)?;
    order[pos + 1..].iter().copied().find(|i| !failed.contains(i))
}

/// Find the previous playable item before `current_index`
pub fn find_previous_playable_item(
    order: &[usize],
    failed: &HashSet<usize>,
    current_index: usize,
) -> Option<usize> {
    let pos = order.iter().position(|&i| i == current_index)?;
    order[..pos].iter().rev().copied().find(|i| !failed.contains(i))
}

/// First playable item in the traversal order, if any
pub fn first_playable_item(order: &[usize], failed: &HashSet<usize>) -> Option<usize> {
    order.iter().copied().find(|i| !failed.contains(i))
}
