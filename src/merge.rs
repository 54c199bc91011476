//! Merging of consecutive detections of the same recording.
//!
//! The recognizer reports a long song as several back-to-back results. Runs
//! of adjacent results sharing an acrid are folded into the first one with
//! the durations summed. The same acrid reappearing after a different track
//! is a separate play and stays separate.

use crate::error::Result;
use crate::models::PlayEvent;

/// True if any acrid of `a` equals any acrid of `b`.
///
/// Fails when either event carries neither `music` nor `custom_files`.
pub fn is_duplicate(a: &PlayEvent, b: &PlayEvent) -> Result<bool> {
    let tracks_a = a.track_items()?;
    let tracks_b = b.track_items()?;
    Ok(tracks_a.iter().any(|track_a| {
        tracks_b
            .iter()
            .any(|track_b| track_a.acrid.is_some() && track_a.acrid == track_b.acrid)
    }))
}

/// Collapse runs of consecutive duplicates, keeping the first event of each run.
pub fn merge_duplicates(events: Vec<PlayEvent>) -> Result<Vec<PlayEvent>> {
    let mut merged: Vec<PlayEvent> = Vec::with_capacity(events.len());

    for event in events {
        if let Some(current) = merged.last_mut() {
            if is_duplicate(current, &event)? {
                current.played_duration += event.played_duration;
                continue;
            }
        }
        merged.push(event);
    }

    Ok(merged)
}
