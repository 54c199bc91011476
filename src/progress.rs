//! Progress bars for the fetch and report phases.
//!
//! Bars draw to stderr. With `--no-progress` they draw nowhere and progress
//! goes to the log at coarse intervals instead.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::atomic::{AtomicBool, Ordering};

static HIDDEN: AtomicBool = AtomicBool::new(false);

/// Switch bars off for the rest of the run (set from args in main).
pub fn set_hidden(value: bool) {
    HIDDEN.store(value, Ordering::Relaxed);
}

/// Bar for `len` steps of one phase.
pub fn create_progress_bar(len: u64, msg: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    if HIDDEN.load(Ordering::Relaxed) {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    } else {
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} (ETA: {eta})")
                .unwrap()
                .progress_chars("=> "),
        );
    }
    pb.set_message(msg.to_string());
    pb
}

/// Log `phase` progress every `every` steps and at the end, only while bars are hidden.
pub fn log_progress(phase: &str, done: u64, total: u64, every: u64) {
    if !HIDDEN.load(Ordering::Relaxed) || total == 0 {
        return;
    }
    if done % every.max(1) == 0 || done == total {
        tracing::info!(
            "{}: {}/{} ({:.0}%)",
            phase,
            done,
            total,
            100.0 * done as f64 / total as f64
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hidden_bars_draw_nowhere() {
        set_hidden(true);
        let pb = create_progress_bar(3, "Fetching results");
        assert!(pb.is_hidden());
        assert_eq!(pb.length(), Some(3));
        assert_eq!(pb.message(), "Fetching results");
    }
}
