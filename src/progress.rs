//! Global progress bar management
//!
//! A single shared `MultiProgress` instance so any part of the application
//! can add progress bars without threading the instance through parameters.

use indicatif::MultiProgress;
use once_cell::sync::Lazy;
use std::sync::Arc;

static MULTI: Lazy<Arc<MultiProgress>> = Lazy::new(|| Arc::new(MultiProgress::new()));

/// Get access to the global multi-progress bar (a cheap `Arc` clone).
pub fn global_mp() -> Arc<MultiProgress> {
    MULTI.clone()
}

pub fn add_progress_bar(pb: indicatif::ProgressBar) {
    global_mp().add(pb);
}

pub fn remove_progress_bar(pb: &indicatif::ProgressBar) {
    global_mp().remove(pb);
}
