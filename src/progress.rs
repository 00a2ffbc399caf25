//! Progress reporting utilities

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Batches smaller than this are staged without a progress bar
pub const PROGRESS_THRESHOLD: u64 = 50_000;

/// Progress reporter for one import
#[derive(Debug)]
pub struct ProgressReporter {
    pub load_pb: Option<ProgressBar>,
    pub stage_pb: Option<ProgressBar>,
    pub merge_pb: Option<ProgressBar>,
    show_progress: bool,
}

impl ProgressReporter {
    /// Create progress reporter for an interactive import
    pub fn new_for_import() -> Self {
        Self {
            load_pb: None,
            stage_pb: None,
            merge_pb: None,
            show_progress: true,
        }
    }

    /// Create minimal progress reporter (no progress bars)
    pub fn new_minimal() -> Self {
        Self {
            load_pb: None,
            stage_pb: None,
            merge_pb: None,
            show_progress: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.show_progress
    }

    /// Show a spinner while a file is read
    pub fn start_load(&mut self, message: &str) {
        if self.show_progress && self.load_pb.is_none() {
            self.load_pb = Some(create_spinner(message));
        }
    }

    pub fn finish_load(&mut self, message: &str) {
        if let Some(pb) = self.load_pb.take() {
            pb.finish_with_message(message.to_string());
        }
    }

    /// Start the staging bar for large batches
    pub fn start_stage(&mut self, total_rows: u64) {
        if self.show_progress && self.stage_pb.is_none() && total_rows >= PROGRESS_THRESHOLD {
            self.stage_pb = Some(create_progress_bar(total_rows, "Staging rows"));
        }
    }

    /// Update staged row count
    pub fn update_stage(&mut self, staged: u64) {
        if let Some(pb) = &self.stage_pb {
            pb.set_position(staged);
        }
    }

    pub fn finish_stage(&mut self, message: &str) {
        if let Some(pb) = self.stage_pb.take() {
            pb.finish_with_message(message.to_string());
        }
    }

    /// Show a spinner while staged rows are merged
    pub fn start_merge(&mut self) {
        if self.show_progress && self.merge_pb.is_none() {
            self.merge_pb = Some(create_spinner("Merging rows..."));
        }
    }

    pub fn finish_merge(&mut self) {
        if let Some(pb) = self.merge_pb.take() {
            pb.finish_and_clear();
        }
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        // Ensure all progress bars are cleaned up silently
        for pb in [self.load_pb.take(), self.stage_pb.take(), self.merge_pb.take()]
            .into_iter()
            .flatten()
        {
            pb.finish_and_clear();
        }
    }
}

/// Create a spinner progress bar
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{spinner:.green} {msg}")
            .expect("Invalid progress template"),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Create a progress bar with known total
fn create_progress_bar(total: u64, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>7}/{len:7} ({per_sec}) {eta} {msg}")
            .expect("Invalid progress template")
            .progress_chars("#>-"),
    );
    pb.set_message(message.to_string());
    pb
}
