//! Stage spinners using indicatif

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use crate::pipeline::{PipelineError, Stage};

/// Spinner shown while a pipeline stage runs, prefixed with the stage name
pub fn create_spinner(stage: Stage, message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.cyan} {prefix:.dim} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
    pb.set_style(style);
    pb.set_prefix(format!("[{}]", stage));
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

pub fn finish_with_success(pb: &ProgressBar, message: &str) {
    pb.finish_with_message(format!("✅ {}", message));
}

/// Stop a spinner on a failed stage. The prefix is switched to the stage
/// that raised the error, which may differ from the one the spinner began with.
pub fn finish_with_error(pb: &ProgressBar, error: &PipelineError) {
    pb.set_prefix(format!("[{}]", error.stage()));
    pb.abandon_with_message(format!("❌ {}", error));
}
