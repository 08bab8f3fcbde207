//! Launch tool stdout scanning
//!
//! A dedicated scanner maps launch-tool output lines to job stage
//! transitions using string-match rules, so the job record shows live
//! progress while the subprocess runs.

use crate::core::models::LaunchJobStatus;

/// Map one stdout line to a stage transition, if it signals one
pub fn stage_for_line(line: &str) -> Option<LaunchJobStatus> {
    if line.contains("Launching") {
        Some(LaunchJobStatus::Provisioning)
    } else if line.contains("Running setup") {
        Some(LaunchJobStatus::Installing)
    } else if line.contains("Downloading model") || line.contains("Loading model") {
        Some(LaunchJobStatus::Loading)
    } else if line.contains("Starting vLLM") || line.contains("Starting inference server") {
        Some(LaunchJobStatus::Starting)
    } else {
        None
    }
}

/// Whether a non-transition line is still worth appending to the job
///
/// Provisioning logs are noisy; only shell-visible progress markers are
/// retained so the stages list stays readable.
pub fn is_progress_line(line: &str) -> bool {
    let trimmed = line.trim();
    !trimmed.is_empty() && (trimmed.starts_with('[') || trimmed.contains("..."))
}
