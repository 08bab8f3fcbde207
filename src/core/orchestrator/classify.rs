//! Launch failure classification
//!
//! Maps the launch tool's stderr to one of the failure categories, each of
//! which carries an operator-facing remediation hint.

use crate::utils::error::LaunchFailureCategory;

/// Classify the stderr of a failed launch
pub fn classify_stderr(stderr: &str) -> LaunchFailureCategory {
    let lower = stderr.to_lowercase();

    if lower.contains("failed to acquire resources")
        || lower.contains("no capacity")
        || lower.contains("insufficientinstancecapacity")
        || lower.contains("resources unavailable")
    {
        LaunchFailureCategory::NoCapacity
    } else if lower.contains("credential")
        || lower.contains("authfailure")
        || lower.contains("permission denied")
        || lower.contains("unauthorized")
    {
        LaunchFailureCategory::Credentials
    } else if lower.contains("quota") || lower.contains("limitexceeded") {
        LaunchFailureCategory::Quota
    } else if lower.contains("timed out")
        || lower.contains("timeout")
        || lower.contains("connection reset")
        || lower.contains("rate limit")
        || lower.contains("temporarily unavailable")
    {
        LaunchFailureCategory::Transient
    } else {
        LaunchFailureCategory::Internal
    }
}
