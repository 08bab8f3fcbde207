//! Inference proxy configuration

use serde::{Deserialize, Serialize};

/// Inference proxy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Per-model hard cap on request duration in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
    /// Upper bound on the upstream-to-client streaming buffer in bytes
    #[serde(default = "default_stream_buffer_bytes")]
    pub stream_buffer_bytes: usize,
    /// Whether a transient upstream failure earns one retry on a fresh node
    #[serde(default = "default_true")]
    pub retry_transient: bool,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            request_timeout: default_request_timeout(),
            stream_buffer_bytes: default_stream_buffer_bytes(),
            retry_transient: true,
        }
    }
}

impl ProxyConfig {
    /// Validate proxy configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.request_timeout == 0 {
            return Err("proxy.request_timeout cannot be 0".to_string());
        }
        if self.stream_buffer_bytes == 0 || self.stream_buffer_bytes > 64 * 1024 {
            return Err("proxy.stream_buffer_bytes must be within (0, 64 KiB]".to_string());
        }
        Ok(())
    }
}

fn default_request_timeout() -> u64 {
    120
}

fn default_stream_buffer_bytes() -> usize {
    64 * 1024
}

fn default_true() -> bool {
    true
}
