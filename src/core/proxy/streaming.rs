//! SSE relay internals: chunk scanning and guaranteed usage finalization

use crate::core::meter::UsageMeter;
use crate::core::models::UsageEvent;
use crate::core::models::openai::{Usage, UsageEnvelope};
use crate::core::registry::InFlightGuard;
use crate::core::limiter::RequestTicket;
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Incremental scanner over SSE bytes
///
/// Forwarded bytes are never modified; the scanner only inspects complete
/// `data:` lines for usage blocks and the `[DONE]` sentinel. The pending
/// line buffer is bounded; a pathological unbroken line is dropped from
/// scanning (not from forwarding) once it exceeds the cap.
#[derive(Debug)]
pub(super) struct SseScanner {
    pending: Vec<u8>,
    cap: usize,
    last_usage: Option<Usage>,
    done: bool,
}

impl SseScanner {
    pub fn new(cap: usize) -> Self {
        Self {
            pending: Vec::new(),
            cap,
            last_usage: None,
            done: false,
        }
    }

    /// Inspect one upstream chunk
    pub fn feed(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);

        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            self.scan_line(&line[..line.len().saturating_sub(1)]);
        }

        if self.pending.len() > self.cap {
            self.pending.clear();
        }
    }

    fn scan_line(&mut self, line: &[u8]) {
        let line = if line.last() == Some(&b'\r') {
            &line[..line.len() - 1]
        } else {
            line
        };
        let Some(payload) = line.strip_prefix(b"data: ") else {
            return;
        };
        if payload == b"[DONE]" {
            self.done = true;
            return;
        }
        // The last usage block seen wins; intermediate chunks may carry one.
        if let Some(usage) = UsageEnvelope::extract(payload) {
            self.last_usage = Some(usage);
        }
    }

    pub fn last_usage(&self) -> Option<Usage> {
        self.last_usage
    }

    pub fn saw_done(&self) -> bool {
        self.done
    }
}

/// Guaranteed usage finalization for a streamed response
///
/// Records exactly one usage event when dropped, whether the stream ended
/// with `[DONE]`, failed mid-stream, or the client disconnected. Holds the
/// request ticket and the node in-flight slot so both release with it.
pub(super) struct StreamFinalizer {
    meter: Arc<UsageMeter>,
    tenant_id: Uuid,
    environment_id: Uuid,
    model_name: String,
    request_id: Uuid,
    started: Instant,
    usage: Option<Usage>,
    status_code: u16,
    forwarded_any: bool,
    guard: InFlightGuard,
    _ticket: RequestTicket,
}

impl StreamFinalizer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        meter: Arc<UsageMeter>,
        tenant_id: Uuid,
        environment_id: Uuid,
        model_name: String,
        request_id: Uuid,
        started: Instant,
        guard: InFlightGuard,
        ticket: RequestTicket,
    ) -> Self {
        Self {
            meter,
            tenant_id,
            environment_id,
            model_name,
            request_id,
            started,
            usage: None,
            // Until told otherwise, assume the client went away mid-stream.
            status_code: 499,
            forwarded_any: false,
            guard,
            _ticket: ticket,
        }
    }

    pub fn set_usage(&mut self, usage: Usage) {
        self.usage = Some(usage);
    }

    pub fn set_status(&mut self, status: u16) {
        self.status_code = status;
    }

    pub fn mark_forwarded(&mut self) {
        self.forwarded_any = true;
    }
}

impl Drop for StreamFinalizer {
    fn drop(&mut self) {
        let latency_ms = self.started.elapsed().as_millis() as u64;
        self.guard.runtime().observe_latency(latency_ms);

        // Nothing reached the client: not billable, nothing to record.
        if !self.forwarded_any {
            return;
        }

        let usage = self.usage.unwrap_or_default();
        self.meter.record(UsageEvent {
            request_id: self.request_id,
            tenant_id: self.tenant_id,
            environment_id: self.environment_id,
            model_name: std::mem::take(&mut self.model_name),
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            latency_ms,
            status_code: self.status_code,
            timestamp: Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scanner_captures_last_usage_and_done() {
        let mut scanner = SseScanner::new(64 * 1024);
        scanner.feed(b"data: {\"choices\":[{\"delta\":{\"content\":\"hi\"}}]}\n\n");
        assert!(scanner.last_usage().is_none());

        scanner.feed(
            b"data: {\"choices\":[],\"usage\":{\"prompt_tokens\":8,\"completion_tokens\":3}}\n\n",
        );
        let usage = scanner.last_usage().unwrap();
        assert_eq!((usage.prompt_tokens, usage.completion_tokens), (8, 3));

        scanner.feed(b"data: [DONE]\n\n");
        assert!(scanner.saw_done());
    }

    #[test]
    fn scanner_handles_chunks_split_mid_line() {
        let mut scanner = SseScanner::new(64 * 1024);
        scanner.feed(b"data: {\"usage\":{\"prompt_to");
        assert!(scanner.last_usage().is_none());
        scanner.feed(b"kens\":5,\"completion_tokens\":7}}\n\n");
        let usage = scanner.last_usage().unwrap();
        assert_eq!((usage.prompt_tokens, usage.completion_tokens), (5, 7));
    }

    #[test]
    fn later_usage_wins() {
        let mut scanner = SseScanner::new(64 * 1024);
        scanner.feed(b"data: {\"usage\":{\"prompt_tokens\":1,\"completion_tokens\":1}}\n");
        scanner.feed(b"data: {\"usage\":{\"prompt_tokens\":8,\"completion_tokens\":3}}\n");
        let usage = scanner.last_usage().unwrap();
        assert_eq!((usage.prompt_tokens, usage.completion_tokens), (8, 3));
    }

    #[test]
    fn oversized_unbroken_line_is_dropped_from_scanning() {
        let mut scanner = SseScanner::new(16);
        scanner.feed(&vec![b'x'; 64]);
        assert!(scanner.last_usage().is_none());
        // Scanning recovers on the next complete line.
        scanner.feed(b"\ndata: {\"usage\":{\"prompt_tokens\":2,\"completion_tokens\":2}}\n");
        assert!(scanner.last_usage().is_some());
    }
}
