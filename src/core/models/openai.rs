//! OpenAI-compatible wire types
//!
//! The proxy forwards request and response bodies byte-for-byte; it only
//! needs the routing fields (`model`, `stream`) and the usage block. The
//! remainder of each body is carried as untyped JSON so unknown fields
//! survive the round trip.

use serde::{Deserialize, Serialize};

/// Minimal parse of an inbound inference request
///
/// `extra` retains every field the control plane does not interpret, so
/// re-serialization reproduces the client body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceRequest {
    /// Requested model
    pub model: String,
    /// Whether the client requested a streamed response
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    /// All other fields, forwarded unchanged
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl InferenceRequest {
    /// Whether this request wants server-sent events
    pub fn is_streaming(&self) -> bool {
        self.stream.unwrap_or(false)
    }
}

/// Usage statistics block
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Prompt tokens
    #[serde(default)]
    pub prompt_tokens: u32,
    /// Completion tokens
    #[serde(default)]
    pub completion_tokens: u32,
    /// Total tokens
    #[serde(default)]
    pub total_tokens: u32,
}

/// Envelope for extracting a usage block from a response body or SSE chunk
#[derive(Debug, Clone, Deserialize)]
pub struct UsageEnvelope {
    /// Usage block, when present
    pub usage: Option<Usage>,
}

impl UsageEnvelope {
    /// Parse a JSON body or chunk, returning its usage block if any
    pub fn extract(payload: &[u8]) -> Option<Usage> {
        serde_json::from_slice::<UsageEnvelope>(payload)
            .ok()
            .and_then(|e| e.usage)
    }
}

/// Model catalog listing (OpenAI `GET /v1/models` shape)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelList {
    /// Always `list`
    pub object: String,
    /// Catalog entries
    pub data: Vec<ModelInfo>,
}

/// One model catalog entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Model identifier
    pub id: String,
    /// Always `model`
    pub object: String,
    /// Creation timestamp (unix seconds)
    pub created: u64,
    /// Owning organization
    pub owned_by: String,
}

/// Simple SSE event for proxy-originated frames
#[derive(Debug, Clone, Default)]
pub struct SseEvent {
    /// Event type
    pub event: Option<String>,
    /// Event data
    pub data: String,
}

impl SseEvent {
    /// Set the event type
    pub fn event(mut self, event: &str) -> Self {
        self.event = Some(event.to_string());
        self
    }

    /// Set the event data
    pub fn data(mut self, data: &str) -> Self {
        self.data = data.to_string();
        self
    }

    /// Serialize to SSE wire bytes
    pub fn to_bytes(&self) -> bytes::Bytes {
        let mut result = String::new();
        if let Some(event) = &self.event {
            result.push_str(&format!("event: {}\n", event));
        }
        result.push_str(&format!("data: {}\n\n", self.data));
        bytes::Bytes::from(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_fields_survive_round_trip() {
        let body = serde_json::json!({
            "model": "llama-3-8b",
            "messages": [{"role": "user", "content": "hi"}],
            "temperature": 0.2,
            "stream": false,
            "some_vendor_extension": {"nested": true}
        });
        let req: InferenceRequest = serde_json::from_value(body.clone()).unwrap();
        assert_eq!(req.model, "llama-3-8b");
        assert!(!req.is_streaming());
        let back = serde_json::to_value(&req).unwrap();
        assert_eq!(back, body);
    }

    #[test]
    fn usage_extraction_tolerates_absence() {
        let with = br#"{"choices":[],"usage":{"prompt_tokens":8,"completion_tokens":12,"total_tokens":20}}"#;
        let without = br#"{"choices":[{"delta":{"content":"hi"}}]}"#;
        let usage = UsageEnvelope::extract(with).unwrap();
        assert_eq!(usage.prompt_tokens, 8);
        assert_eq!(usage.completion_tokens, 12);
        assert!(UsageEnvelope::extract(without).is_none());
        assert!(UsageEnvelope::extract(b"[DONE]").is_none());
    }

    #[test]
    fn sse_event_wire_format() {
        let plain = SseEvent::default().data("[DONE]");
        assert_eq!(&plain.to_bytes()[..], b"data: [DONE]\n\n");
        let err = SseEvent::default().event("error").data("{}");
        assert_eq!(&err.to_bytes()[..], b"event: error\ndata: {}\n\n");
    }
}
