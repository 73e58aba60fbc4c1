//! Capture lifecycle event types.
//!
//! Events originate from an external capture collaborator observing a host
//! browsing context. Each carries the opaque correlation key linking the
//! phases of one exchange; the store merges events bearing the same key into
//! a single record, in delivery order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A single HTTP header as captured. Order is preserved and duplicate names
/// are permitted, matching what the capture layer delivers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Case-insensitive header lookup; first match wins.
pub fn header_value<'h>(headers: &'h [Header], name: &str) -> Option<&'h str> {
    headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.as_str())
}

/// Request body as delivered by the capture layer.
///
/// Bodies are opaque or lightly-parsed text -- no protocol-level decoding is
/// performed here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BodyDescriptor {
    /// Raw body text.
    Raw(String),
    /// Structured body (parsed form data or JSON).
    Structured(serde_json::Value),
}

impl BodyDescriptor {
    /// Stringified form used as rule-matching input.
    pub fn as_text(&self) -> String {
        match self {
            BodyDescriptor::Raw(s) => s.clone(),
            BodyDescriptor::Structured(v) => v.to_string(),
        }
    }

    /// Whether the descriptor carries no usable content.
    pub fn is_empty(&self) -> bool {
        match self {
            BodyDescriptor::Raw(s) => s.is_empty(),
            BodyDescriptor::Structured(v) => v.is_null(),
        }
    }
}

/// Response metadata captured when the response headers arrive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseInfo {
    pub status_code: u16,
    pub status_line: String,
    pub headers: Vec<Header>,
    /// When the capture layer observed the response.
    pub captured_at: DateTime<Utc>,
    /// Whether the response was served from the browser cache.
    pub from_cache: bool,
}

/// A lifecycle event emitted by the capture layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CaptureEvent {
    /// Request line and headers became available.
    RequestStarted {
        id: String,
        method: String,
        url: String,
        #[serde(default)]
        headers: Vec<Header>,
    },
    /// The request body became available.
    RequestBody { id: String, body: BodyDescriptor },
    /// Response status and headers became available.
    ResponseStarted {
        id: String,
        status_code: u16,
        status_line: String,
        #[serde(default)]
        headers: Vec<Header>,
        #[serde(default)]
        from_cache: bool,
    },
}

impl CaptureEvent {
    /// The correlation key this event belongs to.
    pub fn id(&self) -> &str {
        match self {
            CaptureEvent::RequestStarted { id, .. } => id,
            CaptureEvent::RequestBody { id, .. } => id,
            CaptureEvent::ResponseStarted { id, .. } => id,
        }
    }

    /// Parse a capture event from its JSON wire form.
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// Decomposed pieces of a captured URL.
///
/// Parsing never fails visibly: anything the `url` crate rejects yields
/// empty components, matching the best-effort nature of the capture layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlParts {
    pub scheme: String,
    pub host: String,
    pub path: String,
    pub query: String,
}

impl UrlParts {
    pub fn parse(raw: &str) -> Self {
        match url::Url::parse(raw) {
            Ok(u) => UrlParts {
                scheme: u.scheme().to_string(),
                host: u.host_str().unwrap_or("").to_ascii_lowercase(),
                path: u.path().to_string(),
                query: u.query().unwrap_or("").to_string(),
            },
            Err(_) => UrlParts::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn url_parts_from_full_url() {
        let parts = UrlParts::parse("https://API.Example.com/login?next=%2Fhome");
        assert_eq!(parts.scheme, "https");
        assert_eq!(parts.host, "api.example.com");
        assert_eq!(parts.path, "/login");
        assert_eq!(parts.query, "next=%2Fhome");
    }

    #[test]
    fn url_parts_unparseable_yields_empty() {
        let parts = UrlParts::parse("not a url");
        assert_eq!(parts, UrlParts::default());
        assert_eq!(parts.host, "");
    }

    #[test]
    fn websocket_scheme_preserved() {
        let parts = UrlParts::parse("wss://push.example.com/socket");
        assert_eq!(parts.scheme, "wss");
        assert_eq!(parts.host, "push.example.com");
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let headers = vec![
            Header::new("Content-Type", "application/json"),
            Header::new("AUTHORIZATION", "Bearer abc"),
        ];
        assert_eq!(
            header_value(&headers, "authorization"),
            Some("Bearer abc")
        );
        assert_eq!(header_value(&headers, "cookie"), None);
    }

    #[test]
    fn header_lookup_first_duplicate_wins() {
        let headers = vec![
            Header::new("Set-Cookie", "a=1"),
            Header::new("Set-Cookie", "b=2"),
        ];
        assert_eq!(header_value(&headers, "set-cookie"), Some("a=1"));
    }

    #[test]
    fn body_descriptor_text_forms() {
        let raw = BodyDescriptor::Raw("user=alice".to_string());
        assert_eq!(raw.as_text(), "user=alice");
        assert!(!raw.is_empty());

        let structured = BodyDescriptor::Structured(json!({"user": "alice"}));
        assert!(structured.as_text().contains("alice"));
        assert!(BodyDescriptor::Raw(String::new()).is_empty());
        assert!(BodyDescriptor::Structured(serde_json::Value::Null).is_empty());
    }

    #[test]
    fn capture_event_wire_roundtrip() {
        let raw = r#"{"event":"request_started","id":"42","method":"GET","url":"https://example.com/","headers":[{"name":"Accept","value":"*/*"}]}"#;
        let event = CaptureEvent::from_json(raw).unwrap();
        assert_eq!(event.id(), "42");
        match &event {
            CaptureEvent::RequestStarted { method, .. } => assert_eq!(method, "GET"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn capture_event_rejects_unknown_shape() {
        assert!(CaptureEvent::from_json(r#"{"event":"nonsense"}"#).is_err());
    }
}
