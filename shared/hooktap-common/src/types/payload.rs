//! Webhook Payload Types
//!
//! The JSON document fanned out to observers for every captured webhook.
//! `CapturedRequest` keeps the PascalCase field names observers already
//! key on (`request.Method`, `request.Host`, ...).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One captured webhook, as delivered to the channel's observer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookPayload {
    /// Channel the webhook was addressed to.
    pub listener: String,
    /// HTTP/1.1 wire dump of the request (request line, headers, body).
    pub dump: String,
    /// Request URL (path and query).
    pub url: String,
    /// Capture time as Unix seconds.
    #[serde(rename = "unixtimestamp")]
    pub unix_timestamp: i64,
    /// Capture time formatted per RFC 1123.
    pub timestamp: String,
    /// Structured view of the request.
    pub request: CapturedRequest,
}

/// A cookie sent with the captured request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CapturedCookie {
    /// Cookie name.
    pub name: String,
    /// Cookie value.
    pub value: String,
}

/// Structured view of an inbound HTTP request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CapturedRequest {
    pub host: String,
    pub method: String,
    #[serde(rename = "URL")]
    pub url: String,
    /// Canonicalized header name to all of its values, in arrival order.
    pub header: BTreeMap<String, Vec<String>>,
    pub cookies: Vec<CapturedCookie>,
    /// Protocol string, e.g. `HTTP/1.1`.
    pub proto: String,
    pub proto_major: u8,
    pub proto_minor: u8,
    /// Declared body length, `-1` when unknown.
    pub content_length: i64,
    /// Query parameters merged with an urlencoded form body.
    pub form: BTreeMap<String, Vec<String>>,
    pub transfer_encoding: Vec<String>,
    pub remote_addr: String,
    #[serde(rename = "RequestURI")]
    pub request_uri: String,
    /// Absolute URL as seen by the sender.
    #[serde(rename = "req_url")]
    pub request_url: String,
    pub body: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_uses_observer_field_names() {
        let payload = WebhookPayload {
            listener: "abc".into(),
            dump: "POST / HTTP/1.1\r\n\r\n".into(),
            url: "/".into(),
            unix_timestamp: 1_700_000_000,
            timestamp: "Tue, 14 Nov 2023 22:13:20 UTC".into(),
            request: CapturedRequest {
                method: "POST".into(),
                request_uri: "/".into(),
                ..CapturedRequest::default()
            },
        };

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["listener"], "abc");
        assert_eq!(json["unixtimestamp"], 1_700_000_000);
        assert_eq!(json["request"]["Method"], "POST");
        assert_eq!(json["request"]["RequestURI"], "/");
        assert!(json["request"].get("req_url").is_some());
        assert!(json["request"].get("ProtoMajor").is_some());
    }
}
