//! Request Capture
//!
//! Turns an inbound webhook into the wire dump and the structured
//! [`WebhookPayload`] observers receive.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::net::SocketAddr;

use axum::{
    body::Bytes,
    extract::ConnectInfo,
    http::{header, request::Parts, HeaderMap, Version},
};
use chrono::{DateTime, Utc};
use hooktap_common::{CapturedCookie, CapturedRequest, WebhookPayload};
use percent_encoding::percent_decode_str;

/// Headers the wire dump writes itself or leaves out.
const DUMP_EXCLUDED: [&str; 3] = ["Host", "Transfer-Encoding", "Trailer"];

/// Capture time format, RFC 1123 with a fixed UTC zone.
const RFC1123: &str = "%a, %d %b %Y %H:%M:%S UTC";

/// Build the payload for one webhook.
pub fn capture(channel: &str, parts: &Parts, body: &Bytes, now: DateTime<Utc>) -> WebhookPayload {
    let request = captured_request(parts, body);
    let dump = dump(&request, body);

    WebhookPayload {
        listener: channel.to_string(),
        dump,
        url: request.url.clone(),
        unix_timestamp: now.timestamp(),
        timestamp: now.format(RFC1123).to_string(),
        request,
    }
}

/// Structured view of the request.
pub fn captured_request(parts: &Parts, body: &Bytes) -> CapturedRequest {
    let host = request_host(parts);
    let request_uri = parts
        .uri
        .path_and_query()
        .map_or_else(|| parts.uri.path().to_string(), ToString::to_string);
    let (proto_major, proto_minor) = proto_version(parts.version);

    let mut headers: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in &parts.headers {
        if name == header::HOST {
            continue;
        }
        headers
            .entry(canonical_header_key(name.as_str()))
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }

    let transfer_encoding: Vec<String> = parts
        .headers
        .get_all(header::TRANSFER_ENCODING)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|v| v.trim().to_ascii_lowercase())
        .filter(|v| !v.is_empty())
        .collect();

    let content_length = parts
        .headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<i64>().ok())
        .unwrap_or(if transfer_encoding.is_empty() { 0 } else { -1 });

    let mut form = BTreeMap::new();
    if let Some(query) = parts.uri.query() {
        parse_urlencoded(query, &mut form);
    }
    if is_form_body(&parts.headers) {
        parse_urlencoded(&String::from_utf8_lossy(body), &mut form);
    }

    let remote_addr = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_default();

    CapturedRequest {
        request_url: format!("http://{host}{request_uri}"),
        host,
        method: parts.method.to_string(),
        url: request_uri.clone(),
        header: headers,
        cookies: parse_cookies(&parts.headers),
        proto: format!("HTTP/{proto_major}.{proto_minor}"),
        proto_major,
        proto_minor,
        content_length,
        form,
        transfer_encoding,
        remote_addr,
        request_uri,
        body: String::from_utf8_lossy(body).into_owned(),
    }
}

/// HTTP/1.1 wire dump: request line, `Host`, sorted headers, blank line, body.
pub fn dump(request: &CapturedRequest, body: &Bytes) -> String {
    let mut out = String::new();
    let _ = write!(
        out,
        "{} {} HTTP/{}.{}\r\n",
        request.method, request.request_uri, request.proto_major, request.proto_minor
    );
    if !request.host.is_empty() {
        let _ = write!(out, "Host: {}\r\n", request.host);
    }

    let chunked = request.transfer_encoding.iter().any(|te| te == "chunked");
    if chunked {
        out.push_str("Transfer-Encoding: chunked\r\n");
    }

    for (name, values) in &request.header {
        if DUMP_EXCLUDED.contains(&name.as_str()) {
            continue;
        }
        for value in values {
            let _ = write!(out, "{name}: {value}\r\n");
        }
    }
    out.push_str("\r\n");

    let text = String::from_utf8_lossy(body);
    if chunked {
        if !body.is_empty() {
            let _ = write!(out, "{:x}\r\n{text}\r\n", body.len());
        }
        out.push_str("0\r\n\r\n");
    } else {
        out.push_str(&text);
    }
    out
}

/// `content-type` -> `Content-Type`.
pub fn canonical_header_key(name: &str) -> String {
    let mut upper = true;
    name.chars()
        .map(|c| {
            let out = if upper {
                c.to_ascii_uppercase()
            } else {
                c.to_ascii_lowercase()
            };
            upper = c == '-';
            out
        })
        .collect()
}

fn request_host(parts: &Parts) -> String {
    parts
        .headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| parts.uri.authority().map(ToString::to_string))
        .unwrap_or_default()
}

const fn proto_version(version: Version) -> (u8, u8) {
    match version {
        Version::HTTP_09 => (0, 9),
        Version::HTTP_10 => (1, 0),
        Version::HTTP_2 => (2, 0),
        Version::HTTP_3 => (3, 0),
        _ => (1, 1),
    }
}

fn is_form_body(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("application/x-www-form-urlencoded"))
}

fn parse_urlencoded(input: &str, form: &mut BTreeMap<String, Vec<String>>) {
    for pair in input.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        form.entry(decode_component(key))
            .or_default()
            .push(decode_component(value));
    }
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}

fn parse_cookies(headers: &HeaderMap) -> Vec<CapturedCookie> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            let name = name.trim();
            (!name.is_empty()).then(|| CapturedCookie {
                name: name.to_string(),
                value: value.trim().trim_matches('"').to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use axum::http::Request;
    use chrono::TimeZone;

    use super::*;

    fn parts(builder: axum::http::request::Builder) -> Parts {
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn canonical_keys() {
        assert_eq!(canonical_header_key("content-type"), "Content-Type");
        assert_eq!(canonical_header_key("x-github-event"), "X-Github-Event");
        assert_eq!(canonical_header_key("ACCEPT"), "Accept");
    }

    #[test]
    fn dump_matches_wire_layout() {
        let p = parts(
            Request::post("/?x=1")
                .header("host", "abc.hooks.test")
                .header("content-type", "application/json")
                .header("content-length", "7"),
        );
        let body = Bytes::from_static(br#"{"a":1}"#);
        let request = captured_request(&p, &body);

        assert_eq!(
            dump(&request, &body),
            "POST /?x=1 HTTP/1.1\r\nHost: abc.hooks.test\r\nContent-Length: 7\r\nContent-Type: application/json\r\n\r\n{\"a\":1}"
        );
    }

    #[test]
    fn chunked_body_is_rechunked() {
        let p = parts(
            Request::post("/")
                .header("host", "h")
                .header("transfer-encoding", "chunked"),
        );
        let body = Bytes::from_static(b"hello");
        let request = captured_request(&p, &body);

        assert_eq!(request.content_length, -1);
        assert_eq!(request.transfer_encoding, vec!["chunked"]);
        assert_eq!(
            dump(&request, &body),
            "POST / HTTP/1.1\r\nHost: h\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n0\r\n\r\n"
        );
    }

    #[test]
    fn structured_fields() {
        let p = parts(
            Request::post("/path?q=a+b&q=%21")
                .header("host", "abc.hooks.test:8080")
                .header("cookie", "session=xyz; theme=\"dark\"")
                .header("content-type", "application/x-www-form-urlencoded")
                .header("x-one", "1")
                .header("x-one", "2"),
        );
        let body = Bytes::from_static(b"field=v%20w&empty");
        let r = captured_request(&p, &body);

        assert_eq!(r.host, "abc.hooks.test:8080");
        assert_eq!(r.method, "POST");
        assert_eq!(r.url, "/path?q=a+b&q=%21");
        assert_eq!(r.request_url, "http://abc.hooks.test:8080/path?q=a+b&q=%21");
        assert_eq!(r.proto, "HTTP/1.1");
        assert_eq!(r.header["X-One"], vec!["1", "2"]);
        assert!(!r.header.contains_key("Host"));
        assert_eq!(r.form["q"], vec!["a b", "!"]);
        assert_eq!(r.form["field"], vec!["v w"]);
        assert_eq!(r.form["empty"], vec![""]);
        assert_eq!(r.cookies.len(), 2);
        assert_eq!(r.cookies[1].name, "theme");
        assert_eq!(r.cookies[1].value, "dark");
        assert_eq!(r.content_length, 0);
        assert_eq!(r.body, "field=v%20w&empty");
    }

    #[test]
    fn payload_timestamps() {
        let p = parts(Request::get("/").header("host", "abc.hooks.test"));
        let now = Utc.with_ymd_and_hms(2023, 11, 14, 22, 13, 20).unwrap();
        let payload = capture("abc", &p, &Bytes::new(), now);

        assert_eq!(payload.listener, "abc");
        assert_eq!(payload.url, "/");
        assert_eq!(payload.unix_timestamp, 1_700_000_000);
        assert_eq!(payload.timestamp, "Tue, 14 Nov 2023 22:13:20 UTC");
        assert_eq!(payload.dump, "GET / HTTP/1.1\r\nHost: abc.hooks.test\r\n\r\n");
    }
}
