//! Observer Frame Protocol
//!
//! Deliveries travel as UTF-8 text frames. When several payloads are queued
//! for the same observer they are coalesced into one frame, joined by a single
//! newline byte. Keepalive uses transport-level ping/pong and never appears in
//! text frames.

/// Separator between coalesced messages inside one text frame.
pub const FRAME_SEPARATOR: char = '\n';

/// Append `message` to a frame under construction, inserting the separator
/// when the frame already holds a message.
pub fn push_message(frame: &mut String, message: &str) {
    if !frame.is_empty() {
        frame.push(FRAME_SEPARATOR);
    }
    frame.push_str(message);
}

/// Split a received text frame back into its logical messages, in order.
///
/// Empty segments are skipped; payloads are compact JSON and never contain a
/// raw newline.
pub fn split_frame(frame: &str) -> impl Iterator<Item = &str> {
    frame.split(FRAME_SEPARATOR).filter(|s| !s.is_empty())
}
