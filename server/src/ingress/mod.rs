//! Webhook Ingress
//!
//! Receives webhooks addressed by subdomain or path, captures them, and
//! forwards the capture to the channel's observer through the hub.

pub mod capture;
mod handlers;

pub use handlers::{channel_from_host, fallback, hook_by_path, ingest};
