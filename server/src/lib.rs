//! Hooktap Server
//!
//! Webhook debugger: inbound webhooks are captured and streamed live to the
//! observer connected for their channel, and answered with a configurable
//! reply.

pub mod api;
pub mod auth;
pub mod config;
pub mod format;
pub mod ingress;
pub mod pages;
pub mod responses;
pub mod ws;
