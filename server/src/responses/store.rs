//! Response Override Store
//!
//! Channel name to its configured [`ResponseOverride`], backed by `DashMap`
//! so concurrent updates to different channels never contend on one lock.
//! Updates replace a channel's whole entry; the last writer wins.

use axum::http::StatusCode;
use dashmap::DashMap;
use hooktap_common::{OverrideUpdate, ResponseOverride, DEFAULT_STATUS_CODE};

use super::error::OverrideError;

/// Thread-safe store of per-channel response overrides.
#[derive(Debug, Default)]
pub struct ResponseStore {
    overrides: DashMap<String, ResponseOverride>,
}

impl ResponseStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current override for `channel`, created with defaults on first use.
    pub fn get(&self, channel: &str) -> ResponseOverride {
        if let Some(entry) = self.overrides.get(channel) {
            return entry.clone();
        }
        self.overrides
            .entry(channel.to_string())
            .or_default()
            .clone()
    }

    /// Apply a raw JSON update document to `channel`.
    ///
    /// A document of two bytes or less once trimmed (blank, `{}`) carries
    /// nothing to apply and leaves the channel as it is. Malformed input is
    /// rejected before anything is stored.
    pub fn update(&self, channel: &str, raw: &[u8]) -> Result<ResponseOverride, OverrideError> {
        if raw.trim_ascii().len() <= 2 {
            return Ok(self.get(channel));
        }
        let update = serde_json::from_slice::<OverrideUpdate>(raw)?;
        self.apply(channel, update)
    }

    /// Apply a parsed update to `channel`.
    ///
    /// A non-empty body turns echo off; an empty body turns echo on. Echo is
    /// always derived from the body, so `reflect` is accepted but ignored.
    pub fn apply(
        &self,
        channel: &str,
        update: OverrideUpdate,
    ) -> Result<ResponseOverride, OverrideError> {
        let status_code = update.status_code.unwrap_or(DEFAULT_STATUS_CODE);
        if StatusCode::from_u16(status_code).is_err() {
            return Err(OverrideError::InvalidStatusCode(status_code));
        }

        let body = update.response_body.unwrap_or_default();
        let echo = body.is_empty();
        let next = ResponseOverride {
            status_code,
            body,
            echo,
        };

        self.overrides.insert(channel.to_string(), next.clone());
        Ok(next)
    }

    /// Number of channels with an entry.
    pub fn len(&self) -> usize {
        self.overrides.len()
    }

    /// Whether no channel has an entry yet.
    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty()
    }
}
