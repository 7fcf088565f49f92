//! Response Override Types

use serde::{Deserialize, Serialize};

/// Default status code answered to webhook senders.
pub const DEFAULT_STATUS_CODE: u16 = 200;

/// The synthetic HTTP response a channel answers webhook senders with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseOverride {
    /// Status code of the synthesized reply.
    pub status_code: u16,
    /// Canned body, ignored in echo mode.
    #[serde(rename = "responseBody")]
    pub body: String,
    /// When set, the reply mirrors the captured request dump.
    #[serde(rename = "reflect")]
    pub echo: bool,
}

impl Default for ResponseOverride {
    fn default() -> Self {
        Self {
            status_code: DEFAULT_STATUS_CODE,
            body: String::new(),
            echo: true,
        }
    }
}

/// Administrative update payload, as posted by an observer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideUpdate {
    /// Canned body; empty or absent selects echo mode.
    #[serde(default)]
    pub response_body: Option<String>,
    /// Status code; absent means the default.
    #[serde(default)]
    pub status_code: Option<u16>,
    /// Explicit echo flag, overriding the body-derived default.
    #[serde(default)]
    pub reflect: Option<bool>,
}
