//! Relay payload assembly and the HTML pages served to the browser.
//!
//! The popup page performs a two-way handshake with its opener: announce that
//! authorization is in progress (wildcard origin), wait for the opener to ask,
//! then answer to the opener's declared origin with a single string message of
//! the form `authorization:<provider>:<status>:<json>`.

use askama::Template;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::github::Permission;

/// Success shape of the result posted to the opener window.
#[derive(Debug, Serialize)]
pub struct SuccessPayload {
    pub token: String,
    pub scope: String,
    pub provider: String,
    pub user: String,
    pub permission: Permission,
    /// Pre-configured fields disclosed only to writers and admins.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Error shape of the result posted to the opener window.
#[derive(Debug, Serialize)]
pub struct ErrorPayload {
    pub error: String,
    pub provider: String,
}

/// The structured result delivered to the opener window.
#[derive(Debug)]
pub enum RelayPayload {
    Success(SuccessPayload),
    Error(ErrorPayload),
}

impl RelayPayload {
    pub fn status(&self) -> &'static str {
        match self {
            RelayPayload::Success(_) => "success",
            RelayPayload::Error(_) => "error",
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        match self {
            RelayPayload::Success(p) => serde_json::to_string(p),
            RelayPayload::Error(p) => serde_json::to_string(p),
        }
    }
}

/// The popup relay page. The payload JSON is embedded verbatim inside a
/// single-quoted script string, so its double quotes survive unescaped.
#[derive(Template)]
#[template(path = "relay.html")]
pub struct RelayPage<'a> {
    provider: &'a str,
    status: &'static str,
    payload: String,
}

impl<'a> RelayPage<'a> {
    pub fn new(provider: &'a str, payload: &RelayPayload) -> serde_json::Result<Self> {
        Ok(RelayPage {
            provider,
            status: payload.status(),
            payload: payload.to_json()?,
        })
    }
}

/// Fallback page with a bare login link to the provider authorize URL.
#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginPage {
    pub authorize_url: String,
}
