//! The provider callback: verify the echoed state token, exchange the code,
//! resolve user and permission, and render the relay page.
//!
//! The sequence is strictly ordered — each step needs the prior result — and
//! every step maps to its own [`CallbackError`] variant, so a failure surfaces
//! as a distinct, testable kind instead of one catch-all.

use std::collections::HashMap;

use askama::Template;
use axum::extract::{RawQuery, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};

use super::AppState;
use crate::github::{ExchangeOutcome, GithubError};
use crate::relay::{ErrorPayload, RelayPage, RelayPayload, SuccessPayload};
use crate::state_token;

#[derive(Debug, thiserror::Error)]
pub enum CallbackError {
    /// State token missing, malformed, signature mismatch, or outside TTL.
    #[error("Session expired")]
    ExpiredState,
    #[error("token exchange failed: {0}")]
    Exchange(#[source] GithubError),
    #[error("user lookup failed: {0}")]
    User(#[source] GithubError),
    #[error("permission lookup failed: {0}")]
    Permission(#[source] GithubError),
    #[error("relay payload encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("relay page rendering failed: {0}")]
    Render(#[from] askama::Error),
}

impl IntoResponse for CallbackError {
    fn into_response(self) -> Response {
        match self {
            CallbackError::ExpiredState => {
                (StatusCode::UNAUTHORIZED, "Session expired").into_response()
            }
            // The popup is a same-origin diagnostic surface, not a public
            // API; the error detail is deliberately included in the body.
            other => (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()).into_response(),
        }
    }
}

/// GET /callback — the provider redirects here with `code` and `state`.
pub async fn callback(
    State(app): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<Html<String>, CallbackError> {
    let params = parse_query(query.as_deref().unwrap_or(""));
    let github_cfg = &app.config.github;

    // Short-circuits before any network call. Skipped entirely when no
    // signing secret is configured.
    if let Some(secret) = &app.config.state.secret {
        let verified = state_token::verify(
            params.get("state").map(String::as_str),
            secret,
            app.config.state.ttl_ms,
            state_token::now_ms(),
        );
        if !verified {
            tracing::info!("rejecting callback with missing or stale state token");
            return Err(CallbackError::ExpiredState);
        }
    }

    let outcome = app
        .github
        .exchange_code(
            params.get("code").map(String::as_str),
            params.get("state").map(String::as_str),
        )
        .await
        .map_err(CallbackError::Exchange)?;

    let payload = match outcome {
        // A refusal travels down the normal relay channel as an error-status
        // payload; the popup protocol has no wire-level error code.
        ExchangeOutcome::Refused { error } => {
            tracing::info!(%error, "provider refused the code exchange");
            RelayPayload::Error(ErrorPayload {
                error,
                provider: github_cfg.provider.clone(),
            })
        }
        ExchangeOutcome::Issued {
            access_token,
            scope,
        } => {
            let user = app
                .github
                .fetch_user(&access_token)
                .await
                .map_err(CallbackError::User)?;
            let permission = app
                .github
                .fetch_permission(&user.login, &github_cfg.repo, &access_token)
                .await
                .map_err(CallbackError::Permission)?;
            tracing::info!(user = %user.login, ?permission, "authorization completed");

            let extra = if permission.grants_write() {
                app.config.extra_writable.clone()
            } else {
                Default::default()
            };
            RelayPayload::Success(SuccessPayload {
                token: access_token,
                scope,
                provider: github_cfg.provider.clone(),
                user: user.login,
                permission,
                extra,
            })
        }
    };

    let page = RelayPage::new(&github_cfg.provider, &payload)?.render()?;
    Ok(Html(page))
}

/// Flatten the raw query string: later duplicate keys overwrite earlier ones,
/// and a key without a value becomes a boolean-true flag. Values are used as
/// received, without percent-decoding.
fn parse_query(query: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    for item in query.split('&') {
        let mut kv = item.splitn(2, '=');
        let key = kv.next().unwrap_or_default();
        if key.is_empty() {
            continue;
        }
        let value = match kv.next() {
            Some(v) if !v.is_empty() => v,
            _ => "true",
        };
        params.insert(key.to_string(), value.to_string());
    }
    params
}
