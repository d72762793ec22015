use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;

use super::AppState;
use crate::state_token;

/// GET /auth — mint a state token and bounce the browser to the provider
/// authorize URL. With no signing secret configured the redirect carries no
/// state parameter, matching the disabled-verification mode on `/callback`.
pub async fn auth(State(app): State<AppState>) -> impl IntoResponse {
    let mut url = app.config.github.authorize_redirect_url();
    if let Some(secret) = &app.config.state.secret {
        let token = state_token::mint(secret, state_token::now_ms());
        url.push_str("&state=");
        url.push_str(&token);
    }
    tracing::debug!("redirecting to provider authorize endpoint");
    (StatusCode::FOUND, [(header::LOCATION, url)])
}
