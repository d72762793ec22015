pub mod auth;
pub mod callback;

use std::sync::Arc;

use askama::Template;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;

use crate::config::Config;
use crate::github::GithubClient;
use crate::relay::LoginPage;

/// Shared, immutable per-process state. Everything here is read-only after
/// startup; requests never share mutable state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub github: GithubClient,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let github = GithubClient::new(&config.github);
        AppState {
            config: Arc::new(config),
            github,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/auth", get(auth::auth))
        .route("/callback", get(callback::callback))
        .fallback(get(login))
        .with_state(state)
}

/// Any path other than `/auth` and `/callback`: a static login link pointing
/// at the authorize URL without a state parameter. Following this link alone
/// never passes state verification later; it is kept as-is from the original
/// deployment rather than unified with `/auth`.
async fn login(State(app): State<AppState>) -> Response {
    let page = LoginPage {
        authorize_url: app.config.github.authorize_redirect_url(),
    };
    match page.render() {
        Ok(html) => Html(html).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("login page rendering failed: {e}"),
        )
            .into_response(),
    }
}
