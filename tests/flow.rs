//! End-to-end router tests: `/auth`, `/callback`, and the fallback page
//! against a wiremock-backed provider.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::json;
use tower::ServiceExt;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use cms_oauth_broker::config::Config;
use cms_oauth_broker::routes::{router, AppState};
use cms_oauth_broker::state_token;

const SECRET: &str = "integration-secret";

fn test_config(mock_base: &str) -> Config {
    toml::from_str(&format!(
        r#"
[github]
client_id = "iv1.test"
client_secret = "test-secret"
repo = "acme/site"
authorize_url = "{mock_base}/login/oauth/authorize"
token_url = "{mock_base}/login/oauth/access_token"
api_base_url = "{mock_base}"

[state]
secret = "{SECRET}"

[extra_writable]
cms_backend = "git-gateway"
media_folder = "static/img"
"#
    ))
    .unwrap()
}

async fn get(app: axum::Router, uri: &str) -> (StatusCode, String) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8_lossy(&body).into_owned())
}

/// Mount the happy-path provider: token exchange, current user, permission.
async fn mount_provider(server: &MockServer, permission: &str) {
    Mock::given(method("POST"))
        .and(path("/login/oauth/access_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "gho_abc",
            "scope": "repo,read:user",
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "login": "octocat" })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/site/collaborators/octocat/permission"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "permission": permission })),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn auth_redirects_with_verifying_state() {
    let server = MockServer::start().await;
    let app = router(AppState::new(test_config(&server.uri())));

    let response = app
        .oneshot(Request::builder().uri("/auth").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    let location = response.headers()["location"].to_str().unwrap();
    let url = Url::parse(location).unwrap();
    assert_eq!(url.path(), "/login/oauth/authorize");

    let pairs: Vec<_> = url.query_pairs().collect();
    assert!(pairs.iter().any(|(k, v)| k == "response_type" && v == "code"));
    let state = pairs
        .iter()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.to_string())
        .expect("redirect must carry a state parameter");
    assert!(state_token::verify(
        Some(&state),
        SECRET,
        state_token::DEFAULT_TTL_MS,
        state_token::now_ms(),
    ));
}

#[tokio::test]
async fn stale_state_short_circuits_before_any_provider_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login/oauth/access_token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let app = router(AppState::new(test_config(&server.uri())));

    // Minted ten minutes ago against a five-minute TTL.
    let stale = state_token::mint(SECRET, state_token::now_ms() - 10 * 60 * 1000);
    let (status, body) = get(app, &format!("/callback?code=abc&state={stale}")).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, "Session expired");
    server.verify().await;
}

#[tokio::test]
async fn missing_state_is_rejected() {
    let server = MockServer::start().await;
    let app = router(AppState::new(test_config(&server.uri())));

    let (status, body) = get(app, "/callback?code=abc").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, "Session expired");
}

#[tokio::test]
async fn write_permission_merges_extra_fields() {
    let server = MockServer::start().await;
    mount_provider(&server, "write").await;
    let app = router(AppState::new(test_config(&server.uri())));

    let state = state_token::mint(SECRET, state_token::now_ms());
    let (status, body) = get(app, &format!("/callback?code=abc&state={state}")).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("'authorization:github:success:"));
    assert!(body.contains(r#""token":"gho_abc""#));
    assert!(body.contains(r#""user":"octocat""#));
    assert!(body.contains(r#""permission":"write""#));
    assert!(body.contains(r#""cms_backend":"git-gateway""#));
    assert!(body.contains(r#""media_folder":"static/img""#));
    assert!(body.contains(r#"window.opener.postMessage("authorizing:github", "*")"#));
}

#[tokio::test]
async fn read_permission_omits_extra_fields() {
    let server = MockServer::start().await;
    mount_provider(&server, "read").await;
    let app = router(AppState::new(test_config(&server.uri())));

    let state = state_token::mint(SECRET, state_token::now_ms());
    let (status, body) = get(app, &format!("/callback?code=abc&state={state}")).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""permission":"read""#));
    assert!(!body.contains("cms_backend"));
    assert!(!body.contains("media_folder"));
}

#[tokio::test]
async fn provider_refusal_relays_error_payload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login/oauth/access_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": "access_denied",
        })))
        .mount(&server)
        .await;
    let app = router(AppState::new(test_config(&server.uri())));

    let state = state_token::mint(SECRET, state_token::now_ms());
    let (status, body) = get(app, &format!("/callback?code=abc&state={state}")).await;

    // Refusals ride the normal relay channel, not an HTTP error.
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("'authorization:github:error:"));
    assert!(body.contains(r#""error":"access_denied""#));
    assert!(body.contains(r#""provider":"github""#));
    assert!(!body.contains(r#""token""#));
}

#[tokio::test]
async fn user_fetch_failure_is_500_with_detail() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login/oauth/access_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "gho_abc",
            "scope": "repo",
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;
    let app = router(AppState::new(test_config(&server.uri())));

    let state = state_token::mint(SECRET, state_token::now_ms());
    let (status, body) = get(app, &format!("/callback?code=abc&state={state}")).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains("user lookup failed"));
    assert!(body.contains("502"));
}

#[tokio::test]
async fn no_secret_disables_state_verification() {
    let server = MockServer::start().await;
    mount_provider(&server, "admin").await;
    let mut config = test_config(&server.uri());
    config.state.secret = None;
    let app = router(AppState::new(config));

    // No state parameter at all, accepted anyway.
    let (status, body) = get(app, "/callback?code=abc").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""permission":"admin""#));
}

#[tokio::test]
async fn fallback_serves_stateless_login_link() {
    let server = MockServer::start().await;
    let app = router(AppState::new(test_config(&server.uri())));

    let (status, body) = get(app, "/somewhere-else").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Login with GitHub"));
    assert!(body.contains("login/oauth/authorize?response_type=code"));
    assert!(!body.contains("state="));
}
