//! Thin typed client for the GitHub OAuth and REST endpoints the broker uses.
//!
//! All calls are single-attempt; transport failures surface directly to the
//! caller and, through it, to the end user via the error relay path.

use serde::{Deserialize, Serialize};

use crate::config::GithubConfig;

const USER_AGENT: &str = "cms-oauth-broker";

#[derive(Debug, thiserror::Error)]
pub enum GithubError {
    #[error("request to {endpoint} failed: {source}")]
    Http {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{endpoint} returned HTTP {status}")]
    Status { endpoint: &'static str, status: u16 },
    #[error("unexpected response body from {endpoint}: {source}")]
    Decode {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("token endpoint response carried neither access_token nor error")]
    MalformedExchange,
}

/// Collaborator permission level on the configured repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    None,
    Read,
    Write,
    Admin,
}

impl Permission {
    /// Whether this level unlocks the extra-writable relay fields.
    pub fn grants_write(self) -> bool {
        matches!(self, Permission::Write | Permission::Admin)
    }
}

/// Outcome of the authorization-code exchange. GitHub answers 200 for error
/// bodies too, so the split is on body shape, never on HTTP status.
#[derive(Debug)]
pub enum ExchangeOutcome {
    Issued { access_token: String, scope: String },
    Refused { error: String },
}

/// The authenticated user, as returned by the current-user endpoint.
#[derive(Debug, Deserialize)]
pub struct User {
    pub login: String,
}

#[derive(Debug, Serialize)]
struct ExchangeRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<&'a str>,
    client_id: &'a str,
    client_secret: &'a str,
}

#[derive(Debug, Deserialize)]
struct ExchangeResponse {
    access_token: Option<String>,
    scope: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PermissionResponse {
    permission: Permission,
}

/// Client over the provider's token and REST endpoints. Cheap to clone; the
/// inner `reqwest::Client` is a shared connection pool.
#[derive(Clone)]
pub struct GithubClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    token_url: String,
    api_base_url: String,
}

impl GithubClient {
    pub fn new(github: &GithubConfig) -> Self {
        GithubClient {
            http: reqwest::Client::new(),
            client_id: github.client_id.clone(),
            client_secret: github.client_secret.clone(),
            token_url: github.token_url.clone(),
            api_base_url: github.api_base_url.clone(),
        }
    }

    /// Exchange an authorization code for an access token.
    ///
    /// `code` and `state` are passed through as received; absent parameters
    /// are omitted from the body and left for the provider to refuse.
    pub async fn exchange_code(
        &self,
        code: Option<&str>,
        state: Option<&str>,
    ) -> Result<ExchangeOutcome, GithubError> {
        let endpoint = "token endpoint";
        let body = ExchangeRequest {
            code,
            state,
            client_id: &self.client_id,
            client_secret: &self.client_secret,
        };
        let response = self
            .http
            .post(&self.token_url)
            // GitHub answers with form-encoding by default; ask for JSON.
            .header(reqwest::header::ACCEPT, "application/json")
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .json(&body)
            .send()
            .await
            .map_err(|source| GithubError::Http { endpoint, source })?;

        let parsed: ExchangeResponse = response
            .json()
            .await
            .map_err(|source| GithubError::Decode { endpoint, source })?;

        if let Some(error) = parsed.error {
            return Ok(ExchangeOutcome::Refused { error });
        }
        match parsed.access_token {
            Some(access_token) => Ok(ExchangeOutcome::Issued {
                access_token,
                scope: parsed.scope.unwrap_or_default(),
            }),
            None => Err(GithubError::MalformedExchange),
        }
    }

    /// Fetch the authenticated user. Non-2xx statuses are surfaced as
    /// [`GithubError::Status`] rather than being parsed.
    pub async fn fetch_user(&self, token: &str) -> Result<User, GithubError> {
        let endpoint = "current-user endpoint";
        let response = self
            .get(format!("{}/user", self.api_base_url), token)
            .send()
            .await
            .map_err(|source| GithubError::Http { endpoint, source })?;

        let status = response.status();
        if !status.is_success() {
            return Err(GithubError::Status {
                endpoint,
                status: status.as_u16(),
            });
        }
        response
            .json()
            .await
            .map_err(|source| GithubError::Decode { endpoint, source })
    }

    /// Fetch `user`'s collaborator permission on `repo` (`owner/name`).
    ///
    /// Any non-success status collapses to [`Permission::None`] — a user who
    /// cannot be looked up on the repo has no access to it.
    pub async fn fetch_permission(
        &self,
        user: &str,
        repo: &str,
        token: &str,
    ) -> Result<Permission, GithubError> {
        let endpoint = "collaborator-permission endpoint";
        let url = format!(
            "{}/repos/{}/collaborators/{}/permission",
            self.api_base_url, repo, user
        );
        let response = self
            .get(url, token)
            .send()
            .await
            .map_err(|source| GithubError::Http { endpoint, source })?;

        if !response.status().is_success() {
            return Ok(Permission::None);
        }
        let parsed: PermissionResponse = response
            .json()
            .await
            .map_err(|source| GithubError::Decode { endpoint, source })?;
        Ok(parsed.permission)
    }

    fn get(&self, url: String, token: &str) -> reqwest::RequestBuilder {
        self.http
            .get(url)
            .header(reqwest::header::AUTHORIZATION, format!("token {token}"))
            .header(reqwest::header::ACCEPT, "application/json")
            .header(reqwest::header::USER_AGENT, USER_AGENT)
    }
}
