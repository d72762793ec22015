use serde::Deserialize;
use std::path::Path;

use crate::state_token::DEFAULT_TTL_MS;

/// Top-level configuration parsed from TOML.
#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub github: GithubConfig,
    #[serde(default)]
    pub state: StateConfig,
    /// Extra JSON fields disclosed in the relay payload when the
    /// authenticated user holds write or admin permission on the repo.
    #[serde(default)]
    pub extra_writable: serde_json::Map<String, serde_json::Value>,
}

/// Server-level configuration.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8788
}

/// GitHub OAuth app and API endpoints. The endpoint URLs default to
/// github.com and exist as fields so tests can point the broker at a mock.
#[derive(Debug, Deserialize)]
pub struct GithubConfig {
    /// Provider name echoed in the postMessage protocol.
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_scope")]
    pub scope: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    /// `owner/name` of the repository whose collaborator permission gates the
    /// extra-writable fields.
    #[serde(default)]
    pub repo: String,
    #[serde(default = "default_authorize_url")]
    pub authorize_url: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
}

impl GithubConfig {
    /// The provider authorize URL with `response_type`, `client_id` and
    /// `scope` attached. `/auth` appends a freshly minted `state` to this;
    /// the fallback login page links it bare.
    pub fn authorize_redirect_url(&self) -> String {
        format!(
            "{}?response_type=code&client_id={}&scope={}",
            self.authorize_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.scope),
        )
    }
}

fn default_provider() -> String {
    "github".to_string()
}

fn default_scope() -> String {
    "repo,read:user".to_string()
}

fn default_authorize_url() -> String {
    "https://github.com/login/oauth/authorize".to_string()
}

fn default_token_url() -> String {
    "https://github.com/login/oauth/access_token".to_string()
}

fn default_api_base_url() -> String {
    "https://api.github.com".to_string()
}

/// State-token signing configuration.
#[derive(Debug, Deserialize)]
pub struct StateConfig {
    /// Secret used to sign state tokens. Leaving it unset disables state
    /// verification entirely — a deliberate bypass mode for trusted or
    /// internal deployments.
    pub secret: Option<String>,
    #[serde(default = "default_ttl_ms")]
    pub ttl_ms: u64,
}

impl Default for StateConfig {
    fn default() -> Self {
        StateConfig {
            secret: None,
            ttl_ms: default_ttl_ms(),
        }
    }
}

fn default_ttl_ms() -> u64 {
    DEFAULT_TTL_MS
}

/// Load and validate config from a TOML file, applying environment variable overrides.
pub fn load_config(path: &Path) -> Result<Config, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config file '{}': {}", path.display(), e))?;

    let mut config: Config =
        toml::from_str(&content).map_err(|e| format!("Failed to parse TOML config: {e}"))?;

    apply_env_overrides(&mut config)?;
    validate(&config)?;

    Ok(config)
}

/// Apply environment variable overrides. The names match the original
/// Cloudflare Worker bindings so existing deployments carry over unchanged.
fn apply_env_overrides(config: &mut Config) -> Result<(), String> {
    if let Ok(val) = std::env::var("GH_SCOPE") {
        config.github.scope = val;
    }
    if let Ok(val) = std::env::var("GH_CLIENT_ID") {
        config.github.client_id = val;
    }
    if let Ok(val) = std::env::var("GH_CLIENT_SECRET") {
        config.github.client_secret = val;
    }
    if let Ok(val) = std::env::var("GH_REPO") {
        config.github.repo = val;
    }
    if let Ok(val) = std::env::var("STATE_SECRET") {
        config.state.secret = Some(val);
    }
    if let Ok(val) = std::env::var("EXTRA_WRITABLE_JSON") {
        config.extra_writable = serde_json::from_str(&val)
            .map_err(|e| format!("EXTRA_WRITABLE_JSON is not a valid JSON object: {e}"))?;
    }
    Ok(())
}

/// Validate the entire configuration. Returns an error string on failure.
fn validate(config: &Config) -> Result<(), String> {
    validate_github(&config.github)?;
    validate_state(&config.state)?;
    Ok(())
}

fn validate_github(github: &GithubConfig) -> Result<(), String> {
    if github.client_id.is_empty() {
        return Err("github.client_id is required".to_string());
    }
    if github.client_secret.is_empty() {
        return Err("github.client_secret is required".to_string());
    }
    if github.repo.is_empty() {
        return Err("github.repo is required (owner/name)".to_string());
    }

    for (name, url) in [
        ("github.authorize_url", &github.authorize_url),
        ("github.token_url", &github.token_url),
        ("github.api_base_url", &github.api_base_url),
    ] {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(format!("{name} must be a valid HTTP(S) URL"));
        }
        if url.ends_with('/') {
            return Err(format!("{name} must not have a trailing slash"));
        }
    }

    Ok(())
}

fn validate_state(state: &StateConfig) -> Result<(), String> {
    if state.ttl_ms == 0 {
        return Err("state.ttl_ms must be greater than zero".to_string());
    }
    if matches!(state.secret.as_deref(), Some("")) {
        return Err(
            "state.secret must not be empty — leave it unset to disable verification".to_string(),
        );
    }
    if state.secret.is_none() {
        tracing::warn!(
            "state.secret is not set — state verification is DISABLED; \
             any callback will be accepted without an anti-forgery check"
        );
    }
    Ok(())
}
