use clap::Parser;
use std::path::PathBuf;

use cms_oauth_broker::config;
use cms_oauth_broker::routes::{self, AppState};

/// CMS OAuth broker — completes GitHub's three-legged OAuth flow for
/// browser-based CMS popups without server-side session storage.
#[derive(Parser, Debug)]
#[command(name = "cms-oauth-broker", version, about)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Port to listen on (overrides config file)
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut cfg = match config::load_config(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    // CLI --port overrides config
    if let Some(port) = cli.port {
        cfg.server.port = port;
    }

    tracing::info!(
        provider = %cfg.github.provider,
        repo = %cfg.github.repo,
        state_verification = cfg.state.secret.is_some(),
        "Configuration loaded successfully"
    );

    let bind_addr = format!("{}:{}", cfg.server.host, cfg.server.port);
    let app = routes::router(AppState::new(cfg));

    tracing::info!("Listening on {bind_addr}");

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("Failed to bind to {bind_addr}: {e}");
            std::process::exit(1);
        });

    axum::serve(listener, app).await.unwrap_or_else(|e| {
        tracing::error!("Server error: {e}");
        std::process::exit(1);
    });
}
