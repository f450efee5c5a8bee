use std::net::SocketAddr;
use std::path::PathBuf;
use thumbgate::config::ThumbGateConfig;
use thumbgate::router;

/// Thumbgate standalone server entry point.
///
/// Initializes tracing, validates configuration, and starts the HTTP server
/// answering thumbnail and pass-through image requests.
///
/// # Configuration
/// Environment variables:
/// - `THUMBGATE_CACHE_DIR`: long-term source cache root (default: "./cache")
/// - `THUMBGATE_PUBLIC_DIR`: output file directory (default: "./public")
/// - `THUMBGATE_CDN_BASE`: internal CDN base URL fetched over plain http
/// - `PORT`: HTTP listen port (default: 8080)
/// - `RUST_LOG`: Logging verbosity (default: "thumbgate=debug,tower_http=debug")
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured logging with environment-based filtering
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "thumbgate=debug,tower_http=debug".into()),
        )
        .init();

    tracing::info!("Starting thumbgate server");

    let cfg = ThumbGateConfig {
        cache_dir: std::env::var("THUMBGATE_CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./cache")),
        public_dir: std::env::var("THUMBGATE_PUBLIC_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./public")),
        cdn_base_url: std::env::var("THUMBGATE_CDN_BASE").ok(),
        ..ThumbGateConfig::default()
    };
    cfg.validate()?;

    let app = router(cfg);

    let port = std::env::var("PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse::<u16>()
        .unwrap_or(8080);

    // Bind to 0.0.0.0 for external access (required for containerized deployment)
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Server listening on {}", addr);

    // Rate limiting keys on the peer IP, which requires connect info
    axum::serve(
        tokio::net::TcpListener::bind(addr).await?,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
