use listing_scraper::config::{ScrapeConfig, ServerConfig};
use listing_scraper::server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ログ設定 (RUST_LOGで上書き可能)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let server_config = ServerConfig::from_env();
    let scrape_config = ScrapeConfig::default();

    server::serve(scrape_config, server_config).await
}
