use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::task::{Context, Poll};

use tower::Service;
use tracing::info;

use crate::config::ScrapeConfig;
use crate::error::ScraperError;
use crate::listing::{ListingScraper, ProductRecord};

/// スクレイピングリクエスト
#[derive(Debug, Clone)]
pub struct ScrapeRequest {
    pub url: String,
    pub config: ScrapeConfig,
}

impl ScrapeRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            config: ScrapeConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ScrapeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.config.headless = headless;
        self
    }
}

/// スクレイピング結果
#[derive(Debug)]
pub struct ScrapeResult {
    pub products: Vec<ProductRecord>,
    pub csv_path: PathBuf,
}

/// tower::Serviceを実装したスクレイパーサービス
///
/// 1リクエストにつき1ブラウザセッションを起動する。
#[derive(Debug, Clone, Default)]
pub struct ScraperService {
    // 将来的な拡張用（レートリミット、キャッシュなど）
}

impl ScraperService {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Service<ScrapeRequest> for ScraperService {
    type Response = ScrapeResult;
    type Error = ScraperError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ScrapeRequest) -> Self::Future {
        info!("スクレイピングリクエスト受信: url={}", req.url);

        Box::pin(async move {
            let csv_path = req.config.csv_path.clone();
            let mut scraper = ListingScraper::new(req.config);

            // スクレイピング実行（セッション解放込み）
            let products = scraper.execute(&req.url).await?;

            info!(
                "スクレイピング完了: {}件, csv={:?}",
                products.len(),
                csv_path
            );

            Ok(ScrapeResult { products, csv_path })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scrape_request_builder() {
        let req = ScrapeRequest::new("https://example.test/listing").with_headless(false);

        assert_eq!(req.url, "https://example.test/listing");
        assert!(!req.config.headless);
    }

    #[test]
    fn test_scrape_request_with_config() {
        let config = ScrapeConfig::new().with_max_attempts(5);
        let req = ScrapeRequest::new("https://example.test/listing").with_config(config);

        assert_eq!(req.config.max_attempts, 5);
    }
}
