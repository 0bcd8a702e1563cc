//! 商品リストスクレイパーライブラリ
//!
//! - ストアフロントの商品リストページをヘッドレスブラウザで開いて抽出
//! - 結果をCSV (`job.csv`) に保存し、HTTPエンドポイントでJSON返却
//!
//! # スクレイパー使用例
//!
//! ```rust,ignore
//! use listing_scraper::{ScraperService, ScrapeRequest};
//! use tower::Service;
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut service = ScraperService::new();
//!
//!     let request = ScrapeRequest::new("https://example.test/listing")
//!         .with_headless(false);
//!
//!     let result = service.call(request).await.unwrap();
//!     println!("Products: {}", result.products.len());
//! }
//! ```
//!
//! # サーバー使用例
//!
//! ```rust,ignore
//! use listing_scraper::config::{ScrapeConfig, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     listing_scraper::server::serve(
//!         ScrapeConfig::default(),
//!         ServerConfig::from_env(),
//!     )
//!     .await
//! }
//! ```

pub mod config;
pub mod error;
pub mod listing;
pub mod persist;
pub mod server;
pub mod service;
pub mod traits;

// 主要な型をリエクスポート
pub use config::{ScrapeConfig, ServerConfig};
pub use error::ScraperError;
pub use listing::{ColorVariant, ListingScraper, ProductRecord};
pub use service::{ScrapeRequest, ScrapeResult, ScraperService};
pub use traits::PageDriver;
