//! 商品リストスクレイパー実装

pub mod scraper;
pub mod types;

pub use scraper::ListingScraper;
pub use types::{ColorVariant, ProductRecord};
