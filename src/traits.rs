use async_trait::async_trait;
use serde_json::Value;

use crate::error::ScraperError;

/// ブラウザページ操作の抽象
///
/// chromiumoxideのPageをラップする。テストではモック実装に差し替える。
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// URLへナビゲートし、loadイベントまで待機
    async fn navigate(&self, url: &str) -> Result<(), ScraperError>;

    /// ページコンテキストでJavaScriptを評価し、結果をJSON値で返す
    ///
    /// Promiseを返すスクリプトは解決を待つ。
    async fn evaluate(&self, script: &str) -> Result<Value, ScraperError>;

    /// デバッグ用フルページスクリーンショット (PNG)
    async fn screenshot_png(&self) -> Result<Vec<u8>, ScraperError>;

    /// ページを閉じる
    async fn close(&mut self) -> Result<(), ScraperError>;
}
