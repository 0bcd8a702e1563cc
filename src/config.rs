use std::path::PathBuf;
use std::time::Duration;

/// スクレイプ設定
///
/// タイムアウト・リトライ回数は設定で変更可能。
/// DOMセレクタは対象サイト固有のため定数のまま（listing::scraper参照）。
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    /// ヘッドレスモード
    pub headless: bool,
    /// 自動化フィンガープリントを隠すステルスモード
    pub stealth: bool,
    /// デバッグモード（失敗時スクリーンショットなど）
    pub debug: bool,
    /// ページロードの最大試行回数
    pub max_attempts: u32,
    /// ナビゲーション全体のタイムアウト
    pub nav_timeout: Duration,
    /// コンテンツグリッド出現待機のタイムアウト
    pub selector_timeout: Duration,
    /// オートスクロールの1ステップ量 (px)
    pub scroll_step_px: u32,
    /// オートスクロールのステップ間隔 (ms)
    pub scroll_interval_ms: u64,
    /// CSV出力先（毎回上書き）
    pub csv_path: PathBuf,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            headless: true,
            stealth: true,
            debug: false,
            max_attempts: 3,
            nav_timeout: Duration::from_secs(60),
            selector_timeout: Duration::from_secs(15),
            scroll_step_px: 100,
            scroll_interval_ms: 100,
            csv_path: PathBuf::from("job.csv"),
        }
    }
}

impl ScrapeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn with_stealth(mut self, stealth: bool) -> Self {
        self.stealth = stealth;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_nav_timeout(mut self, timeout: Duration) -> Self {
        self.nav_timeout = timeout;
        self
    }

    pub fn with_selector_timeout(mut self, timeout: Duration) -> Self {
        self.selector_timeout = timeout;
        self
    }

    pub fn with_csv_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.csv_path = path.into();
        self
    }
}

/// HTTPサーバー設定
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// リッスンポート
    pub port: u16,
    /// 同時ブラウザセッション数の上限
    pub max_sessions: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8001,
            max_sessions: 2,
        }
    }
}

impl ServerConfig {
    /// 環境変数から設定を読み込む
    ///
    /// - `SCRAPER_PORT`: リッスンポート (デフォルト: 8001)
    /// - `SCRAPER_MAX_SESSIONS`: 同時セッション上限 (デフォルト: 2)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let port = std::env::var("SCRAPER_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.port);

        let max_sessions = std::env::var("SCRAPER_MAX_SESSIONS")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|&n| n > 0)
            .unwrap_or(defaults.max_sessions);

        Self { port, max_sessions }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ScrapeConfig::default();
        assert!(config.headless);
        assert!(config.stealth);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.nav_timeout, Duration::from_secs(60));
        assert_eq!(config.selector_timeout, Duration::from_secs(15));
        assert_eq!(config.csv_path, PathBuf::from("job.csv"));
    }

    #[test]
    fn test_config_builder() {
        let config = ScrapeConfig::new()
            .with_headless(false)
            .with_max_attempts(5)
            .with_nav_timeout(Duration::from_secs(120))
            .with_csv_path("/tmp/out.csv");

        assert!(!config.headless);
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.nav_timeout, Duration::from_secs(120));
        assert_eq!(config.csv_path, PathBuf::from("/tmp/out.csv"));
    }

    #[test]
    fn test_server_config_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 8001);
        assert_eq!(config.max_sessions, 2);
    }
}
