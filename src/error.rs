use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("ブラウザ初期化エラー: {0}")]
    BrowserInit(String),

    #[error("ナビゲーションエラー: {0}")]
    Navigation(String),

    #[error("セレクタ待機タイムアウト: {0}")]
    SelectorTimeout(String),

    #[error("抽出エラー: {0}")]
    Extraction(String),

    #[error("JavaScript実行エラー: {0}")]
    JavaScript(String),

    #[error("CDPエラー: {0}")]
    Cdp(String),

    #[error("JSONパースエラー: {0}")]
    Json(String),

    #[error("タイムアウト: {0}")]
    Timeout(String),

    #[error("CSV書き込みエラー: {0}")]
    Persistence(#[from] csv::Error),

    #[error("ファイル操作エラー: {0}")]
    FileIO(#[from] std::io::Error),
}

impl ScraperError {
    /// HTTPエラーレスポンスに付与する種別ラベル
    pub fn kind(&self) -> &'static str {
        match self {
            Self::BrowserInit(_) => "browser_init",
            Self::Navigation(_) => "navigation",
            Self::SelectorTimeout(_) => "selector_timeout",
            Self::Extraction(_) => "extraction",
            Self::JavaScript(_) => "javascript",
            Self::Cdp(_) => "cdp",
            Self::Json(_) => "json",
            Self::Timeout(_) => "timeout",
            Self::Persistence(_) => "persistence",
            Self::FileIO(_) => "file_io",
        }
    }

    /// ページロード中にリトライ対象となるエラーか
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Navigation(_)
                | Self::SelectorTimeout(_)
                | Self::Timeout(_)
                | Self::JavaScript(_)
        )
    }
}
