//! HTTPゲートウェイ
//!
//! `POST /api/v1/indead` でターゲットURLを受け取り、スクレイプ結果を
//! JSONで返す。同時に起動するブラウザセッション数はセマフォで制限する。

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::{error, info};

use crate::config::{ScrapeConfig, ServerConfig};
use crate::error::ScraperError;
use crate::listing::{ListingScraper, ProductRecord};

/// スクレイプ実行の抽象（テストではモックに差し替える）
#[async_trait]
pub trait ScrapeExecutor: Send + Sync {
    async fn scrape(
        &self,
        url: &str,
        config: ScrapeConfig,
    ) -> Result<Vec<ProductRecord>, ScraperError>;
}

/// 実ブラウザでスクレイプを実行する
pub struct BrowserExecutor;

#[async_trait]
impl ScrapeExecutor for BrowserExecutor {
    async fn scrape(
        &self,
        url: &str,
        config: ScrapeConfig,
    ) -> Result<Vec<ProductRecord>, ScraperError> {
        let mut scraper = ListingScraper::new(config);
        scraper.execute(url).await
    }
}

/// サーバー共有状態
#[derive(Clone)]
pub struct AppState {
    pub config: ScrapeConfig,
    /// 同時ブラウザセッション数の上限
    pub sessions: Arc<Semaphore>,
    pub executor: Arc<dyn ScrapeExecutor>,
}

impl AppState {
    pub fn new(config: ScrapeConfig, max_sessions: usize) -> Self {
        Self {
            config,
            sessions: Arc::new(Semaphore::new(max_sessions)),
            executor: Arc::new(BrowserExecutor),
        }
    }
}

/// リクエストボディ
///
/// フィールド名 `skill` は既存クライアントとのワイヤ互換のため固定。
#[derive(Debug, Deserialize)]
pub struct ScrapeBody {
    pub skill: String,
}

#[derive(Debug, Serialize)]
struct OkResponse {
    status: &'static str,
    list: Vec<ProductRecord>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    status: &'static str,
    kind: &'static str,
    error: String,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/indead", post(scrape_handler))
        .with_state(state)
}

async fn scrape_handler(
    State(state): State<AppState>,
    Json(body): Json<ScrapeBody>,
) -> Response {
    info!("Scrape request received: {}", body.skill);

    // セッション数を制限（ブラウザプロセスの無制限増殖を防ぐ）
    let _permit = match state.sessions.clone().acquire_owned().await {
        Ok(permit) => permit,
        Err(_) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    status: "error",
                    kind: "admission",
                    error: "session limiter closed".to_string(),
                }),
            )
                .into_response();
        }
    };

    match state.executor.scrape(&body.skill, state.config.clone()).await {
        Ok(list) => (
            StatusCode::OK,
            Json(OkResponse {
                status: "ok",
                list,
            }),
        )
            .into_response(),
        Err(e) => {
            error!("Scrape failed ({}): {}", e.kind(), e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    status: "error",
                    kind: e.kind(),
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}

/// サーバーを起動
pub async fn serve(scrape: ScrapeConfig, server: ServerConfig) -> anyhow::Result<()> {
    let state = AppState::new(scrape, server.max_sessions);
    let app = create_router(state);

    let addr: SocketAddr = ([0, 0, 0, 0], server.port).into();
    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
