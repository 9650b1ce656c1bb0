use axum::{
    Json, Router,
    extract::State,
    http::HeaderMap,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::output::format_srt;
use crate::pipeline::Pipeline;

const API_KEY_HEADER: &str = "x-api-key";

#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<Pipeline>,
    api_key: Option<String>,
}

impl AppState {
    pub fn new(pipeline: Pipeline, api_key: Option<String>) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            api_key: api_key.filter(|k| !k.is_empty()),
        }
    }

    fn authorize(&self, headers: &HeaderMap) -> Result<()> {
        let Some(expected) = &self.api_key else {
            return Ok(());
        };
        let provided = headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok());
        if provided == Some(expected.as_str()) {
            Ok(())
        } else {
            Err(Error::Auth("Invalid API key".to_string()))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TranscriptRequest {
    pub url: String,
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TranscriptResponse {
    pub srt: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/transcript", post(transcript))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn transcript(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<TranscriptRequest>,
) -> Result<Json<TranscriptResponse>> {
    state.authorize(&headers)?;

    let transcript = state
        .pipeline
        .transcribe_url(&request.url, request.language.as_deref())
        .await?;

    Ok(Json(TranscriptResponse {
        srt: format_srt(&transcript),
    }))
}

pub async fn serve(config: &AppConfig) -> anyhow::Result<()> {
    let pipeline = Pipeline::from_config(config)?;
    let app = router(AppState::new(pipeline, config.server.api_key.clone()));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!("listening on {}", listener.local_addr()?);
    if config.server.api_key.is_none() {
        log::warn!("no TRANSCRIPT_API_KEY configured; /transcript is unauthenticated");
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            log::info!("shutting down");
        })
        .await?;
    Ok(())
}
