use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tokio::task;

use crate::common::{
    GenerationRequest, PriceHistory, SentimentRequest, SentimentResponse, TextGenResponse,
};
use crate::error::Error;
use crate::llm::Llm;

pub async fn start_server(port: u16, llm: Llm) -> Result<()> {
    let app = router(Arc::new(llm));

    let addr = format!("127.0.0.1:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    log::info!("Server started at {}", &addr);

    axum::serve(listener, app).await?;

    Ok(())
}

pub fn router(llm: Arc<Llm>) -> Router {
    Router::new()
        .route("/api/complete", post(complete))
        .route("/api/sentiment", post(sentiment))
        .route("/api/headlines/:ticker", get(headlines))
        .route("/api/history/:ticker", get(history))
        .with_state(llm)
}

pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = match &err {
            Error::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            Error::Fetch { .. } | Error::DataProvider { .. } => StatusCode::BAD_GATEWAY,
            Error::ModelLoad { .. } | Error::Generation(_) | Error::Classification(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<task::JoinError> for ApiError {
    fn from(err: task::JoinError) -> Self {
        log::error!("Model task failed: {err}");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

async fn complete(
    State(llm): State<Arc<Llm>>,
    Json(payload): Json<GenerationRequest>,
) -> Result<Json<TextGenResponse>, ApiError> {
    let text = task::spawn_blocking(move || llm.complete_text(&payload)).await??;
    Ok(Json(TextGenResponse::new(text)))
}

async fn sentiment(
    State(llm): State<Arc<Llm>>,
    Json(payload): Json<SentimentRequest>,
) -> Result<Json<SentimentResponse>, ApiError> {
    let label = task::spawn_blocking(move || {
        let model = payload
            .model
            .unwrap_or_else(|| llm.config().sentiment_model.clone());
        let device = payload.device.unwrap_or(llm.config().device);
        llm.analyze_sentiment(&payload.text, &model, device)
    })
    .await??;
    Ok(Json(SentimentResponse::new(label)))
}

async fn headlines(
    State(llm): State<Arc<Llm>>,
    Path(ticker): Path<String>,
) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(llm.stock_headlines(&ticker).await?))
}

async fn history(
    State(llm): State<Arc<Llm>>,
    Path(ticker): Path<String>,
) -> Result<Json<PriceHistory>, ApiError> {
    Ok(Json(llm.stock_history(&ticker).await?))
}
