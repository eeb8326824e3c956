use crate::metrics::Metrics;
use crate::report::status_label;
use crate::state::{DownloadStatus, StatusRecord};
use axum::body::Body;
use axum::extract::State;
use axum::http::{header::CONTENT_TYPE, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{routing::get, Json, Router};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Clone)]
pub struct HttpAppState {
    pub metrics: Arc<Metrics>,
    pub status: Arc<RwLock<StatusRecord>>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ApiStatus {
    pub game_name: String,
    pub status: DownloadStatus,
    pub status_text: &'static str,
    pub rate_kbps: f64,
    pub observed_at_unix: i64,
}

impl From<&StatusRecord> for ApiStatus {
    fn from(value: &StatusRecord) -> Self {
        Self {
            game_name: value.game_name.clone(),
            status: value.status,
            status_text: status_label(value.status),
            rate_kbps: value.rate_kbps,
            observed_at_unix: value.observed_at_unix,
        }
    }
}

pub fn build_router(metrics: Arc<Metrics>, status: Arc<RwLock<StatusRecord>>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics_handler))
        .route("/api/status", get(status_handler))
        .with_state(HttpAppState { metrics, status })
}

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn metrics_handler(State(state): State<HttpAppState>) -> Response {
    state.metrics.inc_scrape_count();
    match state.metrics.encode_metrics() {
        Ok(encoded) => {
            let mut response = Response::new(Body::from(encoded));
            response.headers_mut().insert(
                CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4"),
            );
            response
        }
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("ошибка кодирования метрик: {err}"),
        )
            .into_response(),
    }
}

async fn status_handler(State(state): State<HttpAppState>) -> impl IntoResponse {
    let guard = state.status.read().await;
    Json(ApiStatus::from(&*guard))
}
