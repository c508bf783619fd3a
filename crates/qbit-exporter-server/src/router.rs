use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
    routing::get,
};
use qbit_exporter_metrics::{CONTENT_TYPE, Collector, render_text};
use tower_http::trace::TraceLayer;

const LANDING_PAGE: &str = "qBittorrent exporter\n\nMetrics are served at /metrics\n";

pub struct AppState {
    pub collector: Arc<Collector>,
}

impl AppState {
    pub fn new(collector: Arc<Collector>) -> Self {
        Self { collector }
    }
}

pub fn app_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(landing_page))
        .route("/metrics", get(prometheus_metrics))
        .route("/health/live", get(health_live))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn prometheus_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let families = state.collector.collect().await;
    (
        [(header::CONTENT_TYPE, CONTENT_TYPE)],
        render_text(&families),
    )
}

pub async fn health_live() -> impl IntoResponse {
    StatusCode::OK
}

async fn landing_page() -> impl IntoResponse {
    LANDING_PAGE
}
