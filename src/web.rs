use anyhow::Result;
use axum::{
    Router,
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::info;
use uuid::Uuid;

use crate::actions;
use crate::flights_repo::FlightsRepository;
use crate::poller::CycleReceiver;
use crate::watchlist::WatchlistHandle;

// App state shared by all handlers
#[derive(Clone)]
pub struct AppState {
    pub flights: FlightsRepository,
    pub cycles: CycleReceiver,
    pub watchlist: WatchlistHandle,
    /// `None` when no Prometheus recorder is installed
    pub metrics: Option<PrometheusHandle>,
    pub recent_limit: usize,
    pub stale_after: Option<chrono::Duration>,
}

// Middleware for request logging with correlation ID
async fn request_logging_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let request_id = Uuid::new_v4().to_string()[..8].to_string();
    let start_time = Instant::now();

    info!("Started {} {} [{}]", method, path, request_id);

    let response = next.run(request).await;
    let duration = start_time.elapsed();
    let status = response.status();

    metrics::histogram!("http_request_duration_seconds").record(duration.as_secs_f64());
    info!(
        "Completed {} {} [{}] {} in {:.2}ms",
        method,
        path,
        request_id,
        status.as_u16(),
        duration.as_secs_f64() * 1000.0
    );

    response
}

async fn render_metrics(State(state): State<AppState>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()).into_response(),
        None => (StatusCode::NOT_FOUND, "Metrics not enabled").into_response(),
    }
}

/// Build the application router without binding a listener
pub fn build_router(state: AppState) -> Router {
    // Create API sub-router rooted at "/data"
    let api_router = Router::new()
        .route("/flights/current", get(actions::get_current_flights))
        .route("/flights/recent", get(actions::get_recent_flights))
        .route("/flights/{identifier}", get(actions::get_flight))
        .route(
            "/watchlist",
            get(actions::get_watchlist).put(actions::replace_watchlist),
        );

    Router::new()
        .nest("/data", api_router)
        .route("/health", get(actions::get_health))
        .route("/metrics", get(render_metrics))
        .with_state(state)
        .layer(middleware::from_fn(request_logging_middleware))
        .layer(CorsLayer::permissive())
}

pub async fn start_web_server(
    interface: String,
    port: u16,
    state: AppState,
    shutdown: CancellationToken,
) -> Result<()> {
    info!("Starting web server on {}:{}", interface, port);
    actions::init_server_start_time();

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", interface, port)).await?;
    info!("Web server listening on http://{}:{}", interface, port);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("Web server stopped");
    Ok(())
}
