//! HTTP read surface.
//!
//! Two data routes plus a health probe:
//!
//! - `GET /api/sensors` — catalog joined with live values
//! - `GET /api/sensors/{id}/history?range=<duration>` — windowed history
//! - `GET /health` — liveness probe, body `OK`
//!
//! CORS is wide open (`*`, GET/POST/OPTIONS) so a dashboard served from
//! another origin can call the API directly.

pub mod error;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use state::ApiState;

use std::net::SocketAddr;

use axum::http::Method;
use axum::routing::get;
use axum::Router;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Build the full router.
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/sensors", get(routes::sensors::list_sensors))
        .route(
            "/api/sensors/{id}/history",
            get(routes::history::get_history),
        )
        .route("/health", get(routes::health::health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}

/// Bind and serve the API in a background task.
///
/// Returns the bound address (useful with port 0 in tests). The server
/// drains gracefully when `token` is cancelled.
pub async fn spawn_api_server(
    port: u16,
    state: ApiState,
    token: CancellationToken,
) -> anyhow::Result<SocketAddr> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    let addr = listener.local_addr()?;

    info!("API server listening on {addr}");

    let app = router(state);
    tokio::spawn(async move {
        let shutdown = token.cancelled_owned();
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
        {
            error!("API server error: {e}");
        }
    });

    Ok(addr)
}

/// Minimal `/health`-only listener for services without a read surface.
pub async fn spawn_health_listener(
    port: u16,
    token: CancellationToken,
) -> anyhow::Result<SocketAddr> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    let addr = listener.local_addr()?;

    info!("health listener on {addr}");

    let app = Router::new().route("/health", get(routes::health::health));
    tokio::spawn(async move {
        let shutdown = token.cancelled_owned();
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
        {
            error!("health listener error: {e}");
        }
    });

    Ok(addr)
}
