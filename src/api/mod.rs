//! HTTP debug surface over a running simulator.
//!
//! Read endpoints return the same documents the device answers over
//! JSON-RPC:
//! - `GET /state`: the full [`Snapshot`](crate::sim::types::Snapshot)
//! - `GET /es/status`, `/es/mode`, `/em/status`, `/bat/status`, `/pv/status`,
//!   `/wifi/status`
//!
//! `POST /es/mode` takes an `ES.SetMode` config object as its body.

mod handlers;
mod types;

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tracing::info;

use crate::sim::engine::BatterySimulator;

pub use types::ErrorResponse;

/// Shared handle every handler reads from. The simulator does its own locking.
pub type AppState = Arc<BatterySimulator>;

/// Builds the axum router with all API routes.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/state", get(handlers::get_state))
        .route("/es/status", get(handlers::get_es_status))
        .route(
            "/es/mode",
            get(handlers::get_es_mode).post(handlers::post_es_mode),
        )
        .route("/em/status", get(handlers::get_em_status))
        .route("/bat/status", get(handlers::get_bat_status))
        .route("/pv/status", get(handlers::get_pv_status))
        .route("/wifi/status", get(handlers::get_wifi_status))
        .with_state(state)
}

/// Binds to `addr` and serves the API until `shutdown` resolves.
///
/// # Errors
///
/// Returns an `io::Error` if the listener cannot bind or the server fails.
pub async fn serve(
    state: AppState,
    addr: SocketAddr,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> io::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "API server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("API server stopped");
    Ok(())
}
