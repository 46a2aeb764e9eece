//! HTTP server bootstrap.

use std::net::SocketAddr;

use tracing::info;

use crate::router::build_router;
use crate::state::AppState;

/// Bind and serve the observer API until the process exits.
///
/// # Errors
///
/// Returns the bind or serve error from the runtime.
pub async fn serve(state: AppState, port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Observer listening");
    axum::serve(listener, build_router(state)).await
}
