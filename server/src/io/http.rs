use std::path::Path;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post, put};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::services::ServeDir;
use tracing::{info, warn};

use crate::handler::{connection, events, local, remote, sites, transfer};
use crate::state::AppState;

/// All API routes plus the WebSocket, with the UI assets in `static_dir`
/// served for every other path when that directory exists.
pub fn build_router(state: AppState, static_dir: &Path) -> Router {
    let api = Router::new()
        .route("/api/connect", post(connection::connect))
        .route("/api/disconnect", post(connection::disconnect))
        .route("/api/connections", get(connection::connections))
        .route("/api/remote/list", get(remote::list))
        .route("/api/remote/mkdir", post(remote::mkdir))
        .route("/api/remote/delete", post(remote::delete))
        .route("/api/remote/rename", post(remote::rename))
        .route("/api/remote/chmod", post(remote::chmod))
        .route("/api/transfer/upload-local", post(transfer::upload_local))
        .route("/api/transfer/download", post(transfer::download))
        .route("/api/transfer/download-dir", post(transfer::download))
        .route(
            "/api/transfer/upload",
            post(transfer::upload).layer(DefaultBodyLimit::disable()),
        )
        .route("/api/transfers", get(transfer::list))
        .route("/api/transfers/clear", post(transfer::clear))
        .route("/api/local/list", get(local::list))
        .route("/api/local/info", get(local::info))
        .route("/api/local/mkdir", post(local::mkdir))
        .route("/api/local/delete", post(local::delete))
        .route("/api/local/rename", post(local::rename))
        .route("/api/sites", get(sites::list).post(sites::create))
        .route("/api/sites/:id", put(sites::update).delete(sites::delete))
        .route("/ws", get(events::ws))
        .with_state(state);

    if static_dir.is_dir() {
        api.fallback_service(ServeDir::new(static_dir))
    } else {
        warn!(
            "Static directory {} not found; serving the API only",
            static_dir.display()
        );
        api
    }
}

/// Serve `router` on `listener` until `shutdown` is cancelled. In-flight
/// requests are allowed to finish.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    info!("HTTP server stopped");
    Ok(())
}
