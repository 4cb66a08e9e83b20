pub mod error;
pub mod routes;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use std::future::Future;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use watermill_core::paths;

pub use state::AppState;

/// Build the axum Router with all routes and middleware.
/// Used by `serve_on()` and available for integration testing.
pub fn build_router(app_state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let index = ServeFile::new(paths::index_html(&app_state.static_dir));
    let assets = ServeDir::new(&app_state.static_dir);

    Router::new()
        // Live feed
        .route("/api/events", get(routes::events::sse_events))
        .route("/api/status", get(routes::status::get_status))
        // Collaborator endpoints
        .route("/disqualify_coin", post(routes::coins::disqualify_coin))
        .route(
            "/upload_screenshot",
            post(routes::screenshots::upload_screenshot),
        )
        .route(
            "/upload_screenshot_lens",
            post(routes::screenshots::upload_screenshot_lens),
        )
        .route(
            "/start_investigation",
            post(routes::investigation::start_investigation),
        )
        .route(
            "/stop_investigation",
            post(routes::investigation::stop_investigation),
        )
        // Viewer
        .route_service("/", index)
        .nest_service(paths::STATIC_URL_PREFIX, assets)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

/// Serve on a pre-bound listener until `shutdown` resolves.
///
/// Taking a bound `TcpListener` lets the caller read the actual port first
/// (useful when `port = 0` and the OS picks a free port).
pub async fn serve_on<F>(
    app_state: AppState,
    listener: tokio::net::TcpListener,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let actual_port = listener.local_addr()?.port();
    let app = build_router(app_state);

    tracing::info!("watermill feed listening on http://localhost:{actual_port}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
