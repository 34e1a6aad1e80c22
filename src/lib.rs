pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod naming;
pub mod storage;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use handlers::AppState;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Build the application router.
///
/// API routes take precedence; everything else falls through to the static
/// client in `public_dir`.
pub fn create_router(state: AppState) -> Router {
    // Text is held in memory, so cap the JSON body at the file limit.
    let text_limit = usize::try_from(state.config.max_file_size).unwrap_or(usize::MAX);
    let public_dir = state.config.public_dir.clone();

    Router::new()
        .route(
            "/upload",
            post(handlers::upload_files).layer(DefaultBodyLimit::disable()),
        )
        .route(
            "/save-text",
            post(handlers::save_text).layer(DefaultBodyLimit::max(text_limit)),
        )
        .route("/files", get(handlers::list_files))
        .route("/delete", post(handlers::delete_files))
        .route("/uploads/:name", get(handlers::download_file))
        .fallback_service(ServeDir::new(public_dir))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
