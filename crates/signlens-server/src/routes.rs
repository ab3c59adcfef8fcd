//! Axum router.

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::app::AppState;
use crate::handlers::{api, websocket_handler};

/// Frame uploads carry base64 images.
const MAX_BODY_BYTES: usize = 50 * 1024 * 1024;

/// Builds the application router.
///
/// - `GET {ws_path}` - streaming translation over WebSocket
/// - `GET /api/health` - liveness plus active session count
/// - `GET /api/translate/vocabulary` - known signs
/// - `POST /api/translate/session/start` - allocate a stored session
/// - `GET /api/translate/session/{id}` - stored translation history
/// - `POST /api/translate` - keyed single-frame classification
/// - `POST /api/translate/frames` - one-shot classification
pub fn create_router(state: AppState, ws_path: &str) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(ws_path, get(websocket_handler))
        .route("/api/health", get(api::health))
        .route("/api/translate", post(api::translate))
        .route("/api/translate/vocabulary", get(api::vocabulary))
        .route("/api/translate/session/start", post(api::start_session))
        .route("/api/translate/session/{id}", get(api::get_session))
        .route("/api/translate/frames", post(api::translate_frames))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
