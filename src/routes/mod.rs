pub mod classify;
pub mod health;
pub mod sessions;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::middleware::{cors, rate_limit};
use crate::AppState;

pub fn router(state: AppState, public_rps: u32) -> Router {
    let base_routes = Router::new().route("/health", get(health::health));

    let public_api = Router::new()
        .route("/api/surveys", get(sessions::list_surveys))
        .route("/api/sessions", post(sessions::create_session))
        .route(
            "/api/sessions/:id",
            get(sessions::get_session).delete(sessions::delete_session),
        )
        .route("/api/sessions/:id/actions", post(sessions::apply_action))
        .route("/api/sessions/:id/reset", post(sessions::reset_session))
        .route("/api/sessions/:id/result", get(sessions::get_result))
        .route("/api/sessions/:id/summary", post(sessions::create_summary))
        .route("/api/classify/speech", post(classify::classify_speech))
        .layer(axum::middleware::from_fn_with_state(
            rate_limit::new_rps_state(public_rps),
            rate_limit::rps_middleware,
        ));

    base_routes
        .merge(public_api)
        .with_state(state)
        .layer(cors::permissive_cors())
        .layer(TraceLayer::new_for_http())
}
