use axum::http::{header, Method};
use tower_http::cors::{Any, CorsLayer};

/// Browser clients may call the survey API from any origin.
pub fn permissive_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::RETRY_AFTER])
        .allow_origin(Any)
}
