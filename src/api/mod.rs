//! HTTP surface of the gateway.
//!
//! Mounts the Mercado Livre integration under /api/ml:
//! - /api/ml/auth, /callback, /token, /refresh, /revoke — OAuth flow
//! - /api/ml/user — upstream profile passthrough
//! - /api/ml/products/* — cached/proxied search and detail
//! - /status — health check

pub mod routes;

use crate::SharedState;
use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub fn router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/status", get(routes::status))
        .nest("/api/ml", routes::ml_router(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
