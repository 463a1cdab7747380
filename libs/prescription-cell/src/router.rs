// libs/prescription-cell/src/router.rs
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn prescription_routes(state: Arc<AppConfig>) -> Router {
    // Exam records are staff-only
    let protected_routes = Router::new()
        .route("/", get(handlers::list_prescriptions).post(handlers::save_prescription))
        .route("/preview", post(handlers::preview_prescription))
        .route("/{prescription_id}", get(handlers::get_prescription))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
