// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn appointment_routes(state: Arc<AppConfig>) -> Router {
    // Public booking site
    let public_routes = Router::new()
        .route("/slots", get(handlers::get_slots))
        .route("/availability", get(handlers::check_availability))
        .route("/book", post(handlers::book_appointment));

    // Staff dashboard
    let protected_routes = Router::new()
        .route("/", get(handlers::list_appointments))
        .route("/manual", post(handlers::book_appointment_manual))
        .route("/{appointment_id}/complete", post(handlers::complete_appointment))
        .route("/{appointment_id}/cancel", post(handlers::cancel_appointment))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
