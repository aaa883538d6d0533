pub mod admin;
pub mod appointments;
pub mod health;
pub mod reservations;

use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/api/admin/owners", post(admin::register_owner))
        .route(
            "/api/appointments",
            get(appointments::list_appointments).post(appointments::create_appointment),
        )
        .route(
            "/api/appointments/:id",
            get(appointments::get_appointment).delete(appointments::delete_appointment),
        )
        .route(
            "/api/appointments/:id/segments",
            get(appointments::list_segments),
        )
        .route(
            "/api/appointments/:id/reservations",
            get(reservations::list_reservations),
        )
        .route("/api/reservations", post(reservations::create_reservation))
        .route(
            "/api/reservations/:id",
            delete(reservations::cancel_reservation),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
