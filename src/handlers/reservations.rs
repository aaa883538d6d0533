use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{CancelOutcome, Reservation, ReservationRequest, ReservationView};
use crate::services::notify::build_reservation_notice;
use crate::services::{appointments, auth, ledger};
use crate::state::AppState;

// POST /api/reservations
pub async fn create_reservation(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ReservationRequest>,
) -> Result<(StatusCode, Json<Reservation>), AppError> {
    validate_request(&request)?;

    let reservation = {
        let mut db = state.db()?;
        ledger::reserve(&mut db, &request)?
    };

    notify_reserved(&state, &reservation);

    Ok((StatusCode::CREATED, Json(reservation)))
}

fn validate_request(request: &ReservationRequest) -> Result<(), AppError> {
    if request.segment_id.trim().is_empty() {
        return Err(AppError::BadRequest("segment_id is required".to_string()));
    }
    if request.first_name.trim().is_empty() || request.last_name.trim().is_empty() {
        return Err(AppError::BadRequest("first_name and last_name are required".to_string()));
    }
    if !request.email.contains('@') {
        return Err(AppError::BadRequest(format!("invalid email: {}", request.email)));
    }
    Ok(())
}

/// Best effort: the reservation is already committed, so any failure here is
/// only logged.
fn notify_reserved(state: &Arc<AppState>, reservation: &Reservation) {
    let lookup = state.db().and_then(|db| {
        let appointment = queries::get_appointment(&db, &reservation.appointment_id)?;
        let owner = match &appointment {
            Some(a) => queries::get_owner(&db, &a.owner_id)?,
            None => None,
        };
        Ok((appointment, owner))
    });

    let (appointment, owner) = match lookup {
        Ok(found) => found,
        Err(e) => {
            tracing::warn!(error = %e, reservation_id = %reservation.id, "skipping notification");
            return;
        }
    };

    let notice = build_reservation_notice(
        reservation,
        appointment.as_ref(),
        owner.as_ref(),
        &state.config.app_host,
    );
    let state = Arc::clone(state);
    let reservation_id = reservation.id.clone();

    tokio::spawn(async move {
        if let Err(e) = state.notifier.send_notice(&notice).await {
            tracing::warn!(error = %e, reservation_id = %reservation_id, "sending notification failed");
        }
    });
}

// DELETE /api/reservations/:id
#[derive(Serialize)]
pub struct CancelResponse {
    status: &'static str,
}

pub async fn cancel_reservation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<CancelResponse>, AppError> {
    let outcome = {
        let mut db = state.db()?;
        ledger::cancel(&mut db, &id)?
    };

    let status = match outcome {
        CancelOutcome::Cancelled => "cancelled",
        CancelOutcome::AlreadyCancelled => "already_cancelled",
    };
    Ok(Json(CancelResponse { status }))
}

// GET /api/appointments/:id/reservations
#[derive(Deserialize)]
pub struct ReservationsQuery {
    #[serde(default)]
    pub include_cancelled: bool,
}

pub async fn list_reservations(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(query): Query<ReservationsQuery>,
) -> Result<Json<Vec<ReservationView>>, AppError> {
    let owner_id = auth::require_owner(&headers, &state.config.token_secret)?;

    let db = state.db()?;
    appointments::get_owned(&db, &id, &owner_id)?;
    let reservations = ledger::list_reservations(&db, &id, query.include_cancelled)?;
    Ok(Json(reservations))
}
