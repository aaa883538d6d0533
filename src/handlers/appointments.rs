use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Serialize;

use crate::errors::AppError;
use crate::models::{Appointment, NewAppointment, Segment};
use crate::services::appointments::{self, AppointmentSummary};
use crate::services::auth;
use crate::state::AppState;

// POST /api/appointments
#[derive(Serialize)]
pub struct CreatedAppointment {
    #[serde(flatten)]
    appointment: Appointment,
    segment_count: usize,
}

pub async fn create_appointment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<NewAppointment>,
) -> Result<(StatusCode, Json<CreatedAppointment>), AppError> {
    let owner_id = auth::require_owner(&headers, &state.config.token_secret)?;

    let (appointment, segments) = {
        let mut db = state.db()?;
        appointments::create_appointment(&mut db, &owner_id, body)?
    };

    Ok((
        StatusCode::CREATED,
        Json(CreatedAppointment {
            appointment,
            segment_count: segments.len(),
        }),
    ))
}

// GET /api/appointments
pub async fn list_appointments(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<AppointmentSummary>>, AppError> {
    let owner_id = auth::require_owner(&headers, &state.config.token_secret)?;

    let summaries = {
        let db = state.db()?;
        appointments::list_for_owner(&db, &owner_id)?
    };
    Ok(Json(summaries))
}

// GET /api/appointments/:id
pub async fn get_appointment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Appointment>, AppError> {
    let owner_id = auth::require_owner(&headers, &state.config.token_secret)?;

    let db = state.db()?;
    let appointment = appointments::get_owned(&db, &id, &owner_id)?;
    Ok(Json(appointment))
}

// DELETE /api/appointments/:id
pub async fn delete_appointment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let owner_id = auth::require_owner(&headers, &state.config.token_secret)?;

    let db = state.db()?;
    appointments::delete_owned(&db, &id, &owner_id)?;
    Ok(StatusCode::NO_CONTENT)
}

// GET /api/appointments/:id/segments
#[derive(Serialize)]
pub struct SegmentsResponse {
    appointment: String,
    segments: Vec<Segment>,
}

pub async fn list_segments(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SegmentsResponse>, AppError> {
    let (appointment, segments) = {
        let db = state.db()?;
        appointments::upcoming_segments(&db, &id)?
    };

    Ok(Json(SegmentsResponse {
        appointment: appointment.name,
        segments,
    }))
}
