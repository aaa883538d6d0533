//! Reservation bookkeeping against segment capacity.
//!
//! Volume lives only in the store. Every change is a conditional update run
//! inside an immediate transaction, so two connections racing for the last
//! unit cannot both win, and a cancellation cannot lose its increment.

use chrono::{SubsecRound, Utc};
use rusqlite::{Connection, TransactionBehavior};

use crate::db::queries;
use crate::errors::{AppError, Result};
use crate::models::{CancelOutcome, Reservation, ReservationRequest, ReservationView};

/// Takes one unit of capacity from the segment and records the reservation.
///
/// The reservation copies the segment's start and end as they are at this
/// moment.
pub fn reserve(conn: &mut Connection, request: &ReservationRequest) -> Result<Reservation> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    if !queries::decrement_segment_volume(&tx, &request.segment_id)? {
        return match queries::get_segment(&tx, &request.segment_id)? {
            Some(_) => Err(AppError::CapacityExhausted(request.segment_id.clone())),
            None => Err(AppError::SegmentNotFound(request.segment_id.clone())),
        };
    }

    let segment = queries::get_segment(&tx, &request.segment_id)?
        .ok_or_else(|| AppError::SegmentNotFound(request.segment_id.clone()))?;

    let reservation = Reservation {
        id: uuid::Uuid::new_v4().to_string(),
        segment_id: segment.id.clone(),
        appointment_id: segment.appointment_id.clone(),
        first_name: request.first_name.clone(),
        last_name: request.last_name.clone(),
        email: request.email.clone(),
        timezone: request.timezone.clone(),
        start: segment.start,
        end: segment.end,
        cancelled: false,
        created_at: Utc::now().naive_utc().trunc_subsecs(0),
    };
    queries::insert_reservation(&tx, &reservation)?;
    tx.commit()?;

    tracing::info!(
        reservation_id = %reservation.id,
        segment_id = %segment.id,
        remaining = segment.volume,
        "reservation created"
    );

    Ok(reservation)
}

/// Marks the reservation cancelled and gives its unit back to the segment.
/// Cancelling twice changes nothing the second time.
pub fn cancel(conn: &mut Connection, reservation_id: &str) -> Result<CancelOutcome> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let reservation = queries::get_reservation(&tx, reservation_id)?
        .ok_or_else(|| AppError::ReservationNotFound(reservation_id.to_string()))?;

    if !queries::mark_reservation_cancelled(&tx, reservation_id)? {
        tracing::debug!(reservation_id, "reservation already cancelled");
        return Ok(CancelOutcome::AlreadyCancelled);
    }

    // Capacity is released even when the segment's time has already passed.
    if !queries::increment_segment_volume(&tx, &reservation.segment_id)? {
        tracing::warn!(
            reservation_id,
            segment_id = %reservation.segment_id,
            "segment missing or already at full volume, nothing to release"
        );
    }
    tx.commit()?;

    tracing::info!(
        reservation_id,
        segment_id = %reservation.segment_id,
        "reservation cancelled"
    );

    Ok(CancelOutcome::Cancelled)
}

/// Reservations of one appointment, newest first.
pub fn list_reservations(
    conn: &Connection,
    appointment_id: &str,
    include_cancelled: bool,
) -> Result<Vec<ReservationView>> {
    let reservations =
        queries::get_reservations_for_appointment(conn, appointment_id, include_cancelled)?;
    Ok(reservations.into_iter().map(ReservationView::from).collect())
}
