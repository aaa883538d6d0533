use chrono::{SubsecRound, Utc};
use rusqlite::Connection;
use serde::Serialize;

use crate::db::queries;
use crate::errors::{AppError, Result};
use crate::models::{Appointment, NewAppointment, Segment};
use crate::services::segments;

#[derive(Debug, Clone, Serialize)]
pub struct AppointmentSummary {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub reserved: i64,
    pub capacity: i64,
}

/// Expands the template and stores the appointment with all of its
/// segments in one transaction.
pub fn create_appointment(
    conn: &mut Connection,
    owner_id: &str,
    new: NewAppointment,
) -> Result<(Appointment, Vec<Segment>)> {
    if new.name.trim().is_empty() {
        return Err(AppError::InvalidTemplate("name must not be empty".to_string()));
    }

    let expanded = segments::expand(&new.template)?;

    let appointment = Appointment {
        id: uuid::Uuid::new_v4().to_string(),
        owner_id: owner_id.to_string(),
        name: new.name,
        instructions: new.instructions,
        template: new.template,
        created_at: Utc::now().naive_utc().trunc_subsecs(0),
    };

    let tx = conn.transaction()?;
    queries::insert_appointment(&tx, &appointment)?;
    let inserted = queries::insert_segments(&tx, &appointment.id, &expanded)?;
    tx.commit()?;

    tracing::info!(
        appointment_id = %appointment.id,
        owner_id,
        segments = inserted.len(),
        "appointment created"
    );

    Ok((appointment, inserted))
}

/// The owner's appointments, newest first, with booking totals.
pub fn list_for_owner(conn: &Connection, owner_id: &str) -> Result<Vec<AppointmentSummary>> {
    let appointments = queries::get_appointments_for_owner(conn, owner_id)?;

    let mut summaries = Vec::with_capacity(appointments.len());
    for appointment in appointments {
        let reserved = queries::count_active_reservations(conn, &appointment.id)?;
        let segment_count = queries::count_segments(conn, &appointment.id)?;
        summaries.push(AppointmentSummary {
            capacity: segment_count * appointment.template.volume,
            reserved,
            appointment,
        });
    }
    Ok(summaries)
}

/// Fetches an appointment only if `owner_id` owns it.
pub fn get_owned(conn: &Connection, appointment_id: &str, owner_id: &str) -> Result<Appointment> {
    queries::get_appointment(conn, appointment_id)?
        .filter(|a| a.owner_id == owner_id)
        .ok_or_else(|| AppError::NotFound(format!("appointment {appointment_id}")))
}

pub fn delete_owned(conn: &Connection, appointment_id: &str, owner_id: &str) -> Result<()> {
    if !queries::delete_appointment(conn, appointment_id, owner_id)? {
        return Err(AppError::NotFound(format!("appointment {appointment_id}")));
    }
    tracing::info!(appointment_id, owner_id, "appointment deleted");
    Ok(())
}

/// Segments that have not started yet, in start order.
pub fn upcoming_segments(conn: &Connection, appointment_id: &str) -> Result<(Appointment, Vec<Segment>)> {
    let appointment = queries::get_appointment(conn, appointment_id)?
        .ok_or_else(|| AppError::NotFound(format!("appointment {appointment_id}")))?;
    let segments = queries::get_segments(conn, appointment_id, Some(&Utc::now()))?;
    Ok((appointment, segments))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::{AppointmentTemplate, BreakWindow, Owner, ReservationRequest};
    use crate::services::ledger;
    use chrono::{DateTime, Duration, FixedOffset};

    fn setup_db() -> Connection {
        let conn = db::init_db(":memory:").unwrap();
        queries::insert_owner(
            &conn,
            &Owner {
                id: "owner-1".to_string(),
                email: "owner@example.com".to_string(),
            },
        )
        .unwrap();
        conn
    }

    fn dt(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    fn new_appointment(start: DateTime<FixedOffset>, end: DateTime<FixedOffset>) -> NewAppointment {
        NewAppointment {
            name: "Consultation".to_string(),
            instructions: "Room 4".to_string(),
            template: AppointmentTemplate {
                start,
                end,
                segment_length: "PT1H".to_string(),
                breaks: vec![BreakWindow {
                    start: "12:00".to_string(),
                    end: "13:00".to_string(),
                }],
                exclude_weekdays: vec![],
                volume: 2,
            },
        }
    }

    #[test]
    fn test_create_persists_appointment_and_segments() {
        let mut conn = setup_db();
        let (appointment, segments) = create_appointment(
            &mut conn,
            "owner-1",
            new_appointment(dt("2025-06-16T09:00:00Z"), dt("2025-06-16T17:00:00Z")),
        )
        .unwrap();

        assert_eq!(segments.len(), 7);
        let stored = queries::get_appointment(&conn, &appointment.id).unwrap().unwrap();
        assert_eq!(stored.template, appointment.template);
        assert_eq!(stored.created_at, appointment.created_at);
        assert_eq!(queries::count_segments(&conn, &appointment.id).unwrap(), 7);

        let listed = queries::get_segments(&conn, &appointment.id, None).unwrap();
        assert_eq!(listed, segments);
    }

    #[test]
    fn test_create_rejects_invalid_template_without_writing() {
        let mut conn = setup_db();
        let mut bad = new_appointment(dt("2025-06-16T09:00:00Z"), dt("2025-06-16T17:00:00Z"));
        bad.template.segment_length = "forever".to_string();

        let result = create_appointment(&mut conn, "owner-1", bad);
        assert!(matches!(result, Err(AppError::InvalidDuration(_))));
        assert!(list_for_owner(&conn, "owner-1").unwrap().is_empty());
    }

    #[test]
    fn test_list_for_owner_reports_totals() {
        let mut conn = setup_db();
        let (first, segments) = create_appointment(
            &mut conn,
            "owner-1",
            new_appointment(dt("2025-06-16T09:00:00Z"), dt("2025-06-16T17:00:00Z")),
        )
        .unwrap();
        let (second, _) = create_appointment(
            &mut conn,
            "owner-1",
            new_appointment(dt("2025-06-17T09:00:00Z"), dt("2025-06-17T11:00:00Z")),
        )
        .unwrap();

        ledger::reserve(
            &mut conn,
            &ReservationRequest {
                segment_id: segments[0].id.clone(),
                first_name: "Ana".to_string(),
                last_name: "Novak".to_string(),
                email: "ana@example.com".to_string(),
                timezone: "UTC".to_string(),
            },
        )
        .unwrap();

        let summaries = list_for_owner(&conn, "owner-1").unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].appointment.id, second.id);
        assert_eq!(summaries[0].capacity, 2 * 2);
        assert_eq!(summaries[0].reserved, 0);
        assert_eq!(summaries[1].appointment.id, first.id);
        assert_eq!(summaries[1].capacity, 7 * 2);
        assert_eq!(summaries[1].reserved, 1);
    }

    #[test]
    fn test_get_owned_hides_foreign_appointments() {
        let mut conn = setup_db();
        let (appointment, _) = create_appointment(
            &mut conn,
            "owner-1",
            new_appointment(dt("2025-06-16T09:00:00Z"), dt("2025-06-16T17:00:00Z")),
        )
        .unwrap();

        assert!(get_owned(&conn, &appointment.id, "owner-1").is_ok());
        assert!(matches!(
            get_owned(&conn, &appointment.id, "owner-2"),
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            delete_owned(&conn, &appointment.id, "owner-2"),
            Err(AppError::NotFound(_))
        ));
        delete_owned(&conn, &appointment.id, "owner-1").unwrap();
        assert_eq!(queries::count_segments(&conn, &appointment.id).unwrap(), 0);
    }

    #[test]
    fn test_upcoming_segments_skip_past_ones() {
        let mut conn = setup_db();
        let today = Utc::now().date_naive();
        let start = (today - Duration::days(2))
            .and_hms_opt(0, 0, 0)
            .unwrap()
            .and_utc()
            .fixed_offset();
        let end = (today + Duration::days(2))
            .and_hms_opt(23, 0, 0)
            .unwrap()
            .and_utc()
            .fixed_offset();
        let (appointment, all) =
            create_appointment(&mut conn, "owner-1", new_appointment(start, end)).unwrap();

        let (found, upcoming) = upcoming_segments(&conn, &appointment.id).unwrap();
        assert_eq!(found.id, appointment.id);
        assert!(!upcoming.is_empty());
        assert!(upcoming.len() < all.len());
        let now = Utc::now();
        assert!(upcoming.iter().all(|s| s.start.with_timezone(&Utc) >= now));
    }
}
