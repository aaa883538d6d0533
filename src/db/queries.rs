use chrono::{DateTime, FixedOffset, NaiveDateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};

use crate::errors::{AppError, Result};
use crate::models::{
    Appointment, AppointmentTemplate, NewSegment, Owner, Reservation, Segment,
};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn format_offset(dt: &DateTime<FixedOffset>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Sortable UTC rendering used for range filters and ordering.
fn format_utc(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn conversion_error<E>(idx: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

fn get_offset_datetime(row: &Row, idx: usize) -> rusqlite::Result<DateTime<FixedOffset>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw).map_err(|e| conversion_error(idx, e))
}

fn get_naive_datetime(row: &Row, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    let raw: String = row.get(idx)?;
    NaiveDateTime::parse_from_str(&raw, TIMESTAMP_FORMAT).map_err(|e| conversion_error(idx, e))
}

fn get_json<T: serde::de::DeserializeOwned>(row: &Row, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| conversion_error(idx, e))
}

// ── Owners ──

pub fn insert_owner(conn: &Connection, owner: &Owner) -> Result<()> {
    let result = conn.execute(
        "INSERT INTO owners (id, email) VALUES (?1, ?2)",
        params![owner.id, owner.email],
    );
    match result {
        Ok(_) => Ok(()),
        Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => Err(
            AppError::BadRequest(format!("owner {} already exists", owner.email)),
        ),
        Err(e) => Err(e.into()),
    }
}

pub fn get_owner(conn: &Connection, id: &str) -> Result<Option<Owner>> {
    let owner = conn
        .query_row(
            "SELECT id, email FROM owners WHERE id = ?1",
            params![id],
            |row| {
                Ok(Owner {
                    id: row.get(0)?,
                    email: row.get(1)?,
                })
            },
        )
        .optional()?;
    Ok(owner)
}

// ── Appointments ──

const APPOINTMENT_COLUMNS: &str = "id, owner_id, name, instructions, starts_at, ends_at, segment_length, breaks, exclude_weekdays, volume, created_at";

pub fn insert_appointment(conn: &Connection, appointment: &Appointment) -> Result<()> {
    let template = &appointment.template;
    let breaks = serde_json::to_string(&template.breaks)
        .map_err(|e| AppError::InvalidTemplate(e.to_string()))?;
    let exclude = serde_json::to_string(&template.exclude_weekdays)
        .map_err(|e| AppError::InvalidTemplate(e.to_string()))?;

    conn.execute(
        "INSERT INTO appointments (id, owner_id, name, instructions, starts_at, ends_at, segment_length, breaks, exclude_weekdays, volume, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            appointment.id,
            appointment.owner_id,
            appointment.name,
            appointment.instructions,
            format_offset(&template.start),
            format_offset(&template.end),
            template.segment_length,
            breaks,
            exclude,
            template.volume,
            appointment.created_at.format(TIMESTAMP_FORMAT).to_string(),
        ],
    )?;
    Ok(())
}

pub fn get_appointment(conn: &Connection, id: &str) -> Result<Option<Appointment>> {
    let sql = format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = ?1");
    let appointment = conn
        .query_row(&sql, params![id], parse_appointment_row)
        .optional()?;
    Ok(appointment)
}

/// Newest first.
pub fn get_appointments_for_owner(conn: &Connection, owner_id: &str) -> Result<Vec<Appointment>> {
    let sql = format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE owner_id = ?1 ORDER BY rowid DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![owner_id], parse_appointment_row)?;

    let mut appointments = vec![];
    for row in rows {
        appointments.push(row?);
    }
    Ok(appointments)
}

/// Segments go with the appointment (cascade); reservations stay for history.
pub fn delete_appointment(conn: &Connection, id: &str, owner_id: &str) -> Result<bool> {
    let count = conn.execute(
        "DELETE FROM appointments WHERE id = ?1 AND owner_id = ?2",
        params![id, owner_id],
    )?;
    Ok(count > 0)
}

fn parse_appointment_row(row: &Row) -> rusqlite::Result<Appointment> {
    Ok(Appointment {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        name: row.get(2)?,
        instructions: row.get(3)?,
        template: AppointmentTemplate {
            start: get_offset_datetime(row, 4)?,
            end: get_offset_datetime(row, 5)?,
            segment_length: row.get(6)?,
            breaks: get_json(row, 7)?,
            exclude_weekdays: get_json(row, 8)?,
            volume: row.get(9)?,
        },
        created_at: get_naive_datetime(row, 10)?,
    })
}

// ── Segments ──

/// Inserts every segment with a fresh id. Run inside the caller's
/// transaction so an expansion lands all-or-nothing.
pub fn insert_segments(
    conn: &Connection,
    appointment_id: &str,
    segments: &[NewSegment],
) -> Result<Vec<Segment>> {
    let mut stmt = conn.prepare(
        "INSERT INTO segments (id, appointment_id, starts_at, ends_at, starts_at_utc, volume)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;

    let mut inserted = Vec::with_capacity(segments.len());
    for segment in segments {
        let id = uuid::Uuid::new_v4().to_string();
        stmt.execute(params![
            id,
            appointment_id,
            format_offset(&segment.start),
            format_offset(&segment.end),
            format_utc(&segment.start.with_timezone(&Utc)),
            segment.volume,
        ])?;
        inserted.push(Segment {
            id,
            appointment_id: appointment_id.to_string(),
            start: segment.start,
            end: segment.end,
            volume: segment.volume,
        });
    }
    Ok(inserted)
}

pub fn get_segment(conn: &Connection, id: &str) -> Result<Option<Segment>> {
    let segment = conn
        .query_row(
            "SELECT id, appointment_id, starts_at, ends_at, volume FROM segments WHERE id = ?1",
            params![id],
            parse_segment_row,
        )
        .optional()?;
    Ok(segment)
}

/// Segments in start order, optionally only those starting at or after `from`.
pub fn get_segments(
    conn: &Connection,
    appointment_id: &str,
    from: Option<&DateTime<Utc>>,
) -> Result<Vec<Segment>> {
    let from = from.map(format_utc).unwrap_or_default();
    let mut stmt = conn.prepare(
        "SELECT id, appointment_id, starts_at, ends_at, volume FROM segments
         WHERE appointment_id = ?1 AND starts_at_utc >= ?2
         ORDER BY starts_at_utc ASC, rowid ASC",
    )?;
    let rows = stmt.query_map(params![appointment_id, from], parse_segment_row)?;

    let mut segments = vec![];
    for row in rows {
        segments.push(row?);
    }
    Ok(segments)
}

pub fn count_segments(conn: &Connection, appointment_id: &str) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM segments WHERE appointment_id = ?1",
        params![appointment_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Takes one unit of capacity only if some is left. Returns false when the
/// segment is missing or already at zero.
pub fn decrement_segment_volume(conn: &Connection, id: &str) -> Result<bool> {
    let count = conn.execute(
        "UPDATE segments SET volume = volume - 1 WHERE id = ?1 AND volume > 0",
        params![id],
    )?;
    Ok(count > 0)
}

/// Returns one unit of capacity, never above the appointment's volume.
pub fn increment_segment_volume(conn: &Connection, id: &str) -> Result<bool> {
    let count = conn.execute(
        "UPDATE segments SET volume = volume + 1
         WHERE id = ?1
           AND volume < (SELECT a.volume FROM appointments a WHERE a.id = segments.appointment_id)",
        params![id],
    )?;
    Ok(count > 0)
}

fn parse_segment_row(row: &Row) -> rusqlite::Result<Segment> {
    Ok(Segment {
        id: row.get(0)?,
        appointment_id: row.get(1)?,
        start: get_offset_datetime(row, 2)?,
        end: get_offset_datetime(row, 3)?,
        volume: row.get(4)?,
    })
}

// ── Reservations ──

const RESERVATION_COLUMNS: &str = "id, segment_id, appointment_id, first_name, last_name, email, timezone, starts_at, ends_at, cancelled, created_at";

pub fn insert_reservation(conn: &Connection, reservation: &Reservation) -> Result<()> {
    conn.execute(
        "INSERT INTO reservations (id, segment_id, appointment_id, first_name, last_name, email, timezone, starts_at, ends_at, cancelled, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            reservation.id,
            reservation.segment_id,
            reservation.appointment_id,
            reservation.first_name,
            reservation.last_name,
            reservation.email,
            reservation.timezone,
            format_offset(&reservation.start),
            format_offset(&reservation.end),
            reservation.cancelled as i32,
            reservation.created_at.format(TIMESTAMP_FORMAT).to_string(),
        ],
    )?;
    Ok(())
}

pub fn get_reservation(conn: &Connection, id: &str) -> Result<Option<Reservation>> {
    let sql = format!("SELECT {RESERVATION_COLUMNS} FROM reservations WHERE id = ?1");
    let reservation = conn
        .query_row(&sql, params![id], parse_reservation_row)
        .optional()?;
    Ok(reservation)
}

/// Flips the flag only on an active reservation; false if it was already
/// cancelled or does not exist.
pub fn mark_reservation_cancelled(conn: &Connection, id: &str) -> Result<bool> {
    let count = conn.execute(
        "UPDATE reservations SET cancelled = 1 WHERE id = ?1 AND cancelled = 0",
        params![id],
    )?;
    Ok(count > 0)
}

/// Newest first by insertion order.
pub fn get_reservations_for_appointment(
    conn: &Connection,
    appointment_id: &str,
    include_cancelled: bool,
) -> Result<Vec<Reservation>> {
    let sql = if include_cancelled {
        format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations
             WHERE appointment_id = ?1 ORDER BY rowid DESC"
        )
    } else {
        format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations
             WHERE appointment_id = ?1 AND cancelled = 0 ORDER BY rowid DESC"
        )
    };

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![appointment_id], parse_reservation_row)?;

    let mut reservations = vec![];
    for row in rows {
        reservations.push(row?);
    }
    Ok(reservations)
}

pub fn count_active_reservations(conn: &Connection, appointment_id: &str) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM reservations WHERE appointment_id = ?1 AND cancelled = 0",
        params![appointment_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn count_active_reservations_for_segment(conn: &Connection, segment_id: &str) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM reservations WHERE segment_id = ?1 AND cancelled = 0",
        params![segment_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

fn parse_reservation_row(row: &Row) -> rusqlite::Result<Reservation> {
    Ok(Reservation {
        id: row.get(0)?,
        segment_id: row.get(1)?,
        appointment_id: row.get(2)?,
        first_name: row.get(3)?,
        last_name: row.get(4)?,
        email: row.get(5)?,
        timezone: row.get(6)?,
        start: get_offset_datetime(row, 7)?,
        end: get_offset_datetime(row, 8)?,
        cancelled: row.get::<_, i32>(9)? != 0,
        created_at: get_naive_datetime(row, 10)?,
    })
}
