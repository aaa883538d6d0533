use chrono::{DateTime, FixedOffset, NaiveDateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct ReservationRequest {
    pub segment_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reservation {
    pub id: String,
    pub segment_id: String,
    pub appointment_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub timezone: String,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    pub cancelled: bool,
    pub created_at: NaiveDateTime,
}

/// Owner-facing projection of a reservation. The id doubles as the
/// cancellation reference handed to the client.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReservationView {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    pub cancelled: bool,
}

impl From<Reservation> for ReservationView {
    fn from(r: Reservation) -> Self {
        Self {
            id: r.id,
            first_name: r.first_name,
            last_name: r.last_name,
            email: r.email,
            start: r.start,
            end: r.end,
            cancelled: r.cancelled,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    Cancelled,
    AlreadyCancelled,
}
