use chrono::{DateTime, FixedOffset, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// A daily break, given as wall-clock times of day (`HH:MM` or `HH:MM:SS`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BreakWindow {
    pub start: String,
    pub end: String,
}

/// Owner-authored recurrence definition, before expansion.
///
/// `start` carries the first day's opening time and `end` the last day's
/// closing time; the closing time of day repeats on every included day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppointmentTemplate {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    pub segment_length: String,
    #[serde(default)]
    pub breaks: Vec<BreakWindow>,
    #[serde(default)]
    pub exclude_weekdays: Vec<u32>,
    pub volume: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewAppointment {
    pub name: String,
    #[serde(default)]
    pub instructions: String,
    #[serde(flatten)]
    pub template: AppointmentTemplate,
}

#[derive(Debug, Clone, Serialize)]
pub struct Appointment {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub instructions: String,
    #[serde(flatten)]
    pub template: AppointmentTemplate,
    pub created_at: NaiveDateTime,
}
