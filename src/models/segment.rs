use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Expansion output, before the store assigns an id and appointment link.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewSegment {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    pub volume: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Segment {
    pub id: String,
    pub appointment_id: String,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    pub volume: i64,
}
