use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{prelude::FromRow, types::Json};
use uuid::Uuid;

use crate::errors::ConversionError;
use crate::service::timeslot::{Availability, TimeSlots, TimeSlotsDocument};

#[derive(Debug, FromRow, serde::Serialize, serde::Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub pwd_hash: String,
    pub access_token: Option<String>,
}

/// `events` row as stored; `time_slots` may be any historical schema.
#[derive(Debug, FromRow)]
pub struct EventRow {
    pub id: Uuid,
    pub creator_id: String,
    pub title: String,
    pub description: Option<String>,
    pub time_slots: Json<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Event {
    pub id: Uuid,
    pub creator_id: String,
    pub title: String,
    pub description: Option<String>,
    pub time_slots: TimeSlots,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<EventRow> for Event {
    type Error = ConversionError;

    // rows written before zones were tracked are read as UTC
    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        let time_slots = TimeSlotsDocument::from_json(row.time_slots.0)?.upgrade(&Utc)?;
        Ok(Event {
            id: row.id,
            creator_id: row.creator_id,
            title: row.title,
            description: row.description,
            time_slots,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone, FromRow, serde::Serialize)]
pub struct Response {
    pub id: Uuid,
    pub event_id: Uuid,
    pub user_id: String,
    pub name: String,
    pub availability: Json<Vec<Availability>>,
    pub created_at: DateTime<Utc>,
}

impl Response {
    pub fn marks(&self) -> &[Availability] {
        &self.availability.0
    }
}

#[derive(Debug, FromRow)]
pub struct DashboardRow {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub time_slots: Json<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub response_count: i64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct DashboardEntry {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub response_count: i64,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
}

/// Rows re-pointed by one ownership migration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MigrationOutcome {
    pub events_moved: u64,
    pub responses_moved: u64,
}

impl MigrationOutcome {
    pub fn is_noop(&self) -> bool {
        self.events_moved == 0 && self.responses_moved == 0
    }
}
