use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::MigrationOutcome;
use crate::service::timeslot::{Availability, DayRange, LocalSlots, TimeSlots};

#[derive(Debug, Deserialize, Clone)]
pub struct CredentialsDto {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SplashPasswordDto {
    pub password: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UpdatePasswordDto {
    pub password: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PasswordResetRequestDto {
    pub email: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PasswordResetConfirmDto {
    pub token: String,
    pub password: String,
}

/// `tz_offset` is minutes east of UTC, so UTC-5 is `-300`.
#[derive(Debug, Deserialize, Clone, Copy, Default)]
pub struct ZoneQuery {
    #[serde(default)]
    pub tz_offset: i32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NewEventDto {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tz_offset: i32,
    pub dates: Vec<DayRange>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NewResponseDto {
    pub name: String,
    #[serde(default)]
    pub tz_offset: i32,
    pub availability: Vec<Availability>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: Uuid,
    pub email: String,
    pub purpose: TokenPurpose,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    pub exp: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    Access,
    Reset,
}

impl Claims {
    pub fn new(user_id: &Uuid, email: &str, purpose: TokenPurpose, exp: usize) -> Self {
        Self {
            user_id: *user_id,
            email: email.to_string(),
            purpose,
            fingerprint: None,
            exp,
        }
    }
}

#[derive(Clone, Default)]
pub struct UpdateUserDto {
    pub pwd_hash: Option<String>,
    pub access_token: Option<Option<String>>,
}

impl UpdateUserDto {
    pub fn is_empty(&self) -> bool {
        self.pwd_hash.is_none() && self.access_token.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MigrationStatus {
    NotNeeded,
    Migrated(MigrationOutcome),
    Failed,
}

#[derive(Debug, Serialize)]
pub struct SessionDto {
    pub user_id: Uuid,
    pub email: String,
    pub access_token: String,
    pub migration: MigrationStatus,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdentityDto {
    pub user_id: String,
    pub anonymous: bool,
}

#[derive(Debug, Serialize)]
pub struct EventView {
    pub id: Uuid,
    /// Whether the viewer created the event. The creator's id is never sent.
    pub is_owner: bool,
    pub title: String,
    pub description: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub time_slots: TimeSlots,
    pub local_slots: LocalSlots,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotTally {
    pub date: String,
    pub time: String,
    pub display_date: String,
    pub display_time: String,
    pub available_count: usize,
    pub percentage: u32,
    pub names: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct EventResultsDto {
    pub event: EventView,
    pub total_responses: usize,
    pub slots: Vec<SlotTally>,
}
