use chrono::{TimeZone, Utc};
use log::{info, warn};
use sqlx::types::Json;
use uuid::Uuid;

use crate::{
    db,
    dto::{EventResultsDto, EventView, NewEventDto, NewResponseDto, SlotTally},
    errors::AppError,
    models::{DashboardEntry, Event, Response},
    service::timeslot::{self, TimeSlots, TimeSlotsDocument, DATE_FORMAT},
    PGPool,
};

fn trimmed(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Builds a new event from the creator's local day ranges. Pure so it can be
/// checked without a database.
pub fn build_event(creator_id: String, dto: NewEventDto) -> Result<Event, AppError> {
    let title = trimmed(&dto.title).ok_or(AppError::BadClientData)?;
    let zone = timeslot::zone_from_offset_minutes(dto.tz_offset)?;
    let time_slots = timeslot::expand_ranges(&zone, &dto.dates)?;
    if time_slots.is_empty() {
        return Err(AppError::BadClientData);
    }
    Ok(Event {
        id: Uuid::new_v4(),
        creator_id,
        title,
        description: dto.description.as_deref().and_then(trimmed),
        time_slots,
        created_at: Utc::now(),
    })
}

pub async fn create(creator_id: String, dto: NewEventDto, pool: &PGPool) -> Result<Event, AppError> {
    let event = build_event(creator_id, dto)?;
    db::event::create(&event, pool).await?;
    info!("event {} created by {} with {} slots", event.id, event.creator_id, event.time_slots.len());
    Ok(event)
}

pub async fn get_by_id(id: Uuid, pool: &PGPool) -> Result<Event, AppError> {
    let row = db::event::get_by_id(id, pool).await?;
    Event::try_from(row).map_err(|err| {
        warn!("event {} has unreadable time slots: {}", id, err);
        AppError::InternalError
    })
}

/// Public rendering of an event for `viewer`, who may be unknown.
pub fn view<Tz: TimeZone>(event: Event, zone: &Tz, viewer: Option<&str>) -> EventView {
    let local_slots = event.time_slots.to_local(zone);
    EventView {
        id: event.id,
        is_owner: viewer == Some(event.creator_id.as_str()),
        title: event.title,
        description: event.description,
        created_at: event.created_at,
        time_slots: event.time_slots,
        local_slots,
    }
}

/// Converts a respondent's local marks to UTC and checks each one against the
/// event's offered slots.
pub fn build_response(event: &Event, user_id: String, dto: NewResponseDto) -> Result<Response, AppError> {
    let name = trimmed(&dto.name).ok_or(AppError::BadClientData)?;
    let zone = timeslot::zone_from_offset_minutes(dto.tz_offset)?;
    let mut availability = Vec::with_capacity(dto.availability.len());
    for mark in &dto.availability {
        let utc = mark.local_to_utc(&zone)?;
        if !event.time_slots.contains(&utc.slot()) {
            warn!("response to {} names a slot the event does not offer: {:?}", event.id, utc);
            return Err(AppError::BadClientData);
        }
        availability.push(utc);
    }
    Ok(Response {
        id: Uuid::new_v4(),
        event_id: event.id,
        user_id,
        name,
        availability: Json(availability),
        created_at: Utc::now(),
    })
}

pub async fn submit_response(event_id: Uuid, user_id: String, dto: NewResponseDto, pool: &PGPool) -> Result<Uuid, AppError> {
    let event = get_by_id(event_id, pool).await?;
    let response = build_response(&event, user_id, dto)?;
    db::response::create(&response, pool).await?;
    info!("response {} recorded for event {}", response.id, event_id);
    Ok(response.id)
}

/// Per-slot availability counts, listed in the viewer's zone.
pub fn tally<Tz: TimeZone>(slots: &TimeSlots, responses: &[Response], zone: &Tz) -> Vec<SlotTally> {
    let total = responses.len();
    slots
        .slots()
        .map(|slot| {
            let names: Vec<String> = responses
                .iter()
                .filter(|r| r.marks().iter().any(|m| m.available && m.slot() == slot))
                .map(|r| r.name.clone())
                .collect();
            let percentage = if total == 0 {
                0
            } else {
                ((names.len() as f64 / total as f64) * 100.0).round() as u32
            };
            let local = slot.utc_to_local(zone);
            let date = local.date.format(DATE_FORMAT).to_string();
            let time = local.time.to_string();
            SlotTally {
                display_date: timeslot::format_date_for_display(Some(&date)),
                display_time: timeslot::format_time_for_display(Some(&time)),
                date,
                time,
                available_count: names.len(),
                percentage,
                names,
            }
        })
        .collect()
}

pub async fn results<Tz: TimeZone>(
    event_id: Uuid,
    zone: &Tz,
    viewer: Option<&str>,
    pool: &PGPool,
) -> Result<EventResultsDto, AppError> {
    let event = get_by_id(event_id, pool).await?;
    let responses = db::response::get_by_event(event_id, pool).await?;
    let slots = tally(&event.time_slots, &responses, zone);
    Ok(EventResultsDto {
        event: view(event, zone, viewer),
        total_responses: responses.len(),
        slots,
    })
}

pub async fn dashboard(creator_id: &str, pool: &PGPool) -> Result<Vec<DashboardEntry>, AppError> {
    let rows = db::event::get_by_creator(creator_id, pool).await?;
    let entries = rows
        .into_iter()
        .map(|row| {
            let slots = TimeSlotsDocument::from_json(row.time_slots.0)
                .and_then(|doc| doc.upgrade(&Utc))
                .unwrap_or_else(|err| {
                    warn!("event {} has unreadable time slots: {}", row.id, err);
                    TimeSlots::default()
                });
            DashboardEntry {
                id: row.id,
                title: row.title,
                description: row.description,
                created_at: row.created_at,
                response_count: row.response_count,
                first_date: slots.first_date(),
                last_date: slots.last_date(),
            }
        })
        .collect();
    Ok(entries)
}
