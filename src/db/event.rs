use sqlx::types::Json;
use uuid::Uuid;

use crate::{
    models::{DashboardRow, Event, EventRow},
    service::timeslot::TimeSlotsDocument,
    PGPool,
};

pub async fn create(event: &Event, pool: &PGPool) -> Result<u64, sqlx::Error> {
    let document = TimeSlotsDocument::current(event.time_slots.clone());
    let res = sqlx::query(
        "INSERT INTO events (id, creator_id, title, description, time_slots, created_at)
        VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(event.id)
    .bind(&event.creator_id)
    .bind(&event.title)
    .bind(&event.description)
    .bind(Json(&document))
    .bind(event.created_at)
    .execute(pool)
    .await?;
    Ok(res.rows_affected())
}

pub async fn get_by_id(id: Uuid, pool: &PGPool) -> Result<EventRow, sqlx::Error> {
    sqlx::query_as::<_, EventRow>(
        "SELECT id, creator_id, title, description, time_slots, created_at FROM events WHERE id = $1",
    )
    .bind(id)
    .fetch_one(pool)
    .await
}

// /dashboard
pub async fn get_by_creator(creator_id: &str, pool: &PGPool) -> Result<Vec<DashboardRow>, sqlx::Error> {
    sqlx::query_as::<_, DashboardRow>(
        "SELECT e.id, e.title, e.description, e.time_slots, e.created_at,
            (SELECT COUNT(*) FROM responses r WHERE r.event_id = e.id) AS response_count
        FROM events e
        WHERE e.creator_id = $1
        ORDER BY e.created_at DESC",
    )
    .bind(creator_id)
    .fetch_all(pool)
    .await
}
