use sqlx::types::Json;
use uuid::Uuid;

use crate::{models::Response, PGPool};

pub async fn create(response: &Response, pool: &PGPool) -> Result<u64, sqlx::Error> {
    let res = sqlx::query(
        "INSERT INTO responses (id, event_id, user_id, name, availability, created_at)
        VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(response.id)
    .bind(response.event_id)
    .bind(&response.user_id)
    .bind(&response.name)
    .bind(Json(&response.availability.0))
    .bind(response.created_at)
    .execute(pool)
    .await?;
    Ok(res.rows_affected())
}

pub async fn get_by_event(event_id: Uuid, pool: &PGPool) -> Result<Vec<Response>, sqlx::Error> {
    sqlx::query_as::<_, Response>(
        "SELECT id, event_id, user_id, name, availability, created_at
        FROM responses WHERE event_id = $1 ORDER BY created_at",
    )
    .bind(event_id)
    .fetch_all(pool)
    .await
}
