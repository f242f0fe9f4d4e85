use log::debug;
use uuid::Uuid;

use crate::{models::MigrationOutcome, PGPool};

/// Row for `ownership_migrations`.
#[derive(Debug, PartialEq, Eq)]
struct LedgerEntry<'a> {
    old_id: &'a str,
    new_id: &'a str,
    events_moved: i64,
    responses_moved: i64,
}

/// Only migrations that moved something are recorded, so re-running a
/// finished migration leaves the ledger alone.
fn ledger_entry<'a>(from_id: &'a str, to_id: &'a str, outcome: &MigrationOutcome) -> Option<LedgerEntry<'a>> {
    (!outcome.is_noop()).then(|| LedgerEntry {
        old_id: from_id,
        new_id: to_id,
        events_moved: outcome.events_moved as i64,
        responses_moved: outcome.responses_moved as i64,
    })
}

/// Moves every event and response owned by `from_id` to `to_id` in one
/// transaction, recording a ledger row when anything moved.
pub async fn reassign_owner(from_id: &str, to_id: &str, pool: &PGPool) -> Result<MigrationOutcome, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let events_moved = sqlx::query("UPDATE events SET creator_id = $1 WHERE creator_id = $2")
        .bind(to_id)
        .bind(from_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    let responses_moved = sqlx::query("UPDATE responses SET user_id = $1 WHERE user_id = $2")
        .bind(to_id)
        .bind(from_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    let outcome = MigrationOutcome {
        events_moved,
        responses_moved,
    };

    if let Some(entry) = ledger_entry(from_id, to_id, &outcome) {
        sqlx::query(
            "INSERT INTO ownership_migrations (id, old_id, new_id, events_moved, responses_moved)
            VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(Uuid::new_v4())
        .bind(entry.old_id)
        .bind(entry.new_id)
        .bind(entry.events_moved)
        .bind(entry.responses_moved)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    debug!("reassign_owner {} -> {}: {:?}", from_id, to_id, outcome);
    Ok(outcome)
}
