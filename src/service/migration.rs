use async_trait::async_trait;
use log::info;

use crate::{db, errors::AppError, models::MigrationOutcome, service::identity, PGPool};

/// Something that can re-point event and response ownership. Implementations
/// must apply both tables as one unit.
#[async_trait]
pub trait OwnershipStore {
    async fn reassign_owner(&self, from_id: &str, to_id: &str) -> Result<MigrationOutcome, AppError>;
}

#[async_trait]
impl OwnershipStore for PGPool {
    async fn reassign_owner(&self, from_id: &str, to_id: &str) -> Result<MigrationOutcome, AppError> {
        Ok(db::migration::reassign_owner(from_id, to_id, self).await?)
    }
}

/// Moves everything owned by `from_id` to `to_id`. Running it again once
/// `from_id` owns nothing is a no-op.
pub async fn migrate_user_data<O>(owners: &O, from_id: &str, to_id: &str) -> Result<MigrationOutcome, AppError>
where
    O: OwnershipStore + ?Sized,
{
    if from_id.trim().is_empty() || to_id.trim().is_empty() {
        return Err(AppError::BadClientData);
    }
    if from_id == to_id {
        return Ok(MigrationOutcome::default());
    }
    let outcome = owners.reassign_owner(from_id, to_id).await?;
    if !outcome.is_noop() {
        info!(
            "ownership {} -> {}: {} events, {} responses",
            from_id, to_id, outcome.events_moved, outcome.responses_moved
        );
    }
    Ok(outcome)
}

/// Manual migration of a known anonymous id into the caller's account.
pub async fn claim_anonymous_id<O>(owners: &O, old_id: &str, user_id: uuid::Uuid) -> Result<MigrationOutcome, AppError>
where
    O: OwnershipStore + ?Sized,
{
    let old_id = old_id.trim();
    if !identity::is_anonymous_id(old_id) {
        return Err(AppError::BadClientData);
    }
    migrate_user_data(owners, old_id, &user_id.to_string()).await
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Tables {
        event_owners: Vec<String>,
        response_owners: Vec<String>,
        failure: Option<AppError>,
        calls: usize,
    }

    /// In-memory stand-in for the events and responses tables.
    #[derive(Default)]
    pub struct MemoryOwners(Mutex<Tables>);

    impl MemoryOwners {
        pub fn add_event(&self, owner: &str) {
            self.0.lock().unwrap().event_owners.push(owner.to_string());
        }

        pub fn add_response(&self, owner: &str) {
            self.0.lock().unwrap().response_owners.push(owner.to_string());
        }

        pub fn fail_with(&self, err: AppError) {
            self.0.lock().unwrap().failure = Some(err);
        }

        pub fn recover(&self) {
            self.0.lock().unwrap().failure = None;
        }

        pub fn calls(&self) -> usize {
            self.0.lock().unwrap().calls
        }

        pub fn owned_by(&self, owner: &str) -> usize {
            let tables = self.0.lock().unwrap();
            tables
                .event_owners
                .iter()
                .chain(tables.response_owners.iter())
                .filter(|o| o.as_str() == owner)
                .count()
        }
    }

    #[async_trait]
    impl OwnershipStore for MemoryOwners {
        async fn reassign_owner(&self, from_id: &str, to_id: &str) -> Result<MigrationOutcome, AppError> {
            let mut tables = self.0.lock().unwrap();
            tables.calls += 1;
            if let Some(err) = tables.failure.clone() {
                return Err(err);
            }
            let mut outcome = MigrationOutcome::default();
            for owner in tables.event_owners.iter_mut().filter(|o| o.as_str() == from_id) {
                *owner = to_id.to_string();
                outcome.events_moved += 1;
            }
            for owner in tables.response_owners.iter_mut().filter(|o| o.as_str() == from_id) {
                *owner = to_id.to_string();
                outcome.responses_moved += 1;
            }
            Ok(outcome)
        }
    }

    #[actix_rt::test]
    async fn second_run_is_a_noop() {
        let owners = MemoryOwners::default();
        owners.add_event("anon-1");
        owners.add_response("anon-1");

        let first = migrate_user_data(&owners, "anon-1", "user-1").await.unwrap();
        assert_eq!(first, MigrationOutcome { events_moved: 1, responses_moved: 1 });

        let second = migrate_user_data(&owners, "anon-1", "user-1").await.unwrap();
        assert!(second.is_noop());
        assert_eq!(owners.owned_by("user-1"), 2);
    }

    #[actix_rt::test]
    async fn same_ids_skip_the_store() {
        let owners = MemoryOwners::default();
        let outcome = migrate_user_data(&owners, "user-1", "user-1").await.unwrap();
        assert!(outcome.is_noop());
        assert_eq!(owners.calls(), 0);
    }

    #[actix_rt::test]
    async fn blank_ids_are_rejected() {
        let owners = MemoryOwners::default();
        assert_eq!(migrate_user_data(&owners, " ", "user-1").await, Err(AppError::BadClientData));
    }

    #[actix_rt::test]
    async fn store_failure_leaves_rows_untouched() {
        let owners = MemoryOwners::default();
        owners.add_event("anon-1");
        owners.fail_with(AppError::InternalError);
        assert!(migrate_user_data(&owners, "anon-1", "user-1").await.is_err());
        assert_eq!(owners.owned_by("anon-1"), 1);
    }

    #[actix_rt::test]
    async fn only_anonymous_ids_can_be_claimed() {
        let owners = MemoryOwners::default();
        let victim = uuid::Uuid::new_v4().to_string();
        owners.add_event(&victim);
        let claimed = claim_anonymous_id(&owners, &victim, uuid::Uuid::new_v4()).await;
        assert_eq!(claimed, Err(AppError::BadClientData));
        assert_eq!(owners.owned_by(&victim), 1);

        let anon = identity::new_anonymous_id();
        owners.add_response(&anon);
        let user = uuid::Uuid::new_v4();
        let claimed = claim_anonymous_id(&owners, &anon, user).await.unwrap();
        assert_eq!(claimed.responses_moved, 1);
    }
}
