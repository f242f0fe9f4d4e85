//! Who is making a request: an account, or an anonymous visitor identified by
//! a client-held token.
//!
//! Anonymous ids carry an `anon-` prefix so they can never collide with an
//! account id, which is a bare UUID.

use actix_web::{
    cookie::{Cookie, SameSite},
    HttpMessage, HttpRequest, HttpResponseBuilder,
};
use log::{info, warn};
use uuid::Uuid;

use crate::dto::{IdentityDto, MigrationStatus};
use crate::errors::AppError;
use crate::models::MigrationOutcome;
use crate::service::{auth::UserAuthData, migration};

pub const ANON_PREFIX: &str = "anon-";

pub fn new_anonymous_id() -> String {
    format!("{}{}", ANON_PREFIX, Uuid::new_v4())
}

pub fn is_anonymous_id(id: &str) -> bool {
    id.strip_prefix(ANON_PREFIX)
        .map_or(false, |rest| Uuid::parse_str(rest).is_ok())
}

/// Client-side slot holding the anonymous id.
pub trait AnonymousIdStore {
    fn read(&self) -> Option<String>;
    fn write(&mut self, id: String);
    fn clear(&mut self);
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum CookieChange {
    Set(String),
    Remove,
}

/// Anonymous id carried in a cookie. Reads come from the request; writes are
/// buffered and applied to the response with [`CookieStore::apply`].
#[derive(Debug, Clone)]
pub struct CookieStore {
    name: String,
    value: Option<String>,
    change: Option<CookieChange>,
}

impl CookieStore {
    pub fn new(name: &str, value: Option<String>) -> Self {
        Self {
            name: name.to_string(),
            value: value.filter(|v| is_anonymous_id(v)),
            change: None,
        }
    }

    pub fn from_request(req: &HttpRequest, name: &str) -> Self {
        Self::new(name, req.cookie(name).map(|c| c.value().to_string()))
    }

    pub fn apply(self, res: &mut HttpResponseBuilder) {
        match self.change {
            Some(CookieChange::Set(value)) => {
                res.cookie(
                    Cookie::build(self.name, value)
                        .path("/")
                        .http_only(true)
                        .same_site(SameSite::Lax)
                        .permanent()
                        .finish(),
                );
            }
            Some(CookieChange::Remove) => {
                let mut removal = Cookie::build(self.name, "").path("/").finish();
                removal.make_removal();
                res.cookie(removal);
            }
            None => {}
        }
    }
}

impl AnonymousIdStore for CookieStore {
    fn read(&self) -> Option<String> {
        self.value.clone()
    }

    fn write(&mut self, id: String) {
        self.value = Some(id.clone());
        self.change = Some(CookieChange::Set(id));
    }

    fn clear(&mut self) {
        self.value = None;
        self.change = Some(CookieChange::Remove);
    }
}

/// Identity of one caller, threaded explicitly through request handling.
pub struct IdentityContext<S> {
    store: S,
    user_id: Option<Uuid>,
}

impl IdentityContext<CookieStore> {
    pub fn from_request(req: &HttpRequest, cookie_name: &str) -> Self {
        let user_id = req.extensions().get::<UserAuthData>().map(|u| u.user_id);
        IdentityContext::new(CookieStore::from_request(req, cookie_name), user_id)
    }
}

impl<S: AnonymousIdStore> IdentityContext<S> {
    pub fn new(store: S, user_id: Option<Uuid>) -> Self {
        Self { store, user_id }
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.user_id
    }

    pub fn anonymous_id(&self) -> Option<String> {
        self.store.read()
    }

    /// Like [`current_user_id`](Self::current_user_id) but never mints an id,
    /// for read-only requests.
    pub fn known_id(&self) -> Option<String> {
        self.user_id.map(|id| id.to_string()).or_else(|| self.store.read())
    }

    /// The id to stamp on new events and responses. Without a session this
    /// is the anonymous id, created and stored on first use.
    pub fn current_user_id(&mut self) -> String {
        if let Some(user_id) = self.user_id {
            return user_id.to_string();
        }
        match self.store.read() {
            Some(id) => id,
            None => {
                let id = new_anonymous_id();
                self.store.write(id.clone());
                id
            }
        }
    }

    pub fn describe(&mut self) -> IdentityDto {
        IdentityDto {
            user_id: self.current_user_id(),
            anonymous: self.user_id.is_none(),
        }
    }

    /// Records a successful sign-up or sign-in and moves anything the
    /// anonymous id owned over to `user_id`. The anonymous id is dropped only
    /// when the move succeeded, so a failure is retried on the next sign-in.
    pub async fn complete_sign_in<O>(&mut self, user_id: Uuid, owners: &O) -> MigrationStatus
    where
        O: migration::OwnershipStore + ?Sized,
    {
        self.user_id = Some(user_id);
        let anon_id = match self.store.read() {
            Some(id) => id,
            None => return MigrationStatus::NotNeeded,
        };
        match migration::migrate_user_data(owners, &anon_id, &user_id.to_string()).await {
            Ok(outcome) => {
                self.store.clear();
                info!("migrated anonymous data of {} to {}: {:?}", anon_id, user_id, outcome);
                MigrationStatus::Migrated(outcome)
            }
            Err(err) => {
                warn!("migration of {} to {} failed, keeping anonymous id: {}", anon_id, user_id, err);
                MigrationStatus::Failed
            }
        }
    }

    /// Moves what the anonymous id held by this client owns into the signed-in
    /// account. Only the id in the caller's own store can be claimed.
    pub async fn claim_anonymous_data<O>(&mut self, owners: &O) -> Result<MigrationOutcome, AppError>
    where
        O: migration::OwnershipStore + ?Sized,
    {
        let user_id = self.user_id.ok_or(AppError::AuthError)?;
        let anon_id = self.store.read().ok_or(AppError::BadClientData)?;
        let outcome = migration::claim_anonymous_id(owners, &anon_id, user_id).await?;
        self.store.clear();
        Ok(outcome)
    }

    /// Ends the session and starts a fresh anonymous identity.
    pub fn sign_out(&mut self) -> String {
        let previous = self.store.read();
        self.user_id = None;
        let mut fresh = new_anonymous_id();
        while previous.as_deref() == Some(fresh.as_str()) {
            fresh = new_anonymous_id();
        }
        self.store.write(fresh.clone());
        fresh
    }

    pub fn into_store(self) -> S {
        self.store
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::service::migration::tests::MemoryOwners;
    use actix_web::{test::TestRequest, HttpResponse};

    #[derive(Default)]
    pub struct MemoryIdStore(pub Option<String>);

    impl AnonymousIdStore for MemoryIdStore {
        fn read(&self) -> Option<String> {
            self.0.clone()
        }

        fn write(&mut self, id: String) {
            self.0 = Some(id);
        }

        fn clear(&mut self) {
            self.0 = None;
        }
    }

    #[test]
    fn anonymous_id_is_created_once_and_reused() {
        let mut ctx = IdentityContext::new(MemoryIdStore::default(), None);
        let first = ctx.current_user_id();
        assert!(is_anonymous_id(&first));
        assert_eq!(ctx.current_user_id(), first);
        assert_eq!(ctx.anonymous_id(), Some(first));
    }

    #[test]
    fn session_wins_over_anonymous_id() {
        let user = Uuid::new_v4();
        let mut ctx = IdentityContext::new(MemoryIdStore(Some(new_anonymous_id())), Some(user));
        assert_eq!(ctx.current_user_id(), user.to_string());
        assert!(!ctx.describe().anonymous);
    }

    #[test]
    fn sign_out_issues_a_distinct_identity() {
        let mut ctx = IdentityContext::new(MemoryIdStore::default(), Some(Uuid::new_v4()));
        let before = ctx.current_user_id();
        let old_anon = ctx.sign_out();
        assert_ne!(old_anon, before);
        assert_eq!(ctx.current_user_id(), old_anon);
        let fresh = ctx.sign_out();
        assert_ne!(fresh, old_anon);
        assert_eq!(ctx.user_id(), None);
    }

    #[actix_rt::test]
    async fn sign_in_moves_anonymous_rows_and_clears_the_id() {
        let owners = MemoryOwners::default();
        let mut ctx = IdentityContext::new(MemoryIdStore::default(), None);
        let anon = ctx.current_user_id();
        owners.add_event(&anon);
        owners.add_event(&anon);
        owners.add_response(&anon);
        owners.add_event("someone-else");

        let user = Uuid::new_v4();
        let status = ctx.complete_sign_in(user, &owners).await;
        assert_eq!(
            status,
            MigrationStatus::Migrated(MigrationOutcome { events_moved: 2, responses_moved: 1 })
        );
        assert_eq!(owners.owned_by(&anon), 0);
        assert_eq!(owners.owned_by(&user.to_string()), 3);
        assert_eq!(ctx.anonymous_id(), None);
        assert_eq!(ctx.current_user_id(), user.to_string());
    }

    #[actix_rt::test]
    async fn failed_migration_keeps_the_anonymous_id_for_retry() {
        let owners = MemoryOwners::default();
        let mut ctx = IdentityContext::new(MemoryIdStore::default(), None);
        let anon = ctx.current_user_id();
        owners.add_response(&anon);
        owners.fail_with(AppError::Timeout);

        let user = Uuid::new_v4();
        assert_eq!(ctx.complete_sign_in(user, &owners).await, MigrationStatus::Failed);
        assert_eq!(ctx.anonymous_id(), Some(anon.clone()));
        assert_eq!(owners.owned_by(&anon), 1);

        owners.recover();
        let retried = ctx.complete_sign_in(user, &owners).await;
        assert!(matches!(retried, MigrationStatus::Migrated(_)));
        assert_eq!(owners.owned_by(&anon), 0);
        assert_eq!(ctx.anonymous_id(), None);
    }

    #[actix_rt::test]
    async fn sign_in_without_anonymous_activity_needs_no_migration() {
        let owners = MemoryOwners::default();
        let mut ctx = IdentityContext::new(MemoryIdStore::default(), None);
        let status = ctx.complete_sign_in(Uuid::new_v4(), &owners).await;
        assert_eq!(status, MigrationStatus::NotNeeded);
        assert_eq!(owners.calls(), 0);
    }

    #[test]
    fn cookie_store_ignores_foreign_values() {
        let req = TestRequest::default()
            .cookie(Cookie::new("anon_id", "not-an-anon-id"))
            .to_http_request();
        assert_eq!(CookieStore::from_request(&req, "anon_id").read(), None);

        let id = new_anonymous_id();
        let req = TestRequest::default()
            .cookie(Cookie::new("anon_id", id.clone()))
            .to_http_request();
        assert_eq!(CookieStore::from_request(&req, "anon_id").read(), Some(id));
    }

    #[test]
    fn cookie_store_writes_and_removes_on_the_response() {
        let mut store = CookieStore::new("anon_id", None);
        store.write(new_anonymous_id());
        let mut builder = HttpResponse::Ok();
        store.apply(&mut builder);
        let res = builder.finish();
        let set: Vec<_> = res.cookies().collect();
        assert_eq!(set.len(), 1);
        assert!(is_anonymous_id(set[0].value()));

        let mut store = CookieStore::new("anon_id", Some(new_anonymous_id()));
        store.clear();
        let mut builder = HttpResponse::Ok();
        store.apply(&mut builder);
        let res = builder.finish();
        let removed: Vec<_> = res.cookies().collect();
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].value(), "");
    }

    #[test]
    fn known_id_does_not_mint() {
        let ctx = IdentityContext::new(MemoryIdStore::default(), None);
        assert_eq!(ctx.known_id(), None);
        assert_eq!(ctx.anonymous_id(), None);

        let anon = new_anonymous_id();
        let ctx = IdentityContext::new(MemoryIdStore(Some(anon.clone())), None);
        assert_eq!(ctx.known_id(), Some(anon));

        let user = Uuid::new_v4();
        let ctx = IdentityContext::new(MemoryIdStore(Some(new_anonymous_id())), Some(user));
        assert_eq!(ctx.known_id(), Some(user.to_string()));
    }

    #[actix_rt::test]
    async fn claim_moves_only_the_callers_own_anonymous_id() {
        let owners = MemoryOwners::default();
        let creator = new_anonymous_id();
        owners.add_event(&creator);

        // a different client that learned the creator's id still only holds its own
        let mut other = IdentityContext::new(MemoryIdStore(Some(new_anonymous_id())), Some(Uuid::new_v4()));
        let outcome = other.claim_anonymous_data(&owners).await.unwrap();
        assert!(outcome.is_noop());
        assert_eq!(owners.owned_by(&creator), 1);

        let mut without_cookie = IdentityContext::new(MemoryIdStore::default(), Some(Uuid::new_v4()));
        assert_eq!(without_cookie.claim_anonymous_data(&owners).await, Err(AppError::BadClientData));

        let mut signed_out = IdentityContext::new(MemoryIdStore(Some(creator.clone())), None);
        assert_eq!(signed_out.claim_anonymous_data(&owners).await, Err(AppError::AuthError));

        let user = Uuid::new_v4();
        let mut owner = IdentityContext::new(MemoryIdStore(Some(creator.clone())), Some(user));
        let outcome = owner.claim_anonymous_data(&owners).await.unwrap();
        assert_eq!(outcome.events_moved, 1);
        assert_eq!(owners.owned_by(&user.to_string()), 1);
        assert_eq!(owner.anonymous_id(), None);
    }
}
