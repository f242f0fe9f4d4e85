use actix_web::{get, post, web, HttpRequest, HttpResponse};

use crate::{
    config::Config,
    errors::AppError,
    service::{self, auth::require_user, identity::IdentityContext},
    PGPool,
};

#[get("/dashboard")]
pub async fn dashboard(req: HttpRequest, pool_state: web::Data<PGPool>) -> Result<HttpResponse, AppError> {
    let user = require_user(&req)?;
    let events = service::event::dashboard(&user.user_id.to_string(), pool_state.get_ref()).await?;
    Ok(HttpResponse::Ok().json(events))
}

/// Folds the anonymous id carried by this client's cookie into the account.
#[post("/migrations")]
pub async fn claim(
    req: HttpRequest,
    pool_state: web::Data<PGPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    require_user(&req)?;
    let mut identity = IdentityContext::from_request(&req, &config.anon_cookie_name);
    let outcome = identity.claim_anonymous_data(pool_state.get_ref()).await?;
    let mut builder = HttpResponse::Ok();
    identity.into_store().apply(&mut builder);
    Ok(builder.json(outcome))
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(dashboard).service(claim);
}
