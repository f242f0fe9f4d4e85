use actix_web::{get, post, web, HttpRequest, HttpResponse};
use uuid::Uuid;

use crate::{
    config::Config,
    dto::{NewEventDto, NewResponseDto, ZoneQuery},
    errors::AppError,
    service::{self, identity::IdentityContext, timeslot},
    PGPool,
};

#[post("")]
pub async fn create(
    req: HttpRequest,
    new_event_dto: web::Json<NewEventDto>,
    pool_state: web::Data<PGPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let mut identity = IdentityContext::from_request(&req, &config.anon_cookie_name);
    let creator_id = identity.current_user_id();
    let tz_offset = new_event_dto.tz_offset;
    let event = service::event::create(creator_id.clone(), new_event_dto.into_inner(), pool_state.get_ref()).await?;
    let zone = timeslot::zone_from_offset_minutes(tz_offset)?;
    let mut builder = HttpResponse::Created();
    identity.into_store().apply(&mut builder);
    Ok(builder.json(service::event::view(event, &zone, Some(creator_id.as_str()))))
}

#[get("/{id}")]
pub async fn get_by_id(
    req: HttpRequest,
    id: web::Path<Uuid>,
    query: web::Query<ZoneQuery>,
    pool_state: web::Data<PGPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let zone = timeslot::zone_from_offset_minutes(query.tz_offset)?;
    let viewer = IdentityContext::from_request(&req, &config.anon_cookie_name).known_id();
    let event = service::event::get_by_id(id.into_inner(), pool_state.get_ref()).await?;
    Ok(HttpResponse::Ok().json(service::event::view(event, &zone, viewer.as_deref())))
}

#[post("/{id}/responses")]
pub async fn respond(
    req: HttpRequest,
    event_id: web::Path<Uuid>,
    response_dto: web::Json<NewResponseDto>,
    pool_state: web::Data<PGPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let mut identity = IdentityContext::from_request(&req, &config.anon_cookie_name);
    let user_id = identity.current_user_id();
    let response_id = service::event::submit_response(
        event_id.into_inner(),
        user_id,
        response_dto.into_inner(),
        pool_state.get_ref(),
    )
    .await?;
    let mut builder = HttpResponse::Created();
    identity.into_store().apply(&mut builder);
    Ok(builder.json(serde_json::json!({ "id": response_id })))
}

#[get("/{id}/results")]
pub async fn results(
    req: HttpRequest,
    id: web::Path<Uuid>,
    query: web::Query<ZoneQuery>,
    pool_state: web::Data<PGPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let zone = timeslot::zone_from_offset_minutes(query.tz_offset)?;
    let viewer = IdentityContext::from_request(&req, &config.anon_cookie_name).known_id();
    let results = service::event::results(id.into_inner(), &zone, viewer.as_deref(), pool_state.get_ref()).await?;
    Ok(HttpResponse::Ok().json(results))
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/events")
            .service(create)
            .service(get_by_id)
            .service(respond)
            .service(results),
    );
}
