use actix_web::{get, post, put, web, HttpRequest, HttpResponse};
use log::info;

use crate::{
    config::Config,
    dto::{
        CredentialsDto, PasswordResetConfirmDto, PasswordResetRequestDto, SessionDto, SplashPasswordDto,
        UpdatePasswordDto,
    },
    errors::AppError,
    models::User,
    service::{self, auth::require_user, identity::IdentityContext},
    PGPool,
};

#[post("/splash")]
pub async fn splash(
    dto: web::Json<SplashPasswordDto>,
    pool_state: web::Data<PGPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let valid = service::splash::verify_splash_password(&dto.password, pool_state.get_ref(), &config).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "valid": valid })))
}

/// Finishes sign-up/sign-in: migrates the anonymous id, if any, and answers
/// with the session plus the resulting cookie change.
async fn open_session(
    req: &HttpRequest,
    user: User,
    token: String,
    pool: &PGPool,
    config: &Config,
) -> HttpResponse {
    let mut identity = IdentityContext::from_request(req, &config.anon_cookie_name);
    let migration = identity.complete_sign_in(user.id, pool).await;
    let mut builder = HttpResponse::Ok();
    identity.into_store().apply(&mut builder);
    builder.json(SessionDto {
        user_id: user.id,
        email: user.email,
        access_token: token,
        migration,
    })
}

#[post("/sign-up")]
pub async fn sign_up(
    req: HttpRequest,
    dto: web::Json<CredentialsDto>,
    pool_state: web::Data<PGPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let pool = pool_state.get_ref();
    let (user, token) = service::user::sign_up(dto.into_inner(), pool, &config).await?;
    Ok(open_session(&req, user, token, pool, &config).await)
}

#[post("/sign-in")]
pub async fn sign_in(
    req: HttpRequest,
    dto: web::Json<CredentialsDto>,
    pool_state: web::Data<PGPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let pool = pool_state.get_ref();
    let (user, token) = service::user::sign_in(dto.into_inner(), pool, &config).await?;
    Ok(open_session(&req, user, token, pool, &config).await)
}

#[post("/sign-out")]
pub async fn sign_out(
    req: HttpRequest,
    pool_state: web::Data<PGPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let user = require_user(&req)?;
    service::user::sign_out(user.user_id, pool_state.get_ref()).await?;
    let mut identity = IdentityContext::from_request(&req, &config.anon_cookie_name);
    identity.sign_out();
    let body = identity.describe();
    let mut builder = HttpResponse::Ok();
    identity.into_store().apply(&mut builder);
    Ok(builder.json(body))
}

#[get("/session")]
pub async fn session(req: HttpRequest, config: web::Data<Config>) -> HttpResponse {
    let mut identity = IdentityContext::from_request(&req, &config.anon_cookie_name);
    let body = identity.describe();
    let mut builder = HttpResponse::Ok();
    identity.into_store().apply(&mut builder);
    builder.json(body)
}

#[put("/password")]
pub async fn update_password(
    req: HttpRequest,
    dto: web::Json<UpdatePasswordDto>,
    pool_state: web::Data<PGPool>,
) -> Result<HttpResponse, AppError> {
    let user = require_user(&req)?;
    service::user::update_password(user.user_id, &dto.password, pool_state.get_ref()).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[post("/password-reset")]
pub async fn request_password_reset(
    dto: web::Json<PasswordResetRequestDto>,
    pool_state: web::Data<PGPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    service::user::request_password_reset(&dto.email, pool_state.get_ref(), &config).await?;
    Ok(HttpResponse::Accepted().json("If the address is registered, a reset link is on its way"))
}

#[post("/password-reset/confirm")]
pub async fn confirm_password_reset(
    dto: web::Json<PasswordResetConfirmDto>,
    pool_state: web::Data<PGPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    service::user::confirm_password_reset(dto.into_inner(), pool_state.get_ref(), &config).await?;
    info!("password reset confirmed");
    Ok(HttpResponse::NoContent().finish())
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(splash).service(
        web::scope("/auth")
            .service(sign_up)
            .service(sign_in)
            .service(sign_out)
            .service(session)
            .service(update_password)
            .service(request_password_reset)
            .service(confirm_password_reset),
    );
}
