use std::future::{ready, Ready};
use std::rc::Rc;

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    HttpMessage, HttpRequest,
};
use futures_util::future::LocalBoxFuture;
use log::{debug, warn};

use crate::{
    db,
    dto::{Claims, TokenPurpose},
    errors::AppError,
    PGPool,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAuthData {
    pub user_id: uuid::Uuid,
    pub email: String,
    pub access_token: String,
}

/// Why a bearer token sent with the request was not accepted.
#[derive(Debug, Clone)]
struct RejectedToken(AppError);

/// Authenticated caller of `req`. Fails with the reason the bearer token was
/// refused, or `AuthError` when there was none.
pub fn require_user(req: &HttpRequest) -> Result<UserAuthData, AppError> {
    let extensions = req.extensions();
    if let Some(user) = extensions.get::<UserAuthData>() {
        return Ok(user.clone());
    }
    let err = extensions
        .get::<RejectedToken>()
        .map(|rejected| rejected.0.clone())
        .unwrap_or(AppError::AuthError);
    Err(err)
}

/// A decoded access token is only good while it is still the one stored for
/// its user; signing out or in elsewhere replaces it.
fn accept_current(token: String, claims: Claims, current: Option<&str>) -> Result<UserAuthData, AppError> {
    if current != Some(token.as_str()) {
        debug!("rejected revoked token for user {}", claims.user_id);
        return Err(AppError::TokenExpirationError);
    }
    Ok(UserAuthData {
        user_id: claims.user_id,
        email: claims.email,
        access_token: token,
    })
}

/// Resolves an optional `Authorization: Bearer` header into [`UserAuthData`].
/// A missing, undecodable or revoked token leaves the request anonymous, so
/// public routes keep working; [`require_user`] reports why it was refused.
pub struct AuthMiddleware {
    pub db_pool: PGPool,
    pub secret: String,
}

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = actix_web::Error;
    type Transform = AuthMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService {
            service: Rc::new(service),
            db_pool: self.db_pool.clone(),
            secret: self.secret.clone(),
        }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: Rc<S>,
    db_pool: PGPool,
    secret: String,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let pool = self.db_pool.clone();
        let token = jwt::parse_request(&req, "Bearer ").ok();
        let claims = token
            .as_ref()
            .map(|t| jwt::decode_claims(&self.secret, TokenPurpose::Access, t));

        Box::pin(async move {
            let resolved = match (token, claims) {
                (Some(token), Some(Ok(claims))) => {
                    match db::user::get_access_token(claims.user_id, &pool).await {
                        Ok(current) => Some(accept_current(token, claims, current.as_deref())),
                        Err(err) => Some(Err(AppError::from(err))),
                    }
                }
                (_, Some(Err(err))) => {
                    warn!("bearer token rejected: {}", err);
                    Some(Err(err))
                }
                _ => None,
            };
            match resolved {
                Some(Ok(user)) => {
                    req.extensions_mut().insert(user);
                }
                Some(Err(err)) => {
                    req.extensions_mut().insert(RejectedToken(err));
                }
                None => {}
            }
            service.call(req).await
        })
    }
}


pub mod jwt {
    use actix_web::dev::ServiceRequest;
    use chrono::Utc;
    use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

    use crate::{
        dto::{Claims, TokenPurpose},
        errors::AppError,
    };

    pub fn decode_claims(secret: &str, purpose: TokenPurpose, token: &str) -> Result<Claims, AppError> {
        let decoding_key = DecodingKey::from_secret(secret.as_ref());
        let validation = Validation::new(Algorithm::HS256);
        let claims = decode::<Claims>(token, &decoding_key, &validation)?.claims;
        if claims.purpose != purpose {
            return Err(AppError::DecodeError);
        }
        Ok(claims)
    }

    pub fn create(secret: &str, mut claims: Claims, ttl_secs: u64) -> Result<String, AppError> {
        claims.exp = (Utc::now().timestamp() as u64 + ttl_secs) as usize;
        let header: Header = Header::new(Algorithm::HS256);
        let key: EncodingKey = EncodingKey::from_secret(secret.as_ref());
        encode(&header, &claims, &key).map_err(|err| {
            log::error!("failed to encode token: {:?}", err);
            AppError::InternalError
        })
    }

    pub fn parse_request(req: &ServiceRequest, prefix: &str) -> Result<String, AppError> {
        if let Some(auth_header) = req.headers().get("Authorization") {
            if let Ok(auth_value) = auth_header.to_str() {
                if let Some(token) = auth_value.strip_prefix(prefix) {
                    return Ok(token.trim().to_string());
                }
            }
        }
        Err(AppError::AuthError)
    }

}
