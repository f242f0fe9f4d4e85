use log::{debug, info};
use uuid::Uuid;

use crate::{
    config::Config,
    db,
    dto::{Claims, CredentialsDto, PasswordResetConfirmDto, TokenPurpose, UpdateUserDto},
    errors::AppError,
    models::User,
    service::{auth::jwt, crypto},
    PGPool,
};

pub const MIN_PASSWORD_LEN: usize = 6;

pub fn normalize_email(email: &str) -> Result<String, AppError> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(AppError::BadClientData),
    }
}

pub fn check_password(pwd: &str) -> Result<(), AppError> {
    if pwd.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::BadClientData);
    }
    Ok(())
}

fn access_token(user_id: &Uuid, email: &str, config: &Config) -> Result<String, AppError> {
    jwt::create(
        &config.jwt_secret,
        Claims::new(user_id, email, TokenPurpose::Access, 0),
        config.access_token_ttl_secs,
    )
}

/// Creates an account and returns it with a fresh access token.
pub async fn sign_up(dto: CredentialsDto, pool: &PGPool, config: &Config) -> Result<(User, String), AppError> {
    let email = normalize_email(&dto.email)?;
    check_password(&dto.password)?;
    if db::user::exists(&email, pool).await? {
        return Err(AppError::BadClientData);
    }
    let id = Uuid::new_v4();
    let token = access_token(&id, &email, config)?;
    let user = User {
        id,
        email,
        pwd_hash: crypto::hash_password(&dto.password),
        access_token: Some(token.clone()),
    };
    db::user::create(&user, pool).await?;
    info!("user {} signed up", user.id);
    Ok((user, token))
}

pub async fn sign_in(dto: CredentialsDto, pool: &PGPool, config: &Config) -> Result<(User, String), AppError> {
    let email = normalize_email(&dto.email).map_err(|_| AppError::AuthError)?;
    let user = db::user::get_by_email(&email, pool)
        .await?
        .ok_or(AppError::AuthError)?;
    if !crypto::verify_password(&dto.password, &user.pwd_hash) {
        return Err(AppError::AuthError);
    }
    let token = access_token(&user.id, &user.email, config)?;
    let fields = UpdateUserDto {
        access_token: Some(Some(token.clone())),
        ..Default::default()
    };
    db::user::set_fields(user.id, fields, pool).await?;
    info!("user {} signed in", user.id);
    Ok((user, token))
}

pub async fn sign_out(user_id: Uuid, pool: &PGPool) -> Result<(), AppError> {
    let fields = UpdateUserDto {
        access_token: Some(None),
        ..Default::default()
    };
    db::user::set_fields(user_id, fields, pool).await?;
    info!("user {} signed out", user_id);
    Ok(())
}

pub async fn update_password(user_id: Uuid, pwd: &str, pool: &PGPool) -> Result<(), AppError> {
    check_password(pwd)?;
    let fields = UpdateUserDto {
        pwd_hash: Some(crypto::hash_password(pwd)),
        ..Default::default()
    };
    match db::user::set_fields(user_id, fields, pool).await? {
        0 => Err(AppError::NotFound),
        _ => Ok(()),
    }
}

/// Issues a single-use reset token. Nothing is mailed from here, so the token
/// is only logged at debug level; unknown addresses are not revealed.
pub async fn request_password_reset(email: &str, pool: &PGPool, config: &Config) -> Result<(), AppError> {
    let email = match normalize_email(email) {
        Ok(email) => email,
        Err(_) => return Ok(()),
    };
    let user = match db::user::get_by_email(&email, pool).await? {
        Some(user) => user,
        None => {
            debug!("password reset requested for unknown address");
            return Ok(());
        }
    };
    let mut claims = Claims::new(&user.id, &user.email, TokenPurpose::Reset, 0);
    claims.fingerprint = Some(crypto::fingerprint(&user.pwd_hash));
    let token = jwt::create(&config.jwt_secret, claims, config.reset_token_ttl_secs)?;
    debug!("password reset token for {}: {}", user.id, token);
    Ok(())
}

pub async fn confirm_password_reset(dto: PasswordResetConfirmDto, pool: &PGPool, config: &Config) -> Result<(), AppError> {
    check_password(&dto.password)?;
    let claims = jwt::decode_claims(&config.jwt_secret, TokenPurpose::Reset, dto.token.trim())?;
    let user = db::user::get_by_id(claims.user_id, pool).await?;
    if claims.fingerprint.as_deref() != Some(crypto::fingerprint(&user.pwd_hash).as_str()) {
        return Err(AppError::TokenExpirationError);
    }
    let fields = UpdateUserDto {
        pwd_hash: Some(crypto::hash_password(&dto.password)),
        access_token: Some(None),
    };
    db::user::set_fields(user.id, fields, pool).await?;
    info!("password reset for user {}", user.id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails_are_trimmed_and_lowercased() {
        assert_eq!(normalize_email("  Ada@Example.COM ").unwrap(), "ada@example.com");
        assert!(normalize_email("no-at-sign").is_err());
        assert!(normalize_email("@example.com").is_err());
        assert!(normalize_email("ada@localhost").is_err());
    }

    #[test]
    fn short_passwords_are_rejected() {
        assert_eq!(check_password("12345"), Err(AppError::BadClientData));
        assert!(check_password("123456").is_ok());
    }
}
