use log::warn;

use crate::{config::Config, db, errors::AppError, service::crypto, PGPool};

/// Checks a candidate against the splash-screen password. The hash in
/// `app_settings` wins over the configured fallback.
pub async fn verify_splash_password(candidate: &str, pool: &PGPool, config: &Config) -> Result<bool, AppError> {
    let stored = db::settings::get(db::settings::SPLASH_PASSWORD_HASH, pool).await?;
    Ok(check_against(candidate, stored.as_deref().or(config.splash_password_hash.as_deref())))
}

pub fn check_against(candidate: &str, stored_hash: Option<&str>) -> bool {
    match stored_hash {
        Some(hash) => crypto::verify_password(candidate, hash),
        None => {
            warn!("no splash password configured, refusing access");
            false
        }
    }
}
