use crate::PGPool;

pub const SPLASH_PASSWORD_HASH: &str = "splash_password_hash";

pub async fn get(key: &str, pool: &PGPool) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>("SELECT value FROM app_settings WHERE key = $1")
        .bind(key)
        .fetch_optional(pool)
        .await
}
