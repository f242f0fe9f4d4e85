use log::debug;
use sqlx::{Execute, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{dto, models::User, PGPool};

pub async fn create(user: &User, pool: &PGPool) -> Result<u64, sqlx::Error> {
    let res = sqlx::query("INSERT INTO users (id, email, pwd_hash, access_token) VALUES ($1, $2, $3, $4)")
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.pwd_hash)
        .bind(&user.access_token)
        .execute(pool)
        .await?;
    Ok(res.rows_affected())
}

pub async fn get_by_id(id: Uuid, pool: &PGPool) -> Result<User, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT id, email, pwd_hash, access_token FROM users WHERE id = $1")
        .bind(id)
        .fetch_one(pool)
        .await
}

pub async fn get_by_email(email: &str, pool: &PGPool) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT id, email, pwd_hash, access_token FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await
}

pub async fn exists(email: &str, pool: &PGPool) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM users WHERE email = $1)")
        .bind(email)
        .fetch_one(pool)
        .await
}

pub async fn get_access_token(id: Uuid, pool: &PGPool) -> Result<Option<String>, sqlx::Error> {
    let token = sqlx::query_scalar::<_, Option<String>>("SELECT access_token FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(token.flatten())
}

pub async fn set_fields(id: Uuid, user_fields: dto::UpdateUserDto, pool: &PGPool) -> Result<u64, sqlx::Error> {
    if user_fields.is_empty() {
        return Ok(0u64);
    }
    let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE users SET ");
    let mut separated = query_builder.separated(", ");
    if let Some(pwd_hash) = user_fields.pwd_hash {
        separated.push("pwd_hash = ").push_bind_unseparated(pwd_hash);
    }
    if let Some(access_token) = user_fields.access_token {
        separated.push("access_token = ").push_bind_unseparated(access_token);
    }
    query_builder.push(" WHERE id = ").push_bind(id);

    let query = query_builder.build();
    debug!("function 'set_fields' was executed with sql query string '{}'", query.sql());
    let res = query.execute(pool).await?;
    Ok(res.rows_affected())
}
