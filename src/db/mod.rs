pub mod user;
pub mod event;
pub mod response;
pub mod migration;
pub mod settings;

use crate::{config::Config, PGPool};
use log::{info, warn};
use sqlx::postgres::PgPoolOptions;

pub async fn init_db_pool(config: &Config) -> Result<PGPool, sqlx::Error> {
    warn!("connecting to database with at most {} connections", config.db_max_connections);
    let pool: PGPool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await?;
    info!("Connect with postgresql");
    sqlx::migrate!().run(&pool).await?;
    info!("Migrations applied");
    Ok(pool)
}
