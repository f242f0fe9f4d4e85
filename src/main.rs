pub mod config;
pub mod db;
pub mod dto;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod service;

use actix_web::{web, App, HttpServer};
use config::Config;
use db::init_db_pool;
use log::{error, info};
use service::{auth::AuthMiddleware, log::LoggerMiddleware};
use sqlx::{postgres::Postgres, Pool};
use std::env;

type PGPool = Pool<Postgres>;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // `yup-that-works hash <password>` prints a value for app_settings.splash_password_hash
    let args: Vec<String> = env::args().collect();
    if args.get(1).map(String::as_str) == Some("hash") {
        return match args.get(2) {
            Some(password) => {
                println!("{}", service::crypto::hash_password(password));
                Ok(())
            }
            None => {
                eprintln!("usage: {} hash <password>", args[0]);
                std::process::exit(1);
            }
        };
    }

    service::log::init_logger();
    let config = Config::load().unwrap_or_else(|e| {
        error!("configuration error: {}", e);
        std::process::exit(1);
    });
    let pool: PGPool = init_db_pool(&config).await.unwrap_or_else(|e| {
        error!("failed to initialise database: {:?}", e);
        std::process::exit(1);
    });

    let bind = (config.bind_addr.clone(), config.port);
    info!("listening on {}:{}", bind.0, bind.1);
    let config_state = web::Data::new(config);
    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(pool.clone()))
            .app_data(config_state.clone())
            .wrap(AuthMiddleware {
                db_pool: pool.clone(),
                secret: config_state.jwt_secret.clone(),
            })
            .wrap(LoggerMiddleware)
            .configure(handlers::configure)
    })
    .bind(bind)?
    .run()
    .await
}
