pub mod auth;
pub mod event;
pub mod user;

use actix_web::web;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.configure(auth::init_routes)
        .configure(event::init_routes)
        .configure(user::init_routes);
}
