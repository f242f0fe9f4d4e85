pub mod auth;
pub mod crypto;
pub mod event;
pub mod identity;
pub mod log;
pub mod migration;
pub mod splash;
pub mod timeslot;
pub mod user;
