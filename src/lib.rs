pub mod api;
pub mod auth;
pub mod config;
pub mod domain;
pub mod email;
pub mod error;
pub mod repository;
pub mod service;
pub mod web;

pub use api::create_app;

/// Schema migrations under `migrations/`, shared by the server, the seed
/// tool and the tests.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
