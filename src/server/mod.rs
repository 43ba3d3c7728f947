//! The ingress HTTP surface: webhook endpoints and a health check.

pub mod app;
pub mod health;
pub mod routes;

pub use app::{build_app, AppState};
