//! Thin HTTP surface over the task store, vault, and processor views.

pub mod routes;

pub use routes::{ApiState, api_routes};
