//! HTTP handlers for memo-api, one module per resource.

pub mod analytics;
pub mod auth;
pub mod categories;
pub mod entries;
pub mod metrics;
pub mod tags;
pub mod users;
