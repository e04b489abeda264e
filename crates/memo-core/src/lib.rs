//! # memo-core
//!
//! Core types, traits, and analytics helpers for memo.
//!
//! This crate holds the domain model (users, categories, entries, tags,
//! metrics), the error type, the repository traits implemented by
//! `memo-db`, and the pure functions behind the analytics views.
//!
//! ## Logging
//!
//! All crates log through `tracing` with the fields `subsystem` ("api" or
//! "db"), `component`, `op`, `user_id` and, where relevant, `entry_id`,
//! `result_count` and `duration_ms`.
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Request failed for a reason the caller cannot fix |
//! | WARN  | Recoverable issue, fallback applied (e.g. unparsable backdate) |
//! | INFO  | Lifecycle events, completed writes |
//! | DEBUG | Decision points, resolved filters, window boundaries |
//! | TRACE | Per-item iteration (tag and metric resolution) |

pub mod analytics;
pub mod defaults;
pub mod error;
pub mod models;
pub mod scope;
pub mod tags;
pub mod temporal;
pub mod traits;
pub mod uuid_utils;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use models::*;
pub use scope::UserScope;
pub use tags::{normalize_tag_names, validate_tag_name};
pub use temporal::{AnalyticsWindow, NamedRange};
pub use traits::*;
pub use uuid_utils::{extract_timestamp, new_v7, new_v7_at};
