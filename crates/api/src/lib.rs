//! HTTP surface and process wiring for the genflow platform.
//!
//! Exposes the task API (create / poll / list / cancel / delete), the
//! queue observability endpoint, and the health check. The [`engine`]
//! module holds the glue that turns a created task into a job body for
//! the queue.

pub mod config;
pub mod engine;
pub mod error;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
