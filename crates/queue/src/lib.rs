//! Bounded-admission job queue for the genflow platform.
//!
//! [`TaskQueue`] runs up to a fixed number of job bodies concurrently and
//! parks the rest in strict arrival order. It knows nothing about task
//! records: a job body is an opaque future that owns all of its context.

pub mod queue;

pub use queue::{Admission, QueueStats, TaskQueue, DEFAULT_MAX_CONCURRENT};
