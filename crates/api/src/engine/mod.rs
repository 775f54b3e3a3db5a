//! Job execution glue.
//!
//! Builds job bodies for created tasks and submits them to the queue.

pub mod runner;
