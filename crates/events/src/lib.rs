//! Outbound notification delivery for the genflow platform.
//!
//! Currently a single channel: [`WebhookNotifier`] delivers a task's
//! terminal snapshot to a caller-supplied URL with bounded retries.

pub mod webhook;

pub use webhook::{terminal_payload, WebhookError, WebhookNotifier};
