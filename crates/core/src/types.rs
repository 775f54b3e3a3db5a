/// All task identifiers are UUIDv4, assigned at creation and immutable.
pub type TaskId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
