//! Task persistence for the genflow platform.
//!
//! [`TaskStore`] is the single authority over task records. It prefers a
//! durable Redis backend when one is configured and reachable, and
//! permanently downgrades to an in-process map on the first backend
//! failure -- callers never observe storage errors, only the current
//! [`StoreMode`].
//!
//! - [`backend`] -- the storage seam: [`TaskBackend`] trait and its error.
//! - [`redis`] -- durable implementation with native per-key expiry.
//! - [`memory`] -- ephemeral implementation swept by the store.
//! - [`store`] -- the facade, downgrade logic, and retention sweep.

pub mod backend;
pub mod memory;
pub mod redis;
pub mod store;

pub use self::backend::{BackendError, TaskBackend};
pub use self::memory::MemoryBackend;
pub use self::redis::RedisBackend;
pub use self::store::{StoreConfig, StoreMode, TaskFilter, TaskStore, DEFAULT_LIST_LIMIT};
