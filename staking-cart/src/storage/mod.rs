//! Durable key-value storage for cart state
//!
//! The cart serializes its full state into a single string value on every
//! change, so a backend only needs string get/set/remove.

mod memory;
mod sqlite;

pub use memory::MemoryKvStore;
pub use sqlite::SqliteKvStore;

use crate::error::CartResult;

/// String key-value store backing the cart
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> CartResult<Option<String>>;

    fn set(&self, key: &str, value: &str) -> CartResult<()>;

    fn remove(&self, key: &str) -> CartResult<()>;

    /// Backend name for logging
    fn backend_name(&self) -> &'static str;
}
