//! Storage backends for devices and tokens.
//!
//! `MemoryStore` keeps everything in process; `SqliteStore` persists to disk.
//! Both implement [`DeviceRegistry`](devauth_core::DeviceRegistry) and
//! [`TokenStore`](devauth_core::TokenStore) with the same atomicity guarantees.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
