//! Secret Persistence
//!
//! Seeds, blindings and play salts must survive a restart between commit and
//! reveal. Losing them forfeits the reveal; the timeout protocol is the only
//! recovery.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    SECRET STORE                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  secrets.rs - Typed seed/play records keyed by (session,    │
//! │               party)                                        │
//! │  memory.rs  - In-process key-value store                    │
//! │  file.rs    - One JSON file per key, atomic replace         │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod file;
pub mod memory;
pub mod secrets;

use thiserror::Error;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use secrets::{PlayRecord, SecretStore, SeedRecord};

/// Storage errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Underlying read or write failed.
    #[error("storage I/O: {0}")]
    Io(String),

    /// A record could not be (de)serialized.
    #[error("record serialization: {0}")]
    Serde(String),

    /// A stored field is malformed.
    #[error("corrupt record `{key}`: {reason}")]
    Corrupt {
        /// Storage key.
        key: String,
        /// What was wrong.
        reason: String,
    },
}

/// Minimal string key-value port.
pub trait KeyValueStore: Send + Sync {
    /// Read a value.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write a value, replacing any previous one.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove a value. Removing a missing key is not an error.
    fn delete(&self, key: &str) -> Result<(), StoreError>;
}
