//! Trading session persistence for tradekey.
//!
//! Sessions are stored as JSON records under `tradekey:session:<lowercase eoa>`
//! in a string key/value backend:
//!
//! - [`MemoryBackend`]: process-local map (tests, ephemeral runs)
//! - [`FileBackend`]: one file per key in a directory (atomic replace)
//!
//! Unreadable records are treated as absent; see [`SessionStore::load`].

pub mod backend;
pub mod error;
pub mod record;
pub mod store;

pub use backend::{FileBackend, KvBackend, MemoryBackend};
pub use error::{StoreError, StoreResult};
pub use record::{StoredSession, SCHEMA_VERSION};
pub use store::{
    session_key, DynSessionStore, FileSessionStore, KvSessionStore, MemorySessionStore,
    SessionStore,
};
