//! Session store over a key/value backend.

use std::sync::Arc;

use alloy::primitives::Address;
use tracing::{debug, warn};
use tradekey_core::TradingSession;

use crate::backend::{FileBackend, KvBackend, MemoryBackend};
use crate::error::StoreResult;
use crate::record::StoredSession;

const KEY_PREFIX: &str = "tradekey:session:";

/// Storage key for `eoa`'s session.
pub fn session_key(eoa: Address) -> String {
    format!("{KEY_PREFIX}{}", eoa.to_string().to_lowercase())
}

/// Persistence for trading sessions, keyed by EOA.
pub trait SessionStore: Send + Sync {
    /// Load the session for `eoa`.
    ///
    /// Missing, unreadable or invalid records all yield `None`; the cause is
    /// logged, never returned.
    fn load(&self, eoa: Address) -> Option<TradingSession>;

    /// Overwrite the stored session for `eoa`.
    fn save(&self, eoa: Address, session: &TradingSession) -> StoreResult<()>;

    /// Remove the stored session for `eoa`. Clearing twice is fine.
    fn clear(&self, eoa: Address) -> StoreResult<()>;
}

/// Arc wrapper for SessionStore trait objects.
pub type DynSessionStore = Arc<dyn SessionStore>;

/// [`SessionStore`] encoding records as JSON in a [`KvBackend`].
#[derive(Debug)]
pub struct KvSessionStore<B> {
    backend: B,
}

pub type MemorySessionStore = KvSessionStore<MemoryBackend>;
pub type FileSessionStore = KvSessionStore<FileBackend>;

impl<B: KvBackend> KvSessionStore<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

impl MemorySessionStore {
    pub fn in_memory() -> Self {
        Self::new(MemoryBackend::new())
    }
}

impl<B: KvBackend> SessionStore for KvSessionStore<B> {
    fn load(&self, eoa: Address) -> Option<TradingSession> {
        let key = session_key(eoa);
        let raw = match self.backend.get(&key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(%eoa, error = %e, "Failed to read stored session");
                return None;
            }
        };

        match StoredSession::from_json(&raw).and_then(|record| record.into_session(eoa)) {
            Ok(session) => {
                debug!(%eoa, "Loaded stored session");
                Some(session)
            }
            Err(e) => {
                warn!(%eoa, error = %e, "Ignoring unreadable stored session");
                None
            }
        }
    }

    fn save(&self, eoa: Address, session: &TradingSession) -> StoreResult<()> {
        let json = StoredSession::from_session(session).to_json()?;
        self.backend.set(&session_key(eoa), &json)
    }

    fn clear(&self, eoa: Address) -> StoreResult<()> {
        self.backend.remove(&session_key(eoa))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tradekey_core::ApiCredentials;

    fn eoa() -> Address {
        "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".parse().unwrap()
    }

    fn session() -> TradingSession {
        let now = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        let mut s = TradingSession::new(eoa(), Address::repeat_byte(0x22), now);
        s.is_safe_deployed = true;
        s.has_approvals = true;
        s.set_credentials(ApiCredentials::new("key-1", "secret-1", "pass-1"));
        s
    }

    #[test]
    fn test_session_key_is_lowercase() {
        assert_eq!(
            session_key(eoa()),
            "tradekey:session:0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );
    }

    #[test]
    fn test_save_load_roundtrip() {
        let store = MemorySessionStore::in_memory();
        assert!(store.load(eoa()).is_none());

        store.save(eoa(), &session()).unwrap();
        assert_eq!(store.load(eoa()), Some(session()));
    }

    #[test]
    fn test_save_overwrites() {
        let store = MemorySessionStore::in_memory();
        store.save(eoa(), &session()).unwrap();

        let mut updated = session();
        updated.has_approvals = false;
        updated.clear_credentials();
        store.save(eoa(), &updated).unwrap();

        let loaded = store.load(eoa()).unwrap();
        assert!(!loaded.has_approvals);
        assert!(!loaded.has_api_credentials());
    }

    #[test]
    fn test_clear_is_idempotent() {
        let store = MemorySessionStore::in_memory();
        store.save(eoa(), &session()).unwrap();

        store.clear(eoa()).unwrap();
        assert!(store.load(eoa()).is_none());
        store.clear(eoa()).unwrap();
        assert!(store.backend().is_empty());
    }

    #[test]
    fn test_corrupt_record_loads_as_none() {
        let store = MemorySessionStore::in_memory();
        store.backend().set_raw(&session_key(eoa()), "{not json");
        assert!(store.load(eoa()).is_none());

        // A fresh save replaces the corrupt record
        store.save(eoa(), &session()).unwrap();
        assert!(store.load(eoa()).is_some());
    }

    #[test]
    fn test_record_under_wrong_key_is_rejected() {
        let store = MemorySessionStore::in_memory();
        let other = Address::repeat_byte(0x44);
        let json = StoredSession::from_session(&session()).to_json().unwrap();
        store.backend().set_raw(&session_key(other), &json);

        assert!(store.load(other).is_none());
    }

    #[test]
    fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(FileBackend::new(dir.path()).unwrap());

        store.save(eoa(), &session()).unwrap();
        let reopened = FileSessionStore::new(FileBackend::new(dir.path()).unwrap());
        assert_eq!(reopened.load(eoa()), Some(session()));

        reopened.clear(eoa()).unwrap();
        assert!(store.load(eoa()).is_none());
    }
}
