//! Per-call client session cache
//!
//! OpenSSL reports new client sessions through a context-wide callback. Each
//! `Ssl` carries a [`CacheSlot`] in its ex-data naming the cache and key the
//! callback should file the session under, so one shared context can serve
//! any number of independent caches.

use super::state::{detach, SessionState};
use openssl::error::ErrorStack;
use openssl::ex_data::Index;
use openssl::ssl::{Ssl, SslRef, SslSession};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

/// Client session cache keyed by dialed address
#[derive(Clone, Default)]
pub struct SessionCache {
    entries: Arc<Mutex<HashMap<String, SslSession>>>,
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, SslSession>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Latest session stored for `address`
    pub fn get(&self, address: &str) -> Option<SessionState> {
        self.lock()
            .get(address)
            .cloned()
            .map(SessionState::from_session)
    }

    /// Remove and return the session stored for `address`
    pub fn take(&self, address: &str) -> Option<SessionState> {
        self.lock().remove(address).map(SessionState::from_session)
    }

    pub fn contains(&self, address: &str) -> bool {
        self.lock().contains_key(address)
    }

    pub fn insert(&self, address: impl Into<String>, session: SslSession) {
        self.lock().insert(address.into(), session);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl std::fmt::Debug for SessionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let entries = self.lock();
        f.debug_struct("SessionCache")
            .field("addresses", &entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Where the new-session callback should store a connection's session
pub(crate) struct CacheSlot {
    pub(crate) cache: SessionCache,
    pub(crate) address: String,
}

static SLOT_INDEX: OnceLock<Index<Ssl, CacheSlot>> = OnceLock::new();

/// Ex-data index for [`CacheSlot`], allocated once per process
pub(crate) fn slot_index() -> Result<Index<Ssl, CacheSlot>, ErrorStack> {
    if let Some(index) = SLOT_INDEX.get() {
        return Ok(*index);
    }
    let index = Ssl::new_ex_index::<CacheSlot>()?;
    Ok(*SLOT_INDEX.get_or_init(|| index))
}

/// New-session callback body: file a copy of the session in the
/// connection's cache
pub(crate) fn store_new_session(
    index: Index<Ssl, CacheSlot>,
    ssl: &mut SslRef,
    session: SslSession,
) {
    let Some(slot) = ssl.ex_data(index) else {
        tracing::debug!("session granted on a connection without a cache");
        return;
    };
    match detach(&session) {
        Ok(copy) => {
            tracing::debug!(address = %slot.address, "session state granted");
            slot.cache.insert(slot.address.clone(), copy);
        }
        Err(e) => {
            tracing::warn!(address = %slot.address, error = %e, "unable to copy granted session")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> SslSession {
        let state = SessionState::from_legacy_fields(&[1; 32], 0x0303, 0xc02f, &[2; 48]).unwrap();
        state.session().to_owned()
    }

    #[test]
    fn test_take_consumes_entry() {
        let cache = SessionCache::new();
        cache.insert("127.0.0.1:443", session());

        assert!(cache.contains("127.0.0.1:443"));
        assert!(cache.get("127.0.0.1:443").is_some());
        assert!(cache.take("127.0.0.1:443").is_some());
        assert!(cache.take("127.0.0.1:443").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_entries_keyed_by_address() {
        let cache = SessionCache::new();
        cache.insert("a:1", session());
        cache.insert("b:1", session());
        cache.insert("a:1", session());

        assert_eq!(cache.len(), 2);
        assert!(cache.get("c:1").is_none());
    }

    #[test]
    fn test_clones_share_entries() {
        let cache = SessionCache::new();
        let other = cache.clone();
        other.insert("a:1", session());
        assert!(cache.contains("a:1"));

        // Separate instances never do
        assert!(SessionCache::new().is_empty());
    }

    #[test]
    fn test_slot_index_is_stable() {
        let a = slot_index().unwrap();
        let b = slot_index().unwrap();
        assert_eq!(a.as_raw(), b.as_raw());
    }
}
