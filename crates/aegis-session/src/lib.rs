//! Core-B's session store: a concurrent map from client public key bytes to
//! a derived session key and its creation time, with TTL-driven eviction.
//!
//! Eviction is lazy — checked only at access time, never by a background
//! sweeper (see workspace spec §4.3 invariants). The map is keyed on the raw
//! PEM bytes of the client's public key, which is also the RPC's
//! `public_key` field, so no separate identifier scheme is needed.

use aegis_crypto::SessionKey;
use dashmap::DashMap;
use std::time::{Duration, Instant};

struct SessionRecord {
    session_key: SessionKey,
    created_at: Instant,
}

/// Outcome of accessing the store for a given client public key at a given
/// instant. The caller (Core-B's RPC handler) drives the rest of the state
/// machine described in workspace spec §4.5: `Absent` derives-and-inserts,
/// `Fresh` proceeds, `Expired` fails the RPC with `UNAUTHENTICATED`.
pub enum SessionAccess {
    /// No record exists yet; the caller should derive a key and call
    /// [`SessionStore::insert`].
    Absent,
    /// A non-expired record exists; use this key.
    Fresh(SessionKey),
    /// A record existed but `now - created_at > ttl`; it has been evicted as
    /// a side effect of this call. The caller must fail the current RPC and
    /// wait for the client to re-handshake.
    Expired,
}

pub struct SessionStore {
    records: DashMap<Vec<u8>, SessionRecord>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            records: DashMap::new(),
            ttl,
        }
    }

    /// Looks up `client_public_key` at `now`, evicting it first if its TTL
    /// has elapsed. Never creates a record — see [`Self::insert`].
    pub fn access(&self, client_public_key: &[u8], now: Instant) -> SessionAccess {
        let Some(entry) = self.records.get(client_public_key) else {
            return SessionAccess::Absent;
        };
        if now.saturating_duration_since(entry.created_at) > self.ttl {
            drop(entry);
            self.records.remove(client_public_key);
            return SessionAccess::Expired;
        }
        SessionAccess::Fresh(entry.session_key.clone())
    }

    /// Records a freshly derived session key for `client_public_key`,
    /// stamped with `now`. Called only on [`SessionAccess::Absent`].
    pub fn insert(&self, client_public_key: Vec<u8>, session_key: SessionKey, now: Instant) {
        self.records.insert(
            client_public_key,
            SessionRecord {
                session_key,
                created_at: now,
            },
        );
    }

    /// Current number of live (not-yet-checked-for-expiry) records, exposed
    /// as the `aegis_active_sessions` gauge.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(byte: u8) -> SessionKey {
        SessionKey([byte; 32])
    }

    #[test]
    fn absent_then_insert_then_fresh() {
        let store = SessionStore::new(Duration::from_secs(600));
        let now = Instant::now();
        let pubkey = b"client-a".to_vec();

        assert!(matches!(store.access(&pubkey, now), SessionAccess::Absent));
        store.insert(pubkey.clone(), key(1), now);
        assert!(matches!(store.access(&pubkey, now), SessionAccess::Fresh(_)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn expired_record_is_evicted_and_reported() {
        let store = SessionStore::new(Duration::from_secs(5));
        let t0 = Instant::now();
        let pubkey = b"client-b".to_vec();

        store.insert(pubkey.clone(), key(2), t0);

        let still_fresh = t0 + Duration::from_secs(4);
        assert!(matches!(store.access(&pubkey, still_fresh), SessionAccess::Fresh(_)));

        let past_ttl = t0 + Duration::from_secs(6);
        assert!(matches!(store.access(&pubkey, past_ttl), SessionAccess::Expired));

        // Evicted — a second access at the same instant reports Absent, not Expired again.
        assert!(matches!(store.access(&pubkey, past_ttl), SessionAccess::Absent));
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn distinct_clients_do_not_interfere() {
        let store = SessionStore::new(Duration::from_secs(600));
        let now = Instant::now();
        store.insert(b"a".to_vec(), key(1), now);
        store.insert(b"b".to_vec(), key(2), now);
        assert_eq!(store.len(), 2);
        assert!(matches!(store.access(b"a", now), SessionAccess::Fresh(_)));
        assert!(matches!(store.access(b"b", now), SessionAccess::Fresh(_)));
    }
}
