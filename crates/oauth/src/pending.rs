//! Authorization requests that were handed out but not yet redeemed.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
    time::{Duration, Instant},
};

use {
    base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD},
    rand::RngCore,
    subtle::ConstantTimeEq,
    tracing::debug,
};

/// Upper bound on outstanding authorizations. The oldest is evicted first.
pub const MAX_PENDING: usize = 10_000;

/// Generate a random state parameter.
pub fn generate_state() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn safe_equal(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

struct PendingEntry {
    state: String,
    issued_at: Instant,
}

/// One live state nonce per user, expiring after `ttl`.
pub struct PendingAuthorizations {
    entries: Mutex<HashMap<String, PendingEntry>>,
    ttl: Duration,
    max_entries: usize,
}

impl PendingAuthorizations {
    pub fn new(ttl: Duration) -> Self {
        Self::with_limit(ttl, MAX_PENDING)
    }

    pub fn with_limit(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, PendingEntry>> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let ttl = self.ttl;
        entries.retain(|_, e| e.issued_at.elapsed() < ttl);
        entries
    }

    /// Return the user's live state, minting a new one if there is none or
    /// if less than half its lifetime is left.
    pub fn issue(&self, user: &str) -> String {
        let mut entries = self.lock();
        let reuse_window = self.ttl / 2;
        if let Some(entry) = entries.get(user)
            && entry.issued_at.elapsed() < reuse_window
        {
            return entry.state.clone();
        }

        if !entries.contains_key(user) && entries.len() >= self.max_entries {
            let oldest = entries
                .iter()
                .min_by_key(|(_, e)| e.issued_at)
                .map(|(u, _)| u.clone());
            if let Some(oldest) = oldest {
                entries.remove(&oldest);
                debug!(user = %oldest, "evicted oldest pending authorization");
            }
        }

        let state = generate_state();
        entries.insert(user.to_string(), PendingEntry {
            state: state.clone(),
            issued_at: Instant::now(),
        });
        state
    }

    /// Redeem `state` for `user`. Succeeds at most once per issued state.
    /// A mismatch leaves the pending entry in place.
    pub fn consume(&self, user: &str, state: &str) -> bool {
        let mut entries = self.lock();
        let matches = entries
            .get(user)
            .is_some_and(|entry| safe_equal(&entry.state, state));
        if matches {
            entries.remove(user);
        }
        matches
    }

    pub fn discard(&self, user: &str) {
        self.lock().remove(user);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
