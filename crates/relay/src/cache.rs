//! Outstanding probe cache
//!
//! Remembers the nonce of every ping we sent so that the echoing pong can
//! be recognised and timed. Unanswered pings expire.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use flightguard_core::{Id, Nonce};

/// Default TTL for an unanswered ping (30 seconds)
const DEFAULT_TTL: Duration = Duration::from_secs(30);

/// Maximum number of outstanding pings
const DEFAULT_MAX_SIZE: usize = 4096;

/// A ping waiting for its pong
#[derive(Debug, Clone, Copy)]
struct PendingPing {
    peer: Id,
    sent_at_millis: u64,
    created_at: Instant,
}

/// Result of matching a pong against the outstanding pings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PingClaim {
    /// The ping went to this peer; carries its send time
    Matched { sent_at_millis: u64 },
    /// The ping went to someone else; the entry is left in place
    WrongPeer { pinged: Id },
    /// No live ping with this nonce
    Unknown,
}

/// nonce → (peer, send time) for pings still awaiting a pong
pub struct PendingPings {
    entries: Mutex<HashMap<Nonce, PendingPing>>,
    ttl: Duration,
    max_size: usize,
}

impl PendingPings {
    /// Create a new cache with default settings
    pub fn new() -> Self {
        Self::with_config(DEFAULT_TTL, DEFAULT_MAX_SIZE)
    }

    /// Create a cache with custom TTL and max size
    pub fn with_config(ttl: Duration, max_size: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            max_size,
        }
    }

    /// Record a ping sent to `peer` at `sent_at_millis` (UTC)
    pub fn insert(&self, nonce: Nonce, peer: Id, sent_at_millis: u64) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());

        // Evict expired entries if at capacity
        if entries.len() >= self.max_size {
            let ttl = self.ttl;
            entries.retain(|_, entry| entry.created_at.elapsed() < ttl);
        }

        // If still at capacity, remove oldest entry
        if entries.len() >= self.max_size {
            if let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, entry)| entry.created_at)
                .map(|(k, _)| *k)
            {
                entries.remove(&oldest);
            }
        }

        entries.insert(
            nonce,
            PendingPing {
                peer,
                sent_at_millis,
                created_at: Instant::now(),
            },
        );
    }

    /// Claim the pending ping for `nonce` if it exists and has not expired.
    ///
    /// Returns the peer it was sent to and when. A nonce can only be
    /// claimed once.
    pub fn take(&self, nonce: &Nonce) -> Option<(Id, u64)> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let entry = entries.remove(nonce)?;
        (entry.created_at.elapsed() < self.ttl).then_some((entry.peer, entry.sent_at_millis))
    }

    /// Claim the pending ping for `nonce` on behalf of `peer`.
    ///
    /// Only the peer the ping was sent to can claim it. A claim by anyone
    /// else leaves the entry for the real peer's pong.
    pub fn take_for(&self, nonce: &Nonce, peer: &Id) -> PingClaim {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let Some(entry) = entries.get(nonce).copied() else {
            return PingClaim::Unknown;
        };
        if entry.created_at.elapsed() >= self.ttl {
            entries.remove(nonce);
            return PingClaim::Unknown;
        }
        if entry.peer != *peer {
            return PingClaim::WrongPeer { pinged: entry.peer };
        }
        entries.remove(nonce);
        PingClaim::Matched {
            sent_at_millis: entry.sent_at_millis,
        }
    }

    /// Check if a nonce is outstanding and not expired
    pub fn contains(&self, nonce: &Nonce) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(nonce)
            .is_some_and(|entry| entry.created_at.elapsed() < self.ttl)
    }

    /// Get the number of entries in the cache
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove all expired entries
    pub fn evict_expired(&self) {
        let ttl = self.ttl;
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|_, entry| entry.created_at.elapsed() < ttl);
    }
}

impl Default for PendingPings {
    fn default() -> Self {
        Self::new()
    }
}
