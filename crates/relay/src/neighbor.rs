//! Neighbor table
//!
//! One map from peer identity to its last observed state, behind a single
//! lock. The lock is never held across an `.await`; callers that need to
//! send work from a [`NeighborTable::snapshot`].

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Mutex, MutexGuard};

use flightguard_core::Id;

/// Observed state of one peer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NeighborInfo {
    /// UTC seconds of the last packet or probe seen from this peer
    pub last_seen: u64,
    /// Most recent time-of-flight or round trip, not an average
    pub rtt_ms: u32,
    pub addr: SocketAddr,
}

#[derive(Debug, Default)]
pub struct NeighborTable {
    entries: Mutex<HashMap<Id, NeighborInfo>>,
}

impl NeighborTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Id, NeighborInfo>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Insert or overwrite a neighbor. Returns true if it was new.
    pub fn upsert(&self, id: Id, info: NeighborInfo) -> bool {
        self.lock().insert(id, info).is_none()
    }

    /// Insert a neighbor only if it is not already known. Returns true if
    /// it was inserted; an existing entry is left untouched.
    pub fn insert_if_absent(&self, id: Id, info: NeighborInfo) -> bool {
        match self.lock().entry(id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(info);
                true
            }
        }
    }

    pub fn get(&self, id: &Id) -> Option<NeighborInfo> {
        self.lock().get(id).copied()
    }

    pub fn contains(&self, id: &Id) -> bool {
        self.lock().contains_key(id)
    }

    /// Eviction is decided outside the relay core
    pub fn remove(&self, id: &Id) -> Option<NeighborInfo> {
        self.lock().remove(id)
    }

    /// Identity of the neighbor last seen at `addr`, if any
    pub fn find_by_addr(&self, addr: &SocketAddr) -> Option<Id> {
        self.lock()
            .iter()
            .filter(|(_, info)| info.addr == *addr)
            .max_by_key(|(_, info)| info.last_seen)
            .map(|(id, _)| *id)
    }

    /// Point-in-time copy of every entry
    pub fn snapshot(&self) -> Vec<(Id, NeighborInfo)> {
        self.lock().iter().map(|(id, info)| (*id, *info)).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
