//! Request coalescing for overlay fetches.
//!
//! When several callers ask for the same cache key while a fetch is already
//! running, only the first (the leader) performs the network request. The
//! others either wait for the leader's outcome or, for asynchronous callers,
//! return immediately knowing the work is under way.
//!
//! ```text
//! get(a)        ─┐
//! async_fetch(a)─┼──► FetchCoalescer ──► one HTTP GET
//! get(a)        ─┘         │
//!                          ▼
//!                 waiters woken with the leader's outcome
//! ```

use crate::overlay::CacheKey;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use tracing::debug;

/// Outcome shared with waiters; errors travel as their display string.
pub type FetchOutcome = Result<(), String>;

#[derive(Default)]
struct InFlight {
    outcome: Mutex<Option<FetchOutcome>>,
    ready: Condvar,
}

/// Tracks in-flight fetches by cache key.
#[derive(Default)]
pub struct FetchCoalescer {
    in_flight: DashMap<CacheKey, Arc<InFlight>>,
    total_requests: AtomicU64,
    coalesced_requests: AtomicU64,
}

/// Statistics for monitoring coalescing effectiveness.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CoalescerStats {
    pub total_requests: u64,
    pub coalesced_requests: u64,
}

/// Result of registering interest in a key.
pub enum Registration {
    /// Caller must perform the fetch and complete the ticket
    Leader(LeaderTicket),
    /// Another caller is already fetching the key
    Follower(Waiter),
}

impl FetchCoalescer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a request for `key`.
    ///
    /// Uses the map's entry API so check-and-insert is atomic.
    pub fn register(self: &Arc<Self>, key: &CacheKey) -> Registration {
        self.total_requests.fetch_add(1, Ordering::Relaxed);

        match self.in_flight.entry(key.clone()) {
            Entry::Occupied(entry) => {
                self.coalesced_requests.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, "Coalescing request with in-flight fetch");
                Registration::Follower(Waiter {
                    slot: Arc::clone(entry.get()),
                })
            }
            Entry::Vacant(entry) => {
                let slot = Arc::new(InFlight::default());
                entry.insert(Arc::clone(&slot));
                Registration::Leader(LeaderTicket {
                    coalescer: Arc::clone(self),
                    key: key.clone(),
                    slot,
                    completed: false,
                })
            }
        }
    }

    pub fn is_in_flight(&self, key: &CacheKey) -> bool {
        self.in_flight.contains_key(key)
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    pub fn stats(&self) -> CoalescerStats {
        CoalescerStats {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            coalesced_requests: self.coalesced_requests.load(Ordering::Relaxed),
        }
    }

    fn finish(&self, key: &CacheKey, slot: &InFlight, outcome: FetchOutcome) {
        self.in_flight.remove(key);
        if let Ok(mut guard) = slot.outcome.lock() {
            *guard = Some(outcome);
        }
        slot.ready.notify_all();
    }
}

/// Held by the caller performing the fetch.
///
/// Dropping an uncompleted ticket releases waiters with an error, so a
/// panicking fetch thread never strands them.
pub struct LeaderTicket {
    coalescer: Arc<FetchCoalescer>,
    key: CacheKey,
    slot: Arc<InFlight>,
    completed: bool,
}

impl LeaderTicket {
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Publish the outcome to every waiter and clear the in-flight slot.
    pub fn complete(mut self, outcome: FetchOutcome) {
        self.completed = true;
        self.coalescer.finish(&self.key, &self.slot, outcome);
    }
}

impl Drop for LeaderTicket {
    fn drop(&mut self) {
        if !self.completed {
            self.coalescer.finish(
                &self.key,
                &self.slot,
                Err("fetch abandoned before completion".to_string()),
            );
        }
    }
}

/// Handle for a caller waiting on another thread's fetch.
pub struct Waiter {
    slot: Arc<InFlight>,
}

impl Waiter {
    /// Block until the leader completes.
    pub fn wait(self) -> FetchOutcome {
        let mut guard = match self.slot.outcome.lock() {
            Ok(guard) => guard,
            Err(_) => return Err("coalescer lock poisoned".to_string()),
        };
        loop {
            if let Some(outcome) = guard.as_ref() {
                return outcome.clone();
            }
            guard = match self.slot.ready.wait(guard) {
                Ok(guard) => guard,
                Err(_) => return Err("coalescer lock poisoned".to_string()),
            };
        }
    }
}
