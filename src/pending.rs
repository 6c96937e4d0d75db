//! Bounded, time-expiring tracking of in-flight requests (spec §4.3).

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use crate::{
    error::Error,
    time::{Clock, SystemClock},
};

/// Default capacity and expiry (spec §6.6).
pub const DEFAULT_MAX_PENDING: usize = 128;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug)]
struct Entry<P> {
    payload: P,
    expires_at: Instant,
    seq: u64,
}

/// A single-owner, non-thread-shared map of `request_id -> (payload, expiry)`.
///
/// The time source is injectable so expiry can be driven deterministically in
/// tests instead of by sleeping (spec §9 "Registry timing").
#[derive(Debug)]
pub struct PendingRegistry<P, C: Clock = SystemClock> {
    entries: HashMap<String, Entry<P>>,
    max_pending: usize,
    timeout: Duration,
    clock: C,
    next_seq: u64,
}

impl<P> PendingRegistry<P, SystemClock> {
    pub fn new(max_pending: usize, timeout: Duration) -> Self {
        Self::with_clock(max_pending, timeout, SystemClock)
    }
}

impl<P, C: Clock> PendingRegistry<P, C> {
    pub fn with_clock(max_pending: usize, timeout: Duration, clock: C) -> Self {
        Self { entries: HashMap::new(), max_pending, timeout, clock, next_seq: 0 }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Records `payload` under `id`. Fails with [`Error::TooManyPending`] if
    /// the registry is already at `max_pending` -- expired entries are not
    /// swept first, matching spec §4.3's unconditional capacity check.
    pub fn insert(&mut self, id: impl Into<String>, payload: P) -> Result<(), Error> {
        if self.entries.len() >= self.max_pending {
            return Err(Error::TooManyPending { max: self.max_pending });
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        let expires_at = self.clock.now() + self.timeout;
        self.entries.insert(id.into(), Entry { payload, expires_at, seq });
        Ok(())
    }

    /// Sweeps expired entries (without invoking a callback), then returns
    /// whether `id` is still present and unexpired.
    pub fn contains(&mut self, id: &str) -> bool {
        self.remove_expired_inner(|_, _| {});
        self.entries.contains_key(id)
    }

    /// Sweeps expired entries (invoking `on_expired` for each), then removes
    /// and returns `id`'s payload if its expiry is still in the future.
    pub fn extract(&mut self, id: &str, mut on_expired: impl FnMut(&str, &P)) -> Option<P> {
        self.remove_expired_inner(&mut on_expired);
        let now = self.clock.now();
        match self.entries.remove(id) {
            Some(entry) if entry.expires_at > now => Some(entry.payload),
            _ => None,
        }
    }

    /// Sweeps all expired entries, invoking `on_expired` for each. Returns
    /// the number removed.
    pub fn remove_expired(&mut self, on_expired: impl FnMut(&str, &P)) -> usize {
        self.remove_expired_inner(on_expired)
    }

    fn remove_expired_inner(&mut self, mut on_expired: impl FnMut(&str, &P)) -> usize {
        let now = self.clock.now();
        let expired: Vec<String> =
            self.entries.iter().filter(|(_, e)| e.expires_at <= now).map(|(id, _)| id.clone()).collect();
        for id in &expired {
            if let Some(entry) = self.entries.remove(id) {
                on_expired(id, &entry.payload);
            }
        }
        expired.len()
    }

    /// Drops all entries without invoking any callback.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// The id of the oldest (by insertion order) entry satisfying `predicate`,
    /// if any. Used by [`crate::state_machine::StateMachine`] to pick "the
    /// earliest" pending request (spec §4.4.2).
    pub fn oldest(&self, predicate: impl Fn(&str) -> bool) -> Option<String> {
        self.entries
            .iter()
            .filter(|(id, _)| predicate(id))
            .min_by_key(|(_, e)| e.seq)
            .map(|(id, _)| id.clone())
    }
}
