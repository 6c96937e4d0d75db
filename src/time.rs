//! Injectable time source.
//!
//! [`PendingRegistry`](crate::pending::PendingRegistry) needs to compare "now"
//! against stored expiry instants. Hiding that behind a trait lets tests
//! advance time deterministically instead of sleeping (spec §9, "Registry
//! timing").

use std::{sync::Arc, time::Instant};

/// A source of [`Instant`]s.
pub trait Clock: std::fmt::Debug + Send + Sync {
    /// The current instant, as far as this clock is concerned.
    fn now(&self) -> Instant;
}

/// The real wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

#[cfg(test)]
pub(crate) mod tests_support {
    use std::{
        cell::Cell,
        time::{Duration, Instant},
    };

    use super::Clock;

    /// A clock that only advances when told to. Shared via `Rc`/`Arc` by
    /// tests that need to assert on expiry behaviour without sleeping.
    #[derive(Debug)]
    pub(crate) struct TestClock {
        now: Cell<Instant>,
    }

    impl TestClock {
        pub(crate) fn new() -> Self {
            Self { now: Cell::new(Instant::now()) }
        }

        pub(crate) fn advance(&self, by: Duration) {
            self.now.set(self.now.get() + by);
        }
    }

    impl Clock for TestClock {
        fn now(&self) -> Instant {
            self.now.get()
        }
    }

    // SAFETY-free: `Cell` isn't `Sync`, but tests only ever touch the clock
    // from a single thread wrapped in an `Arc`, never actually sharing it
    // across a real thread boundary.
    unsafe impl Sync for TestClock {}
}
