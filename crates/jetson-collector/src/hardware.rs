//! The hardware interface seam.
//!
//! A [`HardwareInterface`] produces one [`StatsSnapshot`] per cycle and sets
//! the collection cadence by blocking in [`ok`](HardwareInterface::ok) until
//! the next snapshot is ready. [`HardwareSession`] scopes ownership of the
//! handle so it is released on every exit path.

use std::ops::{Deref, DerefMut};

use tracing::debug;

use crate::board::BoardHints;
use crate::snapshot::StatsSnapshot;

/// A source of hardware telemetry.
pub trait HardwareInterface {
    /// Block until a fresh snapshot is available.
    ///
    /// Returns `false` once the interface can no longer produce snapshots.
    fn ok(&mut self) -> bool;

    /// The snapshot made available by the last successful [`ok`](Self::ok).
    fn stats(&self) -> StatsSnapshot;

    /// Structured board fields, for interfaces that know them.
    fn board_hints(&self) -> Option<BoardHints> {
        None
    }

    /// Release the underlying resources. Must be idempotent.
    fn close(&mut self) {}
}

/// Exclusive, scoped ownership of a hardware interface.
///
/// Dropping the session closes the interface, including during unwinding.
pub struct HardwareSession<H: HardwareInterface> {
    inner: H,
}

impl<H: HardwareInterface> HardwareSession<H> {
    pub fn new(inner: H) -> Self {
        Self { inner }
    }
}

impl<H: HardwareInterface> Deref for HardwareSession<H> {
    type Target = H;

    fn deref(&self) -> &H {
        &self.inner
    }
}

impl<H: HardwareInterface> DerefMut for HardwareSession<H> {
    fn deref_mut(&mut self) -> &mut H {
        &mut self.inner
    }
}

impl<H: HardwareInterface> Drop for HardwareSession<H> {
    fn drop(&mut self) {
        self.inner.close();
        debug!("hardware interface released");
    }
}

#[cfg(test)]
mod tests {
    use std::panic;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct Counting {
        closes: Arc<AtomicUsize>,
    }

    impl HardwareInterface for Counting {
        fn ok(&mut self) -> bool {
            false
        }

        fn stats(&self) -> StatsSnapshot {
            StatsSnapshot::new()
        }

        fn close(&mut self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn session_closes_on_drop() {
        let closes = Arc::new(AtomicUsize::new(0));
        {
            let mut session = HardwareSession::new(Counting { closes: closes.clone() });
            assert!(!session.ok());
        }
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn session_closes_on_panic() {
        let closes = Arc::new(AtomicUsize::new(0));
        let inner = Counting { closes: closes.clone() };

        let result = panic::catch_unwind(panic::AssertUnwindSafe(move || {
            let _session = HardwareSession::new(inner);
            panic!("loop died");
        }));

        assert!(result.is_err());
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn default_board_hints_absent() {
        let session = HardwareSession::new(Counting {
            closes: Arc::new(AtomicUsize::new(0)),
        });
        assert!(session.board_hints().is_none());
    }
}
