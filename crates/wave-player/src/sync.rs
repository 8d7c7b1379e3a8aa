//! One-shot rendezvous points for third-party synchronization.
//!
//! A transport request may carry a [`SyncPoint`]; after the engine has
//! applied the transition (and acknowledged the caller) it meets the
//! matching [`SyncWaiter`], then forgets the point. Both sides block
//! until the other arrives; the wait carries no timeout.

use crossbeam_channel::{Receiver, Sender, bounded};

/// The half handed to a transport request; consumed when signalled.
pub struct SyncPoint {
    tx: Sender<()>,
}

/// The half a third-party thread blocks on.
pub struct SyncWaiter {
    rx: Receiver<()>,
}

impl SyncPoint {
    /// Create a connected rendezvous pair.
    pub fn pair() -> (SyncPoint, SyncWaiter) {
        let (tx, rx) = bounded(0);
        (SyncPoint { tx }, SyncWaiter { rx })
    }

    /// Meet the waiter. Blocks until it arrives; a dropped waiter is
    /// treated as already satisfied.
    pub(crate) fn signal(self) {
        let _ = self.tx.send(());
    }
}

impl SyncWaiter {
    /// Block until the engine signals the paired point.
    pub fn wait(&self) {
        let _ = self.rx.recv();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn signal_meets_waiter_across_threads() {
        let (point, waiter) = SyncPoint::pair();
        let handle = thread::spawn(move || waiter.wait());
        point.signal();
        handle.join().unwrap();
    }

    #[test]
    fn signal_with_dropped_waiter_does_not_block() {
        let (point, waiter) = SyncPoint::pair();
        drop(waiter);
        point.signal();
    }
}
