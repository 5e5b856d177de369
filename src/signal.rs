//! The two pieces of state shared between the control loop and the watcher.
//!
//! * [`slot`] — a capacity-one "something changed" channel.  Publishing
//!   never blocks: when a notification is already pending the new one is
//!   dropped, so any burst collapses into a single wake-up.
//! * [`shutdown`] — a cancellation signal that any number of tasks can
//!   observe.

use tokio::sync::{mpsc, watch};

/// Create a single-slot notification channel.
pub fn slot<T>() -> (SlotSender<T>, SlotReceiver<T>) {
    let (tx, rx) = mpsc::channel(1);
    (SlotSender { tx }, SlotReceiver { rx })
}

/// Publishing half of [`slot`].
#[derive(Debug, Clone)]
pub struct SlotSender<T> {
    tx: mpsc::Sender<T>,
}

impl<T> SlotSender<T> {
    /// Offer `value` without waiting.
    ///
    /// Returns `false` if the value was dropped, either because a
    /// notification is already pending or because the receiver is gone.
    pub fn publish(&self, value: T) -> bool {
        self.tx.try_send(value).is_ok()
    }
}

/// Consuming half of [`slot`].
#[derive(Debug)]
pub struct SlotReceiver<T> {
    rx: mpsc::Receiver<T>,
}

impl<T> SlotReceiver<T> {
    /// Wait for the pending notification.  `None` once every sender is
    /// gone and nothing is pending.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Take the pending notification, if any.
    pub fn try_recv(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }
}

/// Create a cancellation signal.
pub fn shutdown() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx })
}

/// Fires the cancellation signal.
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

/// Observes the cancellation signal.  Cheap to clone; every clone sees the
/// same signal.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once cancellation has been requested.
    ///
    /// If the trigger is dropped without firing, this never resolves.
    pub async fn cancelled(&mut self) {
        let closed = self.rx.wait_for(|cancelled| *cancelled).await.is_err();
        if closed {
            std::future::pending::<()>().await;
        }
    }
}
