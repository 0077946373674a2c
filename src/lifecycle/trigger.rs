//! One-shot signals shared between the handle, the serve loop and observers.
//!
//! A [`Trigger`] fires at most once. Every [`Signal`] subscribed from it,
//! before or after the fact, observes the fired state.

use std::sync::Arc;
use tokio::sync::watch;

/// Sending half of a one-shot signal.
#[derive(Debug, Clone)]
pub struct Trigger {
    tx: Arc<watch::Sender<bool>>,
}

impl Trigger {
    /// Create a trigger that has not fired yet.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Subscribe to the signal.
    pub fn subscribe(&self) -> Signal {
        Signal {
            rx: self.tx.subscribe(),
        }
    }

    /// Fire the signal. Returns `true` only for the call that fired it.
    pub fn fire(&self) -> bool {
        self.tx.send_if_modified(|fired| {
            if *fired {
                false
            } else {
                *fired = true;
                true
            }
        })
    }

    /// Whether the signal has fired.
    pub fn is_fired(&self) -> bool {
        *self.tx.borrow()
    }

    /// Returns a guard that fires the signal when dropped.
    pub(crate) fn fire_on_drop(&self) -> FireOnDrop {
        FireOnDrop(self.clone())
    }
}

impl Default for Trigger {
    fn default() -> Self {
        Self::new()
    }
}

/// Fires its trigger on drop, including during unwinding.
#[derive(Debug)]
pub(crate) struct FireOnDrop(Trigger);

impl Drop for FireOnDrop {
    fn drop(&mut self) {
        self.0.fire();
    }
}

/// Receiving half of a one-shot signal. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Signal {
    rx: watch::Receiver<bool>,
}

impl Signal {
    /// Wait until the signal fires. Returns immediately if it already has.
    ///
    /// Also returns once every [`Trigger`] for this signal has been dropped,
    /// since it can never fire after that. Check [`is_fired`](Self::is_fired)
    /// to tell the two apart.
    pub async fn wait(&mut self) {
        let _ = self.rx.wait_for(|fired| *fired).await;
    }

    /// Consume the signal and wait for it. Suitable for
    /// `with_graceful_shutdown` style APIs that take an owned future.
    pub async fn fired(mut self) {
        self.wait().await;
    }

    /// Whether the signal has fired.
    pub fn is_fired(&self) -> bool {
        *self.rx.borrow()
    }
}
