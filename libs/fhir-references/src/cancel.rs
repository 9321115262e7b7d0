//! Cooperative cancellation for reference resolution.
//!
//! Built on a `tokio::sync::watch` channel: the caller keeps the
//! [`CancellationHandle`], the resolver checks the [`CancellationToken`] before
//! each search and races it against the in-flight search.

use tokio::sync::watch;

#[derive(Debug)]
pub struct CancellationHandle {
    tx: watch::Sender<bool>,
}

impl CancellationHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

#[derive(Debug, Clone)]
pub struct CancellationToken {
    rx: watch::Receiver<bool>,
}

impl CancellationToken {
    pub fn new() -> (CancellationHandle, CancellationToken) {
        let (tx, rx) = watch::channel(false);
        (CancellationHandle { tx }, CancellationToken { rx })
    }

    /// A token that is never cancelled.
    pub fn none() -> Self {
        let (handle, token) = Self::new();
        // Dropping the sender leaves the value at `false` forever.
        drop(handle);
        token
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation is requested; pends forever otherwise.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::none()
    }
}
