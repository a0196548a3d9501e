//! Cooperative shutdown handshake for long-running tasks.
//!
//! A caller signals intent to stop and blocks until the task acknowledges
//! that it has drained its current unit of work and exited. Expressed as a
//! channel of reply channels: `stop()` sends a oneshot sender and awaits it.

use tokio::sync::{mpsc, oneshot};

/// Create a linked stop handle and receiver.
#[must_use]
pub fn stop_channel() -> (StopHandle, StopReceiver) {
    let (tx, rx) = mpsc::channel(1);
    (StopHandle { tx }, StopReceiver { rx })
}

/// Caller-side handle requesting a graceful stop.
#[derive(Clone)]
pub struct StopHandle {
    tx: mpsc::Sender<oneshot::Sender<()>>,
}

impl StopHandle {
    /// Request the task to stop and wait until it has fully quiesced.
    ///
    /// Returns immediately if the task has already exited.
    pub async fn stop(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(ack_tx).await.is_err() {
            // Task already gone, nothing to drain.
            return;
        }
        // Err means the task dropped the ack sender while exiting, which is
        // still a completed shutdown.
        let _ = ack_rx.await;
    }
}

/// Task-side receiver for stop requests.
pub struct StopReceiver {
    rx: mpsc::Receiver<oneshot::Sender<()>>,
}

impl StopReceiver {
    /// Wait for a stop request. Resolves only when a caller is blocked in
    /// [`StopHandle::stop`].
    pub async fn requested(&mut self) -> StopAck {
        match self.rx.recv().await {
            Some(ack) => StopAck { ack: Some(ack) },
            // All handles dropped: treat as a stop request nobody awaits.
            None => StopAck { ack: None },
        }
    }
}

/// Acknowledgment token completing the handshake.
pub struct StopAck {
    ack: Option<oneshot::Sender<()>>,
}

impl StopAck {
    /// Unblock the caller of [`StopHandle::stop`].
    pub fn confirm(self) {
        if let Some(ack) = self.ack {
            let _ = ack.send(());
        }
    }
}
