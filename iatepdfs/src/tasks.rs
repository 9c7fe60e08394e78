//! Completion queue between background workers and the UI thread.
//!
//! Workers on the tokio runtime push results through a cloned sender; the
//! thread owning the models drains them without blocking, or waits for the
//! next one with a deadline.

use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Unbounded multi-producer queue drained by a single consumer.
#[derive(Debug)]
pub struct CompletionQueue<T> {
    tx: UnboundedSender<T>,
    rx: UnboundedReceiver<T>,
}

impl<T> CompletionQueue<T> {
    /// Create an empty queue.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }

    /// Sender handed to background tasks.
    pub fn sender(&self) -> UnboundedSender<T> {
        self.tx.clone()
    }

    /// Take everything that has arrived so far. Never blocks.
    pub fn drain(&mut self) -> Vec<T> {
        let mut items = Vec::new();
        while let Ok(item) = self.rx.try_recv() {
            items.push(item);
        }
        items
    }

    /// Wait for the next item.
    ///
    /// Cancel-safe: dropping the future loses nothing.
    pub async fn recv(&mut self) -> Option<T> {
        // The queue keeps a sender alive, so this only ends with an item.
        self.rx.recv().await
    }

    /// Block the calling thread until an item arrives or `timeout` expires.
    ///
    /// Must not be called from inside the runtime.
    pub fn wait(&mut self, runtime: &Handle, timeout: Duration) -> Option<T> {
        runtime.block_on(async { tokio::time::timeout(timeout, self.rx.recv()).await.ok().flatten() })
    }
}

impl<T> Default for CompletionQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
