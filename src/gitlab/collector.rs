// src/gitlab/collector.rs
// =============================================================================
// Fan-in: many producers, one owner of the results.
//
// A `FanIn` owns a bounded mpsc channel and one draining task. Producers get a
// cloned `FanInSender` and push at most one item each; the draining task is
// the only code that ever touches the accumulator. When the queue is full a
// producer waits on `send` until the drain catches up, so nothing is dropped
// and memory stays bounded by the capacity.
//
// The accumulator is only reachable through `finish`, which closes our own
// sender and awaits the draining task. The task returns the Vec only after
// `recv` has reported the channel closed, i.e. after every sender is gone, so
// an early or partial read cannot be expressed.
//
// Arrival order is whatever order the producers happened to finish in.
// =============================================================================

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub struct FanIn<T> {
    tx: mpsc::Sender<T>,
    drain: JoinHandle<Vec<T>>,
}

/// Producer side of a `FanIn`.
pub struct FanInSender<T> {
    tx: mpsc::Sender<T>,
}

// Manual impl: cloning the sender must not require `T: Clone`.
impl<T> Clone for FanInSender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T: Send + 'static> FanIn<T> {
    /// Spawns the draining task. A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel(capacity.max(1));

        let drain = tokio::spawn(async move {
            let mut items = Vec::new();
            while let Some(item) = rx.recv().await {
                items.push(item);
            }
            items
        });

        Self { tx, drain }
    }

    pub fn sender(&self) -> FanInSender<T> {
        FanInSender {
            tx: self.tx.clone(),
        }
    }

    /// Closes the queue and returns everything that was sent.
    ///
    /// Call only after every producer has finished (the pool's `join`);
    /// a sender that is still alive keeps this waiting.
    pub async fn finish(self) -> Vec<T> {
        drop(self.tx);

        match self.drain.await {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(error = %e, "fan-in drain task failed");
                Vec::new()
            }
        }
    }
}

impl<T> FanInSender<T> {
    /// Waits for room in the queue, then hands the item over.
    pub async fn send(&self, item: T) {
        if self.tx.send(item).await.is_err() {
            // Only possible if the draining task itself died.
            tracing::warn!("fan-in queue closed before producer finished");
        }
    }
}
