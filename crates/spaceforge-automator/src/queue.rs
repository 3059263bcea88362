//! Serialized ordering queue.
//!
//! Handlers that mutate a shared ordered resource ("insert at position N")
//! must not interleave: two concurrent inserts that both read the current
//! length would claim the same position. [`OrderingQueue`] runs such steps one
//! at a time, in the order they were enqueued, across every caller holding a
//! handle to the same queue.
//!
//! ```text
//! enqueue(s1) ─┐
//! enqueue(s2) ─┼─▶ [ s1 | s2 | s3 ] ─▶ worker: s1 ▶ s2 ▶ s3
//! enqueue(s3) ─┘
//! ```
//!
//! A step that fails (or panics) settles its own handle and the chain moves
//! on. The queue is coarse-grained: unrelated resources sharing one queue
//! wait on each other.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::Poll;

use futures::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::error::{AutomatorError, Result};

struct Step {
    sequence: u64,
    job: BoxFuture<'static, ()>,
}

#[derive(Default)]
struct QueueState {
    next_sequence: u64,
    sender: Option<mpsc::UnboundedSender<Step>>,
}

/// FIFO queue running one step at a time.
///
/// Cloning yields another handle onto the same queue. The worker task is
/// spawned on the first [`enqueue`](OrderingQueue::enqueue) and exits once
/// every handle has been dropped and the remaining steps have run.
#[derive(Clone, Default)]
pub struct OrderingQueue {
    state: Arc<Mutex<QueueState>>,
    pending: Arc<AtomicUsize>,
}

impl OrderingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `step` to the queue.
    ///
    /// The step's position is fixed by this call: it starts only after every
    /// step enqueued before it has settled, whether or not the returned
    /// handle is ever awaited.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime when the worker has not been
    /// started yet.
    pub fn enqueue<F, Fut, T>(&self, step: F) -> StepHandle<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.pending.fetch_add(1, Ordering::SeqCst);
        let guard = PendingGuard(Arc::clone(&self.pending));
        let job = async move {
            let value = step().await;
            drop(guard);
            // the caller may have stopped waiting
            let _ = tx.send(value);
        }
        .boxed();

        let mut state = self.state.lock();
        let sequence = state.next_sequence;
        state.next_sequence += 1;

        let sender = state.sender.get_or_insert_with(|| {
            let (sender, receiver) = mpsc::unbounded_channel();
            tokio::spawn(run_worker(receiver));
            sender
        });

        if sender.send(Step { sequence, job }).is_err() {
            // worker is gone (its runtime shut down); the dropped job closes `rx`
            state.sender = None;
            warn!(sequence, "Ordering queue worker unavailable, step dropped");
        } else {
            debug!(sequence, "Enqueued ordered step");
        }

        StepHandle {
            sequence,
            receiver: rx,
        }
    }

    /// Steps enqueued but not yet settled.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for OrderingQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderingQueue")
            .field("pending", &self.pending())
            .finish()
    }
}

/// Decrements the pending count when a step settles, panics or is dropped.
struct PendingGuard(Arc<AtomicUsize>);

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

async fn run_worker(mut receiver: mpsc::UnboundedReceiver<Step>) {
    while let Some(Step { sequence, job }) = receiver.recv().await {
        debug!(sequence, "Starting ordered step");
        if let Err(e) = tokio::spawn(job).await {
            warn!(sequence, error = %e, "Ordered step aborted");
        }
        debug!(sequence, "Ordered step settled");
    }
    debug!("Ordering queue worker stopped");
}

/// Outcome of one enqueued step.
///
/// Resolves to the step's value, or [`AutomatorError::StepAborted`] if the
/// step never produced one.
#[derive(Debug)]
pub struct StepHandle<T> {
    sequence: u64,
    receiver: oneshot::Receiver<T>,
}

impl<T> StepHandle<T> {
    /// Position of this step in the queue's total order.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl<T> Future for StepHandle<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut std::task::Context<'_>) -> Poll<Self::Output> {
        let sequence = self.sequence;
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map_err(|_| AutomatorError::StepAborted {
                sequence,
                reason: "step ended without producing a value".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_enqueue_returns_step_value() {
        let queue = OrderingQueue::new();
        let value = queue.enqueue(|| async { 7 }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_sequences_increase() {
        let queue = OrderingQueue::new();
        let a = queue.enqueue(|| async {});
        let b = queue.enqueue(|| async {});
        assert_eq!(a.sequence(), 0);
        assert_eq!(b.sequence(), 1);
        a.await.unwrap();
        b.await.unwrap();
    }

    #[tokio::test]
    async fn test_steps_run_in_enqueue_order_despite_latency() {
        let queue = OrderingQueue::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for (id, delay_ms) in [(1u32, 30u64), (2, 0), (3, 10)] {
            let log = log.clone();
            handles.push(queue.enqueue(move || async move {
                log.lock().push(format!("start {id}"));
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                log.lock().push(format!("end {id}"));
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(
            *log.lock(),
            vec!["start 1", "end 1", "start 2", "end 2", "start 3", "end 3"]
        );
    }

    #[tokio::test]
    async fn test_failed_step_does_not_block_chain() {
        let queue = OrderingQueue::new();
        let failed = queue.enqueue(|| async { Err::<u32, &str>("rejected") });
        let next = queue.enqueue(|| async { Ok::<u32, &str>(2) });

        assert_eq!(failed.await.unwrap(), Err("rejected"));
        assert_eq!(next.await.unwrap(), Ok(2));
    }

    #[tokio::test]
    async fn test_panicking_step_aborts_only_itself() {
        let queue = OrderingQueue::new();
        let boom = queue.enqueue(|| async {
            panic!("step exploded");
        });
        let next = queue.enqueue(|| async { "still running" });

        let err: AutomatorError = boom.await.unwrap_err();
        assert!(matches!(err, AutomatorError::StepAborted { sequence: 0, .. }));
        assert_eq!(next.await.unwrap(), "still running");
    }

    #[tokio::test]
    async fn test_unawaited_handle_still_runs() {
        let queue = OrderingQueue::new();
        let ran = Arc::new(AtomicUsize::new(0));
        let flag = ran.clone();
        drop(queue.enqueue(move || async move {
            flag.fetch_add(1, Ordering::SeqCst);
        }));

        queue.enqueue(|| async {}).await.unwrap();
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_clones_share_one_order() {
        let queue = OrderingQueue::new();
        let other = queue.clone();
        let a = queue.enqueue(|| async { "a" });
        let b = other.enqueue(|| async { "b" });
        assert_eq!(b.sequence(), a.sequence() + 1);
        assert_eq!(a.await.unwrap(), "a");
        assert_eq!(b.await.unwrap(), "b");
    }

    #[tokio::test]
    async fn test_pending_drains_to_zero() {
        let queue = OrderingQueue::new();
        let (release_tx, release_rx) = oneshot::channel::<()>();
        let blocked = queue.enqueue(move || async move {
            let _ = release_rx.await;
        });
        let queued = queue.enqueue(|| async {});
        assert_eq!(queue.pending(), 2);

        release_tx.send(()).unwrap();
        blocked.await.unwrap();
        queued.await.unwrap();
        assert_eq!(queue.pending(), 0);
    }
}
