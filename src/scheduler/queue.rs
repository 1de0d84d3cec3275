//! Publish queue and drain loop
//!
//! The bridge between the scheduler's timer thread and the async execution
//! context. The timer thread only ever appends to the queue; the drain loop
//! removes entries inside the tokio runtime and invokes the real publish
//! handler. Each entry is removed before its handler runs and is never
//! re-enqueued by the drain, so a firing is consumed at most once even if
//! the drain runs again before the queue is empty.
//!
//! Delivery is best-effort: a crash between dequeuing an entry and
//! finishing its publish loses that entry. Nothing stronger is claimed.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::protocol::error::DispatchResult;

/// Default interval between periodic drains
pub const DEFAULT_DRAIN_INTERVAL: Duration = Duration::from_secs(30);

/// Sending half of the publish queue
///
/// Cheap to clone; `enqueue` never blocks, so it is safe to call from the
/// scheduler's timer thread.
#[derive(Clone, Debug)]
pub struct PublishQueue {
    tx: mpsc::UnboundedSender<String>,
}

impl PublishQueue {
    /// Create a queue and its receiving half
    pub fn channel() -> (PublishQueue, PublishReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (PublishQueue { tx }, PublishReceiver { rx })
    }

    /// Append a post id for publication
    pub fn enqueue(&self, post_id: impl Into<String>) {
        let post_id = post_id.into();
        debug!(post_id = %post_id, "Queued post for publication");
        if self.tx.send(post_id).is_err() {
            error!("Publish queue receiver dropped; firing lost");
        }
    }
}

/// Receiving half of the publish queue, consumed by the drain loop
#[derive(Debug)]
pub struct PublishReceiver {
    rx: mpsc::UnboundedReceiver<String>,
}

impl PublishReceiver {
    /// Pop a queued post id without waiting
    pub fn try_recv(&mut self) -> Result<String, mpsc::error::TryRecvError> {
        self.rx.try_recv()
    }
}

/// The handler the drain loop invokes for each due post id
#[async_trait]
pub trait PublishHandler: Send + Sync {
    /// Publish the post with the given id
    async fn publish(&self, post_id: &str) -> DispatchResult<()>;
}

/// Async-context consumer of the publish queue
///
/// Drains once eagerly at startup, catching firings that happened before
/// the async context was ready, then on a fixed interval.
pub struct DrainLoop {
    receiver: PublishReceiver,
    handler: Arc<dyn PublishHandler>,
    interval: Duration,
}

impl DrainLoop {
    /// Create a drain loop with the default interval
    pub fn new(receiver: PublishReceiver, handler: Arc<dyn PublishHandler>) -> Self {
        Self {
            receiver,
            handler,
            interval: DEFAULT_DRAIN_INTERVAL,
        }
    }

    /// Set the periodic drain interval
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Drain everything currently queued, invoking the handler once per
    /// entry
    ///
    /// Handler errors are caught and logged per entry; one failing job
    /// cannot starve the rest of the queue. Returns the number of entries
    /// consumed.
    pub async fn drain_once(&mut self) -> usize {
        self.drain().await.0
    }

    async fn drain(&mut self) -> (usize, bool) {
        let mut drained = 0;
        loop {
            match self.receiver.rx.try_recv() {
                Ok(post_id) => {
                    drained += 1;
                    if let Err(e) = self.handler.publish(&post_id).await {
                        error!(post_id = %post_id, "Error publishing queued post: {}", e);
                    }
                }
                Err(mpsc::error::TryRecvError::Empty) => return (drained, false),
                Err(mpsc::error::TryRecvError::Disconnected) => return (drained, true),
            }
        }
    }

    /// Run the drain loop until every queue sender is gone
    pub async fn run(mut self) {
        info!("Drain loop started, processing queued posts");

        // eager pass for firings that preceded this context
        let (_, mut disconnected) = self.drain().await;

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await; // first tick completes immediately

        while !disconnected {
            ticker.tick().await;
            let (drained, closed) = self.drain().await;
            if drained > 0 {
                debug!(drained, "Drained publish queue");
            }
            disconnected = closed;
        }

        info!("Drain loop stopped; publish queue closed");
    }

    /// Spawn the drain loop on the current tokio runtime
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::protocol::error::DispatchError;

    use super::*;

    #[derive(Default)]
    struct CountingHandler {
        calls: AtomicUsize,
        fail_on: Option<String>,
    }

    #[async_trait]
    impl PublishHandler for CountingHandler {
        async fn publish(&self, post_id: &str) -> DispatchResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_on.as_deref() == Some(post_id) {
                return Err(DispatchError::Other(format!("boom: {}", post_id)));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_double_drain_invokes_handler_once_per_entry() {
        let (queue, receiver) = PublishQueue::channel();
        let handler = Arc::new(CountingHandler::default());
        let mut drain = DrainLoop::new(receiver, handler.clone());

        queue.enqueue("post-1");

        assert_eq!(drain.drain_once().await, 1);
        // a second drain before anything new is queued consumes nothing
        assert_eq!(drain.drain_once().await, 0);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failing_entry_does_not_starve_queue() {
        let (queue, receiver) = PublishQueue::channel();
        let handler = Arc::new(CountingHandler {
            calls: AtomicUsize::new(0),
            fail_on: Some("post-bad".to_string()),
        });
        let mut drain = DrainLoop::new(receiver, handler.clone());

        queue.enqueue("post-bad");
        queue.enqueue("post-good");

        assert_eq!(drain.drain_once().await, 2);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_enqueue_from_plain_thread() {
        let (queue, receiver) = PublishQueue::channel();
        let handler = Arc::new(CountingHandler::default());
        let mut drain = DrainLoop::new(receiver, handler.clone());

        // the timer context is a plain OS thread with no runtime
        let thread_queue = queue.clone();
        std::thread::spawn(move || thread_queue.enqueue("post-1"))
            .join()
            .unwrap();

        assert_eq!(drain.drain_once().await, 1);
    }

    #[tokio::test]
    async fn test_run_drains_eagerly_then_periodically() {
        let (queue, receiver) = PublishQueue::channel();
        let handler = Arc::new(CountingHandler::default());

        // queued before the loop starts: covered by the eager drain
        queue.enqueue("post-early");

        let drain = DrainLoop::new(receiver, handler.clone())
            .with_interval(Duration::from_millis(50));
        let running = drain.spawn();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);

        // queued while the loop is running: picked up by a later tick
        queue.enqueue("post-late");
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(handler.calls.load(Ordering::SeqCst), 2);

        // dropping every sender ends the loop
        drop(queue);
        tokio::time::sleep(Duration::from_millis(200)).await;
        running.await.unwrap();
    }
}
