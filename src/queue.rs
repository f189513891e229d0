//! Bounded, non-blocking hand-off between producer threads and the
//! transport worker.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;

use crate::sink::SinkError;
use crate::transport::{Transport, TransportError};

/// Default number of in-flight record buffers before overflow sets in.
pub const DEFAULT_QUEUE_CAPACITY: usize = 150;

/// A fixed-capacity buffer plus a background worker that owns the
/// transport.
///
/// Producers interact only with [`enqueue`](DeliveryQueue::enqueue) (and the
/// error-returning [`try_enqueue`](DeliveryQueue::try_enqueue) used by the
/// raw passthrough entry points); both return immediately regardless of
/// transport health. The worker is the sole writer to the transport and the
/// only task allowed to block on it. Buffers enqueued by a single producer
/// reach the transport in enqueue order.
pub struct DeliveryQueue {
    tx: mpsc::Sender<Vec<u8>>,
    dropped: AtomicU64,
    state: Mutex<QueueState>,
}

enum QueueState {
    Open {
        stop: oneshot::Sender<()>,
        worker: JoinHandle<Result<(), TransportError>>,
    },
    Closed(Result<(), TransportError>),
}

impl DeliveryQueue {
    /// Start the worker and take exclusive ownership of `transport`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<T: Transport>(transport: T, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let (stop_tx, stop_rx) = oneshot::channel();
        let worker = tokio::spawn(worker_loop(rx, stop_rx, transport));
        DeliveryQueue {
            tx,
            dropped: AtomicU64::new(0),
            state: Mutex::new(QueueState::Open {
                stop: stop_tx,
                worker,
            }),
        }
    }

    /// Hand one buffer to the worker without blocking.
    ///
    /// On a full or closed queue the buffer is dropped and a diagnostic is
    /// written to stderr; the caller is never told. Logging must not exert
    /// backpressure on application control flow.
    pub fn enqueue(&self, buf: Vec<u8>) {
        match self.tx.try_send(buf) {
            Ok(()) => {}
            Err(TrySendError::Full(buf)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                eprintln!(
                    "log queue overflow, dropping record: {}",
                    String::from_utf8_lossy(&buf)
                );
            }
            Err(TrySendError::Closed(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                eprintln!("log queue closed, dropping record");
            }
        }
    }

    /// Like [`enqueue`](DeliveryQueue::enqueue), but reports overflow and
    /// shutdown to the caller instead of swallowing them.
    pub fn try_enqueue(&self, buf: Vec<u8>) -> Result<(), SinkError> {
        self.tx.try_send(buf).map_err(|err| match err {
            TrySendError::Full(_) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                SinkError::Overflow
            }
            TrySendError::Closed(_) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                SinkError::Closed
            }
        })
    }

    /// Number of records dropped so far by the overflow policy.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Stop accepting new records, drain the backlog, close the transport
    /// and return its outcome.
    ///
    /// Idempotent: concurrent and repeated callers all observe the outcome
    /// of the single real shutdown.
    pub async fn close(&self) -> Result<(), TransportError> {
        let mut state = self.state.lock().await;
        match std::mem::replace(&mut *state, QueueState::Closed(Ok(()))) {
            QueueState::Open { stop, worker } => {
                let _ = stop.send(());
                let result = match worker.await {
                    Ok(outcome) => outcome,
                    Err(err) => Err(TransportError::Worker(err.to_string())),
                };
                *state = QueueState::Closed(result.clone());
                result
            }
            QueueState::Closed(result) => {
                *state = QueueState::Closed(result.clone());
                result
            }
        }
    }
}

async fn worker_loop<T: Transport>(
    mut rx: mpsc::Receiver<Vec<u8>>,
    mut stop: oneshot::Receiver<()>,
    mut transport: T,
) -> Result<(), TransportError> {
    let mut errors = transport.error_stream();
    loop {
        tokio::select! {
            entry = rx.recv() => match entry {
                Some(buf) => deliver(&mut transport, buf).await,
                // Every sender is gone; nothing more can arrive.
                None => break,
            },
            err = next_error(&mut errors) => match err {
                Some(err) => eprintln!("log transport error: {err}"),
                None => errors = None,
            },
            _ = &mut stop => {
                // Refuse new entries, then drain what was already buffered.
                rx.close();
                while let Some(buf) = rx.recv().await {
                    deliver(&mut transport, buf).await;
                }
                break;
            }
        }
    }
    transport.close().await
}

async fn deliver<T: Transport>(transport: &mut T, buf: Vec<u8>) {
    // Best effort: failures are diagnostics, not retries. The producer that
    // enqueued this buffer has long since returned.
    if let Err(err) = transport.send(&buf).await {
        eprintln!("log transport send error: {err}");
    }
}

async fn next_error(
    errors: &mut Option<mpsc::UnboundedReceiver<TransportError>>,
) -> Option<TransportError> {
    match errors.as_mut() {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Semaphore;

    /// Transport that records everything it is asked to send, optionally
    /// gated so the worker can be stalled mid-delivery.
    #[derive(Clone)]
    struct MockTransport {
        sent: Arc<Mutex<Vec<Vec<u8>>>>,
        gate: Option<Arc<Semaphore>>,
        close_result: Result<(), TransportError>,
        errors: Option<Arc<Mutex<Option<mpsc::UnboundedReceiver<TransportError>>>>>,
    }

    impl MockTransport {
        fn new() -> (Self, Arc<Mutex<Vec<Vec<u8>>>>) {
            let sent = Arc::new(Mutex::new(Vec::new()));
            (
                MockTransport {
                    sent: Arc::clone(&sent),
                    gate: None,
                    close_result: Ok(()),
                    errors: None,
                },
                sent,
            )
        }

        fn gated(gate: Arc<Semaphore>) -> (Self, Arc<Mutex<Vec<Vec<u8>>>>) {
            let (mut transport, sent) = Self::new();
            transport.gate = Some(gate);
            (transport, sent)
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
            if let Some(gate) = &self.gate {
                gate.acquire().await.unwrap().forget();
            }
            self.sent.lock().await.push(payload.to_vec());
            Ok(())
        }

        fn error_stream(&mut self) -> Option<mpsc::UnboundedReceiver<TransportError>> {
            self.errors
                .as_ref()
                .and_then(|slot| slot.try_lock().ok()?.take())
        }

        async fn close(&mut self) -> Result<(), TransportError> {
            self.close_result.clone()
        }
    }

    #[tokio::test]
    async fn delivers_in_enqueue_order() {
        let (transport, sent) = MockTransport::new();
        let queue = DeliveryQueue::spawn(transport, 16);
        for i in 0..5u8 {
            queue.enqueue(vec![i]);
        }
        queue.close().await.unwrap();
        assert_eq!(
            *sent.lock().await,
            vec![vec![0], vec![1], vec![2], vec![3], vec![4]]
        );
    }

    #[tokio::test]
    async fn overflow_drops_without_caller_visible_error() {
        let capacity = 4;
        let gate = Arc::new(Semaphore::new(0));
        let (transport, sent) = MockTransport::gated(Arc::clone(&gate));
        let queue = DeliveryQueue::spawn(transport, capacity);

        // The worker picks up the first buffer and stalls inside send,
        // leaving the channel free to fill completely.
        queue.enqueue(vec![0]);
        tokio::time::sleep(Duration::from_millis(50)).await;
        for i in 1..=capacity as u8 {
            queue.enqueue(vec![i]);
        }
        for extra in 0..3u8 {
            queue.enqueue(vec![100 + extra]);
        }
        assert_eq!(queue.dropped(), 3);

        gate.add_permits(1000);
        queue.close().await.unwrap();
        // The stalled buffer plus exactly one channel's worth survived.
        assert_eq!(sent.lock().await.len(), capacity + 1);
    }

    #[tokio::test]
    async fn try_enqueue_reports_overflow() {
        let gate = Arc::new(Semaphore::new(0));
        let (transport, _sent) = MockTransport::gated(Arc::clone(&gate));
        let queue = DeliveryQueue::spawn(transport, 1);

        queue.enqueue(vec![0]);
        tokio::time::sleep(Duration::from_millis(50)).await;
        queue.enqueue(vec![1]);
        assert!(matches!(
            queue.try_enqueue(vec![2]),
            Err(SinkError::Overflow)
        ));

        gate.add_permits(1000);
        queue.close().await.unwrap();
    }

    #[tokio::test]
    async fn close_is_idempotent_and_stops_the_worker() {
        let (transport, sent) = MockTransport::new();
        let queue = DeliveryQueue::spawn(transport, 4);
        queue.enqueue(vec![1]);

        assert!(queue.close().await.is_ok());
        assert!(queue.close().await.is_ok());

        let delivered = sent.lock().await.len();
        queue.enqueue(vec![2]);
        assert!(matches!(queue.try_enqueue(vec![3]), Err(SinkError::Closed)));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(sent.lock().await.len(), delivered);
    }

    #[tokio::test]
    async fn close_surfaces_the_transport_outcome_every_time() {
        let (mut transport, _sent) = MockTransport::new();
        transport.close_result = Err(TransportError::ShortWrite { sent: 1, len: 2 });
        let queue = DeliveryQueue::spawn(transport, 4);

        let first = queue.close().await;
        let second = queue.close().await;
        assert!(matches!(
            first,
            Err(TransportError::ShortWrite { sent: 1, len: 2 })
        ));
        assert!(matches!(
            second,
            Err(TransportError::ShortWrite { sent: 1, len: 2 })
        ));
    }

    #[tokio::test]
    async fn async_transport_errors_do_not_disturb_delivery() {
        let (mut transport, sent) = MockTransport::new();
        let (err_tx, err_rx) = mpsc::unbounded_channel();
        transport.errors = Some(Arc::new(Mutex::new(Some(err_rx))));
        let queue = DeliveryQueue::spawn(transport, 4);

        err_tx
            .send(TransportError::ShortWrite { sent: 0, len: 9 })
            .unwrap();
        queue.enqueue(vec![7]);
        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(err_tx);

        queue.close().await.unwrap();
        assert_eq!(*sent.lock().await, vec![vec![7]]);
    }
}
