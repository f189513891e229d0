//! The narrow interface the delivery queue writes against.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

/// Failure reported by a transport.
///
/// Cloneable so that a close outcome can be handed back to every caller of
/// an idempotent `close()`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("i/o error: {0}")]
    Io(Arc<io::Error>),
    #[error("short write, sent {sent} of {len} bytes")]
    ShortWrite { sent: usize, len: usize },
    #[error("connect timeout after {0:?} while connecting to {1}")]
    ConnectTimeout(Duration, String),
    #[error("delivery worker terminated: {0}")]
    Worker(String),
    #[cfg(feature = "kafka")]
    #[error("kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),
    #[cfg(feature = "kafka")]
    #[error("produce error '{error}' for: {payload}")]
    Produce {
        error: rdkafka::error::KafkaError,
        payload: String,
    },
}

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        TransportError::Io(Arc::new(err))
    }
}

/// Asynchronous destination for formatted record buffers.
///
/// Implementations transport opaque bytes; they never see events or
/// records. The delivery queue's worker task is the only caller of `send`
/// and `close`, and it owns the transport exclusively, so implementations
/// do not need internal synchronization.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Send one buffer to the remote side.
    ///
    /// Datagram-style transports report failures here, including short
    /// writes. Message-bus transports may accept the buffer immediately and
    /// surface delivery failures on [`Transport::error_stream`] instead.
    async fn send(&mut self, payload: &[u8]) -> Result<(), TransportError>;

    /// Channel of asynchronous delivery failures, when the transport has
    /// one. Called once by the worker at startup; the default is none.
    fn error_stream(&mut self) -> Option<mpsc::UnboundedReceiver<TransportError>> {
        None
    }

    /// Release the transport, flushing whatever it still holds. Errors are
    /// surfaced to the caller of the queue's `close()`.
    async fn close(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}
