//! UDP datagram transport and sink.
//!
//! Each record becomes one datagram framed as the ASCII literal `logrus:`
//! followed immediately by the JSON body, no trailing delimiter. Delivery is
//! best-effort: no acknowledgement, no retransmission.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::UdpSocket;

use crate::event::LogEvent;
use crate::formatter::{JsonFormatter, RecordFormatter, CATEGORY};
use crate::queue::{DeliveryQueue, DEFAULT_QUEUE_CAPACITY};
use crate::sink::{LogSink, SinkError};
use crate::transport::{Transport, TransportError};

/// A connected datagram socket. A short write counts as a failed send.
pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    /// Bind an ephemeral local port and connect it to `host:port`.
    pub async fn connect(host: &str, port: u16) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.connect((host, port)).await?;
        Ok(UdpTransport { socket })
    }

    /// Wrap an externally constructed, already connected socket.
    pub fn from_socket(socket: UdpSocket) -> Self {
        UdpTransport { socket }
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        let sent = self.socket.send(payload).await?;
        if sent != payload.len() {
            return Err(TransportError::ShortWrite {
                sent,
                len: payload.len(),
            });
        }
        Ok(())
    }
}

/// Configuration for [`UdpSink`].
pub struct UdpConfig {
    pub host: String,
    pub port: u16,
    /// Delivery queue capacity; overflow drops records.
    pub capacity: usize,
    /// Externally supplied, pre-connected socket, overriding internal
    /// construction. Intended for tests.
    pub socket: Option<UdpSocket>,
    /// Formatter override; the default frames each datagram with the
    /// category prefix.
    pub formatter: Option<Arc<dyn RecordFormatter>>,
}

impl UdpConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        UdpConfig {
            host: host.into(),
            port,
            capacity: DEFAULT_QUEUE_CAPACITY,
            socket: None,
            formatter: None,
        }
    }
}

/// Sink that ships records to a udplog endpoint over UDP.
pub struct UdpSink {
    queue: DeliveryQueue,
    formatter: Arc<dyn RecordFormatter>,
    debug: AtomicBool,
}

impl UdpSink {
    pub async fn connect(host: &str, port: u16) -> Result<Self, SinkError> {
        Self::with_config(UdpConfig::new(host, port)).await
    }

    pub async fn with_config(config: UdpConfig) -> Result<Self, SinkError> {
        let transport = match config.socket {
            Some(socket) => UdpTransport::from_socket(socket),
            None => UdpTransport::connect(&config.host, config.port).await?,
        };
        let formatter = config
            .formatter
            .unwrap_or_else(|| Arc::new(JsonFormatter::new().with_category_prefix()));
        Ok(UdpSink {
            queue: DeliveryQueue::spawn(transport, config.capacity),
            formatter,
            debug: AtomicBool::new(false),
        })
    }

    /// When enabled, every formatted record is echoed to stdout before
    /// transmission. Delivery behavior is unchanged.
    pub fn set_debug(&self, enabled: bool) {
        self.debug.store(enabled, Ordering::Relaxed);
    }

    /// Ship pre-serialized bytes, framed with the category prefix.
    ///
    /// Unlike [`fire`](LogSink::fire) this entry point reports overflow and
    /// shutdown to the caller.
    pub fn send_raw(&self, payload: &[u8]) -> Result<(), SinkError> {
        let mut buf = Vec::with_capacity(CATEGORY.len() + 1 + payload.len());
        buf.extend_from_slice(CATEGORY.as_bytes());
        buf.push(b':');
        buf.extend_from_slice(payload);
        if self.debug.load(Ordering::Relaxed) {
            println!("{}", String::from_utf8_lossy(&buf));
        }
        self.queue.try_enqueue(buf)
    }

    /// Records dropped so far by the overflow policy.
    pub fn dropped_records(&self) -> u64 {
        self.queue.dropped()
    }

    /// Drain the queue and release the socket. Idempotent.
    pub async fn close(&self) -> Result<(), SinkError> {
        self.queue.close().await.map_err(SinkError::from)
    }
}

impl LogSink for UdpSink {
    fn fire(&self, event: &LogEvent) -> Result<(), SinkError> {
        let buf = self.formatter.format(event)?;
        if self.debug.load(Ordering::Relaxed) {
            println!("{}", String::from_utf8_lossy(&buf));
        }
        self.queue.enqueue(buf);
        Ok(())
    }
}
