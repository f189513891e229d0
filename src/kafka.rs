//! Kafka message-bus transport and sink.
//!
//! Each record is published as the message value on a configured topic; the
//! message key is always absent and the category travels in the record body
//! rather than as an outer prefix. Delivery reports come back on an
//! asynchronous error stream consumed by the delivery queue's worker.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::message::Message;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use tokio::sync::mpsc;

use crate::event::LogEvent;
use crate::formatter::{JsonFormatter, RecordFormatter};
use crate::queue::{DeliveryQueue, DEFAULT_QUEUE_CAPACITY};
use crate::sink::{LogSink, SinkError};
use crate::transport::{Transport, TransportError};

const CLOSE_FLUSH_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for [`KafkaSink`].
pub struct KafkaConfig {
    /// Broker addresses, e.g. `["kafka1:9092", "kafka2:9092"]`.
    pub endpoints: Vec<String>,
    pub topic: String,
    /// Delivery queue capacity; overflow drops records.
    pub capacity: usize,
    /// Externally supplied, pre-built producer, overriding internal
    /// construction. Intended for tests and custom tuning.
    pub producer: Option<FutureProducer>,
    /// Formatter override; the default carries the category in-body.
    pub formatter: Option<Arc<dyn RecordFormatter>>,
}

impl KafkaConfig {
    pub fn new(endpoints: Vec<String>, topic: impl Into<String>) -> Self {
        KafkaConfig {
            endpoints,
            topic: topic.into(),
            capacity: DEFAULT_QUEUE_CAPACITY,
            producer: None,
            formatter: None,
        }
    }
}

/// Producer defaults: wait for all replicas, snappy compression, 200ms
/// linger, a handful of retries with a long backoff.
fn producer_config(endpoints: &[String]) -> ClientConfig {
    let mut config = ClientConfig::new();
    config
        .set("bootstrap.servers", endpoints.join(","))
        .set("request.required.acks", "all")
        .set("compression.codec", "snappy")
        .set("queue.buffering.max.ms", "200")
        .set("message.send.max.retries", "6")
        .set("retry.backoff.ms", "10000");
    config
}

/// Kafka producer behind the [`Transport`] interface.
///
/// `send` hands the payload to the producer without waiting for the
/// delivery report; failed deliveries surface on the error stream with the
/// offending payload echoed.
pub struct KafkaTransport {
    producer: FutureProducer,
    topic: String,
    err_tx: mpsc::UnboundedSender<TransportError>,
    err_rx: Option<mpsc::UnboundedReceiver<TransportError>>,
}

impl KafkaTransport {
    pub fn new(producer: FutureProducer, topic: impl Into<String>) -> Self {
        let (err_tx, err_rx) = mpsc::unbounded_channel();
        KafkaTransport {
            producer,
            topic: topic.into(),
            err_tx,
            err_rx: Some(err_rx),
        }
    }
}

#[async_trait]
impl Transport for KafkaTransport {
    async fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        let record = FutureRecord::<(), _>::to(&self.topic).payload(payload);
        let delivery = match self.producer.send_result(record) {
            Ok(delivery) => delivery,
            Err((err, _record)) => return Err(TransportError::Kafka(err)),
        };
        let err_tx = self.err_tx.clone();
        tokio::spawn(async move {
            match delivery.await {
                Ok(Ok(_)) => {}
                Ok(Err((error, message))) => {
                    let payload = message
                        .payload()
                        .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
                        .unwrap_or_default();
                    let _ = err_tx.send(TransportError::Produce { error, payload });
                }
                // The producer went away before the report arrived; close
                // will have flushed or failed loudly on its own.
                Err(_cancelled) => {}
            }
        });
        Ok(())
    }

    fn error_stream(&mut self) -> Option<mpsc::UnboundedReceiver<TransportError>> {
        self.err_rx.take()
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.producer
            .flush(Timeout::After(CLOSE_FLUSH_TIMEOUT))
            .map_err(TransportError::Kafka)
    }
}

/// Sink that publishes records to a Kafka topic.
pub struct KafkaSink {
    queue: DeliveryQueue,
    formatter: Arc<dyn RecordFormatter>,
    debug: AtomicBool,
}

impl KafkaSink {
    /// Build the producer (unless one was supplied) and start the delivery
    /// worker. Must be called from within a tokio runtime.
    pub fn new(config: KafkaConfig) -> Result<Self, SinkError> {
        let producer = match config.producer {
            Some(producer) => producer,
            None => producer_config(&config.endpoints)
                .create()
                .map_err(TransportError::Kafka)?,
        };
        let transport = KafkaTransport::new(producer, config.topic);
        let formatter = config
            .formatter
            .unwrap_or_else(|| Arc::new(JsonFormatter::new()));
        Ok(KafkaSink {
            queue: DeliveryQueue::spawn(transport, config.capacity),
            formatter,
            debug: AtomicBool::new(false),
        })
    }

    /// Like [`new`](KafkaSink::new), but give up waiting after `timeout`.
    ///
    /// Construction keeps running on a background task either way; a
    /// timeout only stops this caller from waiting for it, it does not
    /// cancel the in-flight broker handshake.
    pub async fn connect_with_timeout(
        config: KafkaConfig,
        timeout: Duration,
    ) -> Result<Self, SinkError> {
        let endpoints = config.endpoints.join(",");
        let build = tokio::task::spawn_blocking(move || KafkaSink::new(config));
        match tokio::time::timeout(timeout, build).await {
            Ok(Ok(sink)) => sink,
            Ok(Err(join_err)) => {
                Err(SinkError::Transport(TransportError::Worker(join_err.to_string())))
            }
            Err(_elapsed) => Err(SinkError::Transport(TransportError::ConnectTimeout(
                timeout, endpoints,
            ))),
        }
    }

    /// When enabled, every formatted record is echoed to stdout before
    /// transmission. Delivery behavior is unchanged.
    pub fn set_debug(&self, enabled: bool) {
        self.debug.store(enabled, Ordering::Relaxed);
    }

    /// Publish pre-serialized bytes as-is (no category prefix; Kafka
    /// framing keeps the category in-body).
    ///
    /// Unlike [`fire`](LogSink::fire) this entry point reports overflow and
    /// shutdown to the caller.
    pub fn send_raw(&self, payload: &[u8]) -> Result<(), SinkError> {
        if self.debug.load(Ordering::Relaxed) {
            println!("{}", String::from_utf8_lossy(payload));
        }
        self.queue.try_enqueue(payload.to_vec())
    }

    /// Records dropped so far by the overflow policy.
    pub fn dropped_records(&self) -> u64 {
        self.queue.dropped()
    }

    /// Drain the queue, flush the producer and surface the outcome.
    /// Idempotent.
    pub async fn close(&self) -> Result<(), SinkError> {
        self.queue.close().await.map_err(SinkError::from)
    }
}

impl LogSink for KafkaSink {
    fn fire(&self, event: &LogEvent) -> Result<(), SinkError> {
        let buf = self.formatter.format(event)?;
        if self.debug.load(Ordering::Relaxed) {
            println!("{}", String::from_utf8_lossy(&buf));
        }
        self.queue.enqueue(buf);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn producer_defaults_match_the_tuning_policy() {
        let config = producer_config(&["kafka1:9092".to_string(), "kafka2:9092".to_string()]);
        assert_eq!(
            config.get("bootstrap.servers"),
            Some("kafka1:9092,kafka2:9092")
        );
        assert_eq!(config.get("request.required.acks"), Some("all"));
        assert_eq!(config.get("compression.codec"), Some("snappy"));
        assert_eq!(config.get("queue.buffering.max.ms"), Some("200"));
        assert_eq!(config.get("message.send.max.retries"), Some("6"));
        assert_eq!(config.get("retry.backoff.ms"), Some("10000"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn injected_producer_skips_internal_construction() {
        // A producer built with no reachable broker is still a valid
        // injection point; nothing is sent here.
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", "127.0.0.1:1")
            .create()
            .unwrap();
        let mut config = KafkaConfig::new(vec!["ignored:9092".into()], "test");
        config.producer = Some(producer);

        let sink = KafkaSink::new(config).unwrap();
        assert_eq!(sink.dropped_records(), 0);
        sink.close().await.unwrap();
        // Close stays idempotent.
        sink.close().await.unwrap();
    }
}
