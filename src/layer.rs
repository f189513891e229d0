use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

use crate::caller::{resolve_caller, FrameInfo, DEFAULT_SKIP_PREFIX};
use crate::event::{ErrorInfo, FieldValue, LogEvent};
use crate::sink::LogSink;

/// `tracing_subscriber` layer that observes events and forwards them to a
/// [`LogSink`].
///
/// The layer runs on the producing thread: it collects the event's fields,
/// resolves the caller location and calls [`LogSink::fire`], which formats
/// the record and performs a non-blocking enqueue. Transport I/O never
/// happens here, so application latency is unaffected by sink health.
pub struct ShippingLayer {
    sink: Arc<dyn LogSink>,
    max_level: Level,
    skip_prefix: String,
    /// Total events seen by the layer (before filtering by level).
    pub total_events: Arc<AtomicU64>,
    /// Events the sink refused, e.g. because they could not be serialized.
    pub failed_events: Arc<AtomicU64>,
}

impl ShippingLayer {
    /// Create a layer forwarding every level to `sink`.
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        ShippingLayer {
            sink,
            max_level: Level::TRACE,
            skip_prefix: DEFAULT_SKIP_PREFIX.to_string(),
            total_events: Arc::new(AtomicU64::new(0)),
            failed_events: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Only ship events at `level` or more severe.
    pub fn with_max_level(mut self, level: Level) -> Self {
        self.max_level = level;
        self
    }

    /// Module prefix whose callsites are never reported as the caller.
    /// Defaults to this crate's own namespace.
    pub fn with_skip_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.skip_prefix = prefix.into();
        self
    }
}

impl<S> Layer<S> for ShippingLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event, _ctx: Context<'_, S>) {
        self.total_events.fetch_add(1, Ordering::Relaxed);
        if *event.metadata().level() > self.max_level {
            return;
        }

        let mut fields = Vec::new();
        let mut message: Option<String> = None;
        let mut visitor = FieldVisitor {
            fields: &mut fields,
            message: &mut message,
        };
        event.record(&mut visitor);

        let meta = event.metadata();
        let callsite = FrameInfo::new(
            meta.file().unwrap_or_default(),
            meta.target(),
            meta.line().unwrap_or_default(),
        );
        let caller = resolve_caller(std::iter::once(callsite), &self.skip_prefix);

        let record = LogEvent {
            level: meta.level().to_string(),
            message: message.unwrap_or_default(),
            timestamp: Utc::now(),
            caller: Some(caller),
            fields,
        };

        if self.sink.fire(&record).is_err() {
            self.failed_events.fetch_add(1, Ordering::Relaxed);
            eprintln!("log sink refused event, dropping it");
        }
    }
}

pub struct FieldVisitor<'a> {
    pub fields: &'a mut Vec<(String, FieldValue)>,
    pub message: &'a mut Option<String>,
}

impl<'a> tracing::field::Visit for FieldVisitor<'a> {
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            *self.message = Some(value.to_string());
        } else {
            self.fields
                .push((field.name().to_string(), FieldValue::from(value)));
        }
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.fields
            .push((field.name().to_string(), FieldValue::from(value)));
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.fields
            .push((field.name().to_string(), FieldValue::from(value)));
    }

    fn record_f64(&mut self, field: &tracing::field::Field, value: f64) {
        self.fields
            .push((field.name().to_string(), FieldValue::from(value)));
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.fields
            .push((field.name().to_string(), FieldValue::from(value)));
    }

    fn record_error(
        &mut self,
        field: &tracing::field::Field,
        value: &(dyn std::error::Error + 'static),
    ) {
        self.fields.push((
            field.name().to_string(),
            FieldValue::Error(ErrorInfo::from_dyn(value)),
        ));
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            *self.message = Some(format!("{:?}", value));
        } else {
            self.fields.push((
                field.name().to_string(),
                FieldValue::from(format!("{:?}", value)),
            ));
        }
    }
}
