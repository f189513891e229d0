//! The boundary event model consumed by sinks.
//!
//! A [`LogEvent`] is the framework-neutral form of one log call: severity,
//! message, timestamp, caller location and a flat list of key/value fields.
//! Field values are classified once, at the boundary, into a closed set of
//! variants so that downstream code never has to type-switch on opaque
//! payloads.

use std::collections::BTreeMap;
use std::error::Error;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use crate::caller::FrameInfo;

/// One log event on its way to a sink.
#[derive(Debug, Clone)]
pub struct LogEvent {
    /// Severity label as reported by the producer, e.g. `INFO`.
    pub level: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    /// Location of the application code that issued the event, when known.
    pub caller: Option<FrameInfo>,
    /// Flat key/value fields; dotted keys are expanded at record-build time.
    pub fields: Vec<(String, FieldValue)>,
}

impl LogEvent {
    pub fn new(level: impl Into<String>, message: impl Into<String>) -> Self {
        LogEvent {
            level: level.into(),
            message: message.into(),
            timestamp: Utc::now(),
            caller: None,
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.push((key.into(), value.into()));
        self
    }

    /// Attach a decomposed error under the conventional `error` key.
    pub fn with_error<E: Error>(mut self, err: &E) -> Self {
        self.fields
            .push(("error".to_string(), FieldValue::Error(ErrorInfo::capture(err))));
        self
    }

    pub fn with_caller(mut self, caller: FrameInfo) -> Self {
        self.caller = Some(caller);
        self
    }
}

/// The classified value of one event field.
#[derive(Debug, Clone)]
pub enum FieldValue {
    /// A plain JSON-representable payload, stored unchanged.
    Value(Value),
    /// An HTTP-request-like payload, expanded to a fixed sub-map.
    Request(RequestInfo),
    /// An error payload, decomposed into `excType`/`excValue`/`excText`.
    Error(ErrorInfo),
}

impl FieldValue {
    /// The JSON form this value takes inside `context`.
    pub(crate) fn into_context_value(self) -> Value {
        match self {
            FieldValue::Value(value) => value,
            FieldValue::Request(request) => request.to_value(),
            // An error that was rejected from promotion still has to land
            // somewhere; its short message is the most useful rendering.
            FieldValue::Error(info) => Value::String(info.exc_value),
        }
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        FieldValue::Value(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Value(Value::String(value.to_string()))
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Value(Value::String(value))
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Value(Value::from(value))
    }
}

impl From<u64> for FieldValue {
    fn from(value: u64) -> Self {
        FieldValue::Value(Value::from(value))
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Value(Value::from(value))
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Value(Value::Bool(value))
    }
}

impl From<RequestInfo> for FieldValue {
    fn from(value: RequestInfo) -> Self {
        FieldValue::Request(value)
    }
}

impl From<ErrorInfo> for FieldValue {
    fn from(value: ErrorInfo) -> Self {
        FieldValue::Error(value)
    }
}

/// Detailed information about an HTTP request attached to a log event.
///
/// Never shipped as an opaque object: the wire form is always the sub-map
/// `{headers, ip, method, params, size, url, useragent}`.
#[derive(Debug, Clone, Default)]
pub struct RequestInfo {
    pub method: String,
    pub url: String,
    pub ip: String,
    pub useragent: String,
    /// Request body length; `-1` when unknown.
    pub size: i64,
    pub headers: BTreeMap<String, Vec<String>>,
    pub params: BTreeMap<String, Vec<String>>,
}

impl RequestInfo {
    pub(crate) fn to_value(&self) -> Value {
        json!({
            "headers": self.headers,
            "ip": self.ip,
            "method": self.method,
            "params": self.params,
            "size": self.size,
            "url": self.url,
            "useragent": self.useragent,
        })
    }
}

/// An error decomposed for shipping: a type tag, the short message and the
/// full cause chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub exc_type: String,
    pub exc_value: String,
    pub exc_text: String,
}

impl ErrorInfo {
    /// Decompose a typed error. The type tag is the concrete Rust type name.
    pub fn capture<E: Error>(err: &E) -> Self {
        ErrorInfo {
            exc_type: std::any::type_name::<E>().to_string(),
            exc_value: err.to_string(),
            exc_text: render_chain(err),
        }
    }

    /// Decompose a type-erased error, as handed over by `tracing`'s visitor.
    pub fn from_dyn(err: &(dyn Error + 'static)) -> Self {
        // The Debug rendering usually leads with the concrete type's name.
        let repr = format!("{err:?}");
        let tag: String = repr
            .chars()
            .take_while(|c| c.is_alphanumeric() || *c == '_' || *c == ':')
            .collect();
        ErrorInfo {
            exc_type: if tag.is_empty() { "Error".to_string() } else { tag },
            exc_value: err.to_string(),
            exc_text: render_chain(err),
        }
    }
}

/// Join the error's message with the message of every chained cause.
fn render_chain<E: Error + ?Sized>(err: &E) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}
