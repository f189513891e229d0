//! Serialization of [`LogEvent`]s into wire-ready byte buffers.

use std::path::Path;

use crate::caller::FrameInfo;
use crate::event::LogEvent;
use crate::record::{LogRecord, Timestamp};

/// Fixed tag identifying records produced by this adapter. The UDP framing
/// prepends it to every datagram; the Kafka framing carries it in-body.
pub const CATEGORY: &str = "logrus";

/// Error returned when a record cannot be represented in the output
/// encoding.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("while marshalling json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Turns one event into the byte buffer handed to the delivery queue.
///
/// Sinks construct a [`JsonFormatter`] by default and accept any
/// implementation through their configuration, so formatting policy is an
/// injection point rather than process-wide state.
pub trait RecordFormatter: Send + Sync {
    fn format(&self, event: &LogEvent) -> Result<Vec<u8>, FormatError>;
}

/// Process identity stamped onto every record, resolved once at
/// construction and immutable for the process lifetime.
#[derive(Debug, Clone)]
pub struct Identity {
    pub app_name: String,
    pub host_name: String,
    pub pid: u32,
}

impl Identity {
    pub fn detect() -> Self {
        let app_name = std::env::args_os()
            .next()
            .and_then(|argv0| Path::new(&argv0).file_name()?.to_str().map(str::to_string))
            .unwrap_or_else(|| "unknown".to_string());

        let host_name = std::env::var("HOSTNAME")
            .ok()
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| "unknown_host".to_string());

        let mut pid = std::process::id();
        if pid == 1 {
            // pid 1 is the container's init, not a useful identity
            pid = 0;
        }

        Identity {
            app_name,
            host_name,
            pid,
        }
    }
}

/// The default formatter: canonical record, JSON encoding, optional
/// category-prefixed framing.
pub struct JsonFormatter {
    identity: Identity,
    category: String,
    prefix: bool,
}

impl JsonFormatter {
    pub fn new() -> Self {
        Self::with_identity(Identity::detect())
    }

    pub fn with_identity(identity: Identity) -> Self {
        JsonFormatter {
            identity,
            category: CATEGORY.to_string(),
            prefix: false,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Emit `<category>:` ahead of the JSON body. The in-body `category`
    /// field is left empty in this mode so the tag is not carried twice.
    pub fn with_category_prefix(mut self) -> Self {
        self.prefix = true;
        self
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    fn to_record(&self, event: &LogEvent) -> LogRecord {
        let caller = event.caller.clone().unwrap_or_else(FrameInfo::default);
        let mut record = LogRecord {
            category: if self.prefix {
                String::new()
            } else {
                self.category.clone()
            },
            app_name: self.identity.app_name.clone(),
            host_name: self.identity.host_name.clone(),
            log_level: event.level.to_uppercase(),
            file_name: caller.file,
            func_name: caller.func,
            line_no: caller.line,
            message: event.message.clone(),
            timestamp: Timestamp::from(event.timestamp),
            pid: self.identity.pid,
            ..LogRecord::default()
        };
        record.apply_fields(event.fields.clone());
        record
    }
}

impl Default for JsonFormatter {
    fn default() -> Self {
        JsonFormatter::new()
    }
}

impl RecordFormatter for JsonFormatter {
    fn format(&self, event: &LogEvent) -> Result<Vec<u8>, FormatError> {
        let record = self.to_record(event);
        let mut buf = Vec::with_capacity(256);
        if self.prefix {
            buf.extend_from_slice(self.category.as_bytes());
            buf.push(b':');
        }
        serde_json::to_writer(&mut buf, &record)?;
        Ok(buf)
    }
}
