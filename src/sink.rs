use crate::event::LogEvent;
use crate::formatter::FormatError;
use crate::transport::TransportError;

/// Destination for [`LogEvent`]s produced by the logging layer.
///
/// Implementations are responsible for formatting the event and handing the
/// bytes to their delivery queue. `fire` is called on the producing thread
/// and must never block on transport I/O: a full queue drops the record
/// rather than stalling the caller.
pub trait LogSink: Send + Sync {
    /// Format and enqueue a single event.
    ///
    /// **Returns**
    /// - `Ok(())` once the event is formatted and handed off (or dropped by
    ///   the overflow policy; drops are not an error for the producer).
    /// - `Err(..)` only for producer-side failures, i.e. the event could
    ///   not be represented in the output encoding.
    fn fire(&self, event: &LogEvent) -> Result<(), SinkError>;
}

/// Errors surfaced by sink construction, lifecycle calls and the raw
/// passthrough entry points.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("delivery queue is full")]
    Overflow,
    #[error("delivery queue is closed")]
    Closed,
    #[error("invalid sink address '{0}'")]
    Address(String),
}
