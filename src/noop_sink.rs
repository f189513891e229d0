use crate::event::LogEvent;
use crate::sink::{LogSink, SinkError};

/// A sink that simply drops all events.
///
/// Useful for measuring the overhead of the layer itself without any
/// network I/O, and for unit tests that don't care about delivery.
#[derive(Clone, Default)]
pub struct NoopSink;

impl LogSink for NoopSink {
    fn fire(&self, _event: &LogEvent) -> Result<(), SinkError> {
        Ok(())
    }
}
