//! Async log shipping for `tracing`: events are normalized into udplog wire
//! records and delivered over UDP or Kafka by a background worker, without
//! ever blocking the thread that logged.

pub mod backend;
pub mod caller;
pub mod context;
pub mod env;
pub mod event;
pub mod formatter;
pub mod init;
pub mod layer;
pub mod noop_sink;
pub mod queue;
pub mod record;
pub mod sink;
pub mod transport;
pub mod udp;

#[cfg(feature = "kafka")]
pub mod kafka;
