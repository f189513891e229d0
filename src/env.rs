/// Environment variable names used by this crate for convenient
/// configuration of sinks from services.
///
/// These are purely helpers; the core sink types remain decoupled from
/// environment access.

/// udplog endpoint as `host:port`.
pub const UDPLOG_ADDRESS_ENV: &str = "UDPLOG_ADDRESS";

/// Comma-separated list of Kafka broker endpoints.
pub const KAFKA_ENDPOINTS_ENV: &str = "KAFKAHOOK_ENDPOINTS";

/// Kafka topic the records are published to.
pub const KAFKA_TOPIC_ENV: &str = "KAFKAHOOK_TOPIC";

/// Default udplog endpoint.
pub const DEFAULT_UDPLOG_ADDRESS: &str = "localhost:55647";

/// Default Kafka broker endpoint.
pub const DEFAULT_KAFKA_ENDPOINT: &str = "localhost:9092";

/// Default Kafka topic.
pub const DEFAULT_KAFKA_TOPIC: &str = "udplog";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
