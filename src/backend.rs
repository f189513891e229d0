use std::sync::Arc;

use crate::sink::LogSink;

/// Supported backend kinds that can be selected via DSN or config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Udp,
    Kafka,
}

/// High-level backend configuration built from a DSN or explicit fields.
///
/// It only stores the target kind and the raw DSN string; the sinks keep
/// their own richer configuration types for direct construction.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Selected backend implementation.
    pub kind: BackendKind,
    /// Raw DSN that was used to construct this config.
    pub dsn: String,
}

impl BackendConfig {
    pub fn new(kind: BackendKind, dsn: impl Into<String>) -> Self {
        BackendConfig {
            kind,
            dsn: dsn.into(),
        }
    }
}

/// Parse a DSN string and infer the backend kind from its scheme.
///
/// Examples:
/// - "udp://127.0.0.1:55647"
/// - "kafka://broker1:9092,broker2:9092/udplog"
pub fn parse_dsn(dsn: &str) -> Result<BackendConfig, DsnError> {
    let lower = dsn.to_ascii_lowercase();

    if lower.starts_with("udp://") {
        Ok(BackendConfig::new(BackendKind::Udp, dsn))
    } else if lower.starts_with("kafka://") {
        Ok(BackendConfig::new(BackendKind::Kafka, dsn))
    } else {
        Err(DsnError::UnknownScheme)
    }
}

/// Error type returned when parsing a DSN.
#[derive(thiserror::Error, Debug)]
pub enum DsnError {
    #[error("unknown or unsupported DSN scheme")]
    UnknownScheme,
}

/// Error type returned when building a backend sink from configuration.
#[derive(thiserror::Error, Debug)]
pub enum BackendBuildError {
    #[error("kafka feature is not enabled")]
    KafkaFeatureDisabled,

    #[error("invalid backend address '{0}'")]
    InvalidAddress(String),

    #[error(transparent)]
    Sink(#[from] crate::sink::SinkError),
}

/// Create a concrete `LogSink` implementation from a `BackendConfig`.
///
/// This is the main entry point for applications that want to select a
/// backend using a single DSN string instead of constructing sinks
/// manually.
pub async fn make_sink_from_config(
    cfg: &BackendConfig,
) -> Result<Arc<dyn LogSink>, BackendBuildError> {
    match cfg.kind {
        BackendKind::Udp => {
            // Expect DSN format: udp://host:port
            let without_scheme = cfg.dsn.trim_start_matches("udp://");
            let (host, port) = without_scheme
                .rsplit_once(':')
                .ok_or_else(|| BackendBuildError::InvalidAddress(cfg.dsn.clone()))?;
            let port: u16 = port
                .parse()
                .map_err(|_| BackendBuildError::InvalidAddress(cfg.dsn.clone()))?;

            let sink = crate::udp::UdpSink::connect(host, port).await?;
            Ok(Arc::new(sink) as Arc<dyn LogSink>)
        }
        BackendKind::Kafka => {
            #[cfg(feature = "kafka")]
            {
                use crate::kafka::{KafkaConfig, KafkaSink};

                // Expect DSN format: kafka://broker1,broker2/topic
                let without_scheme = cfg.dsn.trim_start_matches("kafka://");
                let (brokers, topic) = match without_scheme.split_once('/') {
                    Some((brokers, topic)) if !topic.is_empty() => (brokers, topic),
                    Some((brokers, _)) => (brokers, crate::env::DEFAULT_KAFKA_TOPIC),
                    None => (without_scheme, crate::env::DEFAULT_KAFKA_TOPIC),
                };
                let endpoints: Vec<String> =
                    brokers.split(',').map(str::to_string).collect();

                let sink = KafkaSink::new(KafkaConfig::new(endpoints, topic))?;
                Ok(Arc::new(sink) as Arc<dyn LogSink>)
            }

            #[cfg(not(feature = "kafka"))]
            {
                Err(BackendBuildError::KafkaFeatureDisabled)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn udp_scheme_is_recognized() {
        let cfg = parse_dsn("udp://127.0.0.1:55647").unwrap();
        assert_eq!(cfg.kind, BackendKind::Udp);
        assert_eq!(cfg.dsn, "udp://127.0.0.1:55647");
    }

    #[test]
    fn kafka_scheme_is_recognized_case_insensitively() {
        let cfg = parse_dsn("KAFKA://broker:9092/logs").unwrap();
        assert_eq!(cfg.kind, BackendKind::Kafka);
    }

    #[test]
    fn unknown_scheme_is_rejected() {
        assert!(matches!(
            parse_dsn("clickhouse://127.0.0.1:8123"),
            Err(DsnError::UnknownScheme)
        ));
    }

    #[tokio::test]
    async fn udp_dsn_builds_a_sink() {
        let server = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let dsn = format!("udp://127.0.0.1:{}", server.local_addr().unwrap().port());
        let cfg = parse_dsn(&dsn).unwrap();
        assert!(make_sink_from_config(&cfg).await.is_ok());
    }

    #[tokio::test]
    async fn bad_udp_address_is_reported() {
        let cfg = parse_dsn("udp://no-port-here").unwrap();
        assert!(matches!(
            make_sink_from_config(&cfg).await,
            Err(BackendBuildError::InvalidAddress(_))
        ));
    }
}
