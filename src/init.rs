use crate::caller::DEFAULT_SKIP_PREFIX;
use crate::layer::ShippingLayer;
use crate::sink::LogSink;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Configuration for the shipping layer.
///
/// **Fields**
/// - `max_level`: least severe level still shipped; everything below is
///   ignored by the layer. Defaults to `TRACE`, i.e. ship everything.
/// - `enable_stdout`: if `true`, a `tracing_subscriber::fmt` layer is
///   stacked on top so events also land on the console.
/// - `skip_prefix`: module prefix never reported as the caller of a log
///   line; defaults to this crate's own namespace.
#[derive(Clone, Debug)]
pub struct LayerConfig {
    pub max_level: Level,
    pub enable_stdout: bool,
    pub skip_prefix: String,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            max_level: Level::TRACE,
            enable_stdout: true,
            skip_prefix: DEFAULT_SKIP_PREFIX.to_string(),
        }
    }
}

/// Initialize the global `tracing` subscriber using the provided sink and
/// [`LayerConfig`].
///
/// **Parameters**
/// - `sink`: implementation of [`LogSink`] that will receive the events.
/// - `config`: [`LayerConfig`] controlling level ceiling, caller
///   attribution and console echo.
///
/// **Effects**
///
/// Installs a [`Registry`] combined with [`ShippingLayer`] as the global
/// default subscriber, so all `tracing` events in the process are observed
/// by the layer.
pub fn init_tracing_with_config(sink: Arc<dyn LogSink>, config: LayerConfig) {
    let layer = ShippingLayer::new(sink)
        .with_max_level(config.max_level)
        .with_skip_prefix(config.skip_prefix);

    if config.enable_stdout {
        let fmt_layer = tracing_subscriber::fmt::layer();
        let subscriber = Registry::default().with(layer).with(fmt_layer);
        tracing::subscriber::set_global_default(subscriber).expect("set global subscriber");
    } else {
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::set_global_default(subscriber).expect("set global subscriber");
    }
}

/// Initialize tracing with sensible defaults.
///
/// Equivalent to calling [`init_tracing_with_config`] with
/// [`LayerConfig::default`]. This is the recommended entrypoint for typical
/// services.
pub fn init_tracing(sink: Arc<dyn LogSink>) {
    init_tracing_with_config(sink, LayerConfig::default());
}
