use crate::config::Config;
use metrics_exporter_statsd::StatsdBuilder;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(thiserror::Error, Debug)]
pub enum TelemetryError {
    #[error("invalid sentry dsn: {0}")]
    Dsn(#[from] sentry::types::ParseDsnError),
    #[error("invalid log filter: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),
    #[error("could not install log subscriber: {0}")]
    Subscriber(#[from] tracing_subscriber::util::TryInitError),
    #[error("could not build statsd exporter: {0}")]
    Statsd(#[from] metrics_exporter_statsd::StatsdError),
    #[error("could not install metrics recorder: {0}")]
    Recorder(String),
}

/// Keeps the sentry client alive; events are flushed when it is dropped.
pub struct TelemetryGuard {
    _sentry: Option<sentry::ClientInitGuard>,
}

/// Installs the log subscriber, sentry and the statsd exporter as configured.
pub fn init(config: &Config) -> Result<TelemetryGuard, TelemetryError> {
    let logging = config.common.logging.as_ref();

    let sentry_dsn = logging
        .and_then(|l| l.sentry_dsn.as_deref())
        .map(str::parse::<sentry::types::Dsn>)
        .transpose()?;
    let sentry_guard = sentry_dsn.map(|dsn| {
        sentry::init(sentry::ClientOptions {
            dsn: Some(dsn),
            release: sentry::release_name!(),
            ..Default::default()
        })
    });

    let default_level = logging.map(|l| l.level.as_str()).unwrap_or("info");
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_level)?,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(
            sentry_guard
                .as_ref()
                .map(|_| sentry::integrations::tracing::layer()),
        )
        .try_init()?;

    if let Some(metrics_config) = &config.common.metrics {
        let recorder =
            StatsdBuilder::from(metrics_config.statsd_host.as_str(), metrics_config.statsd_port)
                .build(Some(&metrics_config.prefix))?;
        metrics::set_global_recorder(recorder)
            .map_err(|e| TelemetryError::Recorder(e.to_string()))?;
        shared::metrics_defs::describe_all(relay::metrics_defs::ALL_METRICS);

        tracing::info!(
            host = %metrics_config.statsd_host,
            port = metrics_config.statsd_port,
            "Sending metrics to statsd"
        );
    }

    Ok(TelemetryGuard {
        _sentry: sentry_guard,
    })
}
