use relay::config::{Config as RelayConfig, ValidationError};
use serde::Deserialize;
use std::fs::File;

#[derive(Deserialize, Debug)]
pub struct MetricsConfig {
    pub statsd_host: String,
    pub statsd_port: u16,
    #[serde(default = "default_metrics_prefix")]
    pub prefix: String,
}

fn default_metrics_prefix() -> String {
    "kpi_relay".to_string()
}

#[derive(Deserialize, Debug)]
pub struct LoggingConfig {
    pub sentry_dsn: Option<String>,
    /// Filter used when `RUST_LOG` is not set
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Deserialize, Debug)]
pub struct CommonConfig {
    pub metrics: Option<MetricsConfig>,
    pub logging: Option<LoggingConfig>,
}

#[derive(Deserialize, Debug)]
pub struct Config {
    #[serde(flatten)]
    pub common: CommonConfig,
    pub relay: RelayConfig,
}

impl Config {
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let data = serde_yaml::from_reader(file)?;

        Ok(data)
    }

    /// Reads the file, applies environment overrides and validates the result.
    pub fn load(path: &std::path::Path) -> Result<Self, ConfigError> {
        let mut config = Self::from_file(path)?;
        config.relay.apply_overrides(|key| std::env::var(key).ok());
        config.relay.validate()?;

        Ok(config)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("could not load config from file: {0}")]
    LoadError(#[from] std::io::Error),
    #[error("could not parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(#[from] ValidationError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay::reducer::AnomalyPolicy;
    use std::io::Write;

    fn write_tmp_file(s: &str) -> tempfile::NamedTempFile {
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        write!(tmp, "{}", s).expect("write yaml");

        tmp
    }

    const RELAY_YAML: &str = r#"
            relay:
                endpoints:
                    auth: https://kpi.example.com/_api/auth/login
                    events: https://kpi.example.com/_api/events
                    facts: https://kpi.example.com/_api/facts/save_fact
                credentials:
                    login: admin
                    password: admin
                bearer_token: abc
                anomaly_policy: per_user
            "#;

    #[test]
    fn relay_config() {
        let tmp = write_tmp_file(RELAY_YAML);
        let config = Config::from_file(tmp.path()).expect("load config");

        assert!(config.common.logging.is_none());
        assert!(config.common.metrics.is_none());
        assert_eq!(config.relay.credentials.login, "admin");
        assert_eq!(config.relay.anomaly_policy, AnomalyPolicy::PerUser);
        assert_eq!(config.relay.query.limit, 10);
    }

    #[test]
    fn common_config() {
        let yaml = format!(
            "{}{}",
            r#"
            logging:
                sentry_dsn: https://key@sentry.example.com/1
            metrics:
                statsd_host: 127.0.0.1
                statsd_port: 8125
            "#,
            RELAY_YAML
        );
        let tmp = write_tmp_file(&yaml);
        let config = Config::from_file(tmp.path()).expect("load config");

        let logging = config.common.logging.expect("logging config");
        assert_eq!(logging.level, "info");
        assert!(logging.sentry_dsn.is_some());

        let metrics = config.common.metrics.expect("metrics config");
        assert_eq!(metrics.statsd_port, 8125);
        assert_eq!(metrics.prefix, "kpi_relay");
    }

    #[test]
    fn invalid_config_rejected() {
        let yaml = RELAY_YAML.replace(
            "anomaly_policy: per_user",
            "anomaly_policy: per_user\n                query:\n                    limit: 0",
        );
        let tmp = write_tmp_file(&yaml);
        assert!(matches!(
            Config::load(tmp.path()).unwrap_err(),
            ConfigError::Invalid(ValidationError::ZeroLimit)
        ));
    }

    #[test]
    fn example_config() {
        let path =
            std::path::Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/example_config.yaml"));
        let config = Config::from_file(path).expect("load example config");
        assert!(config.relay.validate().is_ok());
        assert_eq!(config.relay.anomaly_policy, AnomalyPolicy::Abort);
    }

    #[test]
    fn missing_file() {
        let err = Config::from_file(std::path::Path::new("/nonexistent/kpi-relay.yaml"));
        assert!(matches!(err.unwrap_err(), ConfigError::LoadError(_)));
    }
}
