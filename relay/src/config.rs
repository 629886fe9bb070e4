use crate::events::protocol::EventQuery;
use crate::facts::{FactDefaults, SubmitPolicy};
use crate::reducer::AnomalyPolicy;
use serde::Deserialize;
use std::fmt;
use thiserror::Error;
use url::Url;

/// Replaces `credentials.password` when set
pub const PASSWORD_ENV: &str = "KPI_RELAY_PASSWORD";
/// Replaces `bearer_token` when set
pub const BEARER_TOKEN_ENV: &str = "KPI_RELAY_BEARER_TOKEN";

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Login cannot be empty")]
    EmptyLogin,

    #[error("Bearer token cannot be empty")]
    EmptyBearerToken,

    #[error("Query limit cannot be 0")]
    ZeroLimit,

    #[error("Request timeout cannot be 0")]
    ZeroTimeout,

    #[error("Query filter key cannot be empty")]
    EmptyFilterKey,
}

/// A configuration value that must not end up in logs
#[derive(Clone, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Secret(value.to_string())
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

/// Relay configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    /// Where to log in, read events and store facts
    pub endpoints: Endpoints,
    /// Credentials for the auth endpoint
    pub credentials: Credentials,
    /// Static token sent with fact submissions
    pub bearer_token: Secret,
    /// Timeout applied to every HTTP request
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Filter/sort/limit document sent to the event store
    #[serde(default)]
    pub query: EventQuery,
    /// Fixed values written into every fact
    #[serde(default)]
    pub facts: FactDefaults,
    #[serde(default)]
    pub anomaly_policy: AnomalyPolicy,
    #[serde(default)]
    pub submit_policy: SubmitPolicy,
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Config {
    /// Validates the relay configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.credentials.login.is_empty() {
            return Err(ValidationError::EmptyLogin);
        }

        if self.bearer_token.expose().is_empty() {
            return Err(ValidationError::EmptyBearerToken);
        }

        if self.request_timeout_secs == 0 {
            return Err(ValidationError::ZeroTimeout);
        }

        if self.query.limit == 0 {
            return Err(ValidationError::ZeroLimit);
        }

        if self.query.filter.field.key.is_empty() {
            return Err(ValidationError::EmptyFilterKey);
        }

        Ok(())
    }

    /// Applies secret overrides. `lookup` is usually `std::env::var`.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(password) = lookup(PASSWORD_ENV) {
            self.credentials.password = Secret(password);
        }

        if let Some(token) = lookup(BEARER_TOKEN_ENV) {
            self.bearer_token = Secret(token);
        }
    }
}

/// Remote endpoints
///
/// Note: Uses the `url::Url` type so invalid URLs are rejected during
/// config deserialization.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Endpoints {
    pub auth: Url,
    pub events: Url,
    pub facts: Url,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Credentials {
    pub login: String,
    pub password: Secret,
}
