use crate::reducer::ConsistencyAnomaly;
use http::StatusCode;
use thiserror::Error;

/// Result type alias for relay operations
pub type Result<T, E = RelayError> = std::result::Result<T, E>;

/// The pipeline step an error originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Login,
    Fetch,
    Reduce,
    Submit,
}

impl Step {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Step::Login => "login",
            Step::Fetch => "fetch",
            Step::Reduce => "reduce",
            Step::Submit => "submit",
        }
    }
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("login request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("login rejected with status {0}")]
    Status(StatusCode),

    #[error("login response carried no session cookie")]
    MissingCookie,
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("could not encode event query: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("event request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("event store returned status {0}")]
    Status(StatusCode),

    #[error("could not decode event response: {0}")]
    Decode(#[source] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("could not encode fact payload: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("fact request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("fact endpoint returned status {0}")]
    Status(StatusCode),

    /// Raised under the attempt-all policy once every payload was tried
    #[error("{failed} of {total} fact submissions failed")]
    Partial { failed: usize, total: usize },
}

#[derive(Error, Debug)]
#[error("could not build HTTP client: {0}")]
pub struct ClientBuildError(#[from] reqwest::Error);

/// Errors that terminate a relay run
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("login failed: {0}")]
    Auth(#[from] AuthError),

    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("consistency check failed: {0}")]
    Anomaly(#[from] ConsistencyAnomaly),

    #[error("submit failed: {0}")]
    Submit(#[from] SubmitError),
}

impl RelayError {
    pub fn step(&self) -> Step {
        match self {
            RelayError::Auth(_) => Step::Login,
            RelayError::Fetch(_) => Step::Fetch,
            RelayError::Anomaly(_) => Step::Reduce,
            RelayError::Submit(_) => Step::Submit,
        }
    }

    /// True when the run stopped on unexpected data rather than a transport failure
    pub fn is_anomaly(&self) -> bool {
        matches!(self, RelayError::Anomaly(_))
    }
}
