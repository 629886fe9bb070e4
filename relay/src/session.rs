use crate::config::Credentials;
use crate::errors::AuthError;
use http::header::{HeaderValue, SET_COOKIE};
use std::fmt;
use url::Url;

/// Session cookie returned by a successful login, in `name=value` form.
#[derive(Clone)]
pub struct SessionToken(HeaderValue);

impl SessionToken {
    /// Extracts the `name=value` pair from a `Set-Cookie` header value,
    /// dropping cookie attributes such as `Path` or `Expires`.
    pub fn from_set_cookie(value: &HeaderValue) -> Option<Self> {
        let pair = value.as_bytes().split(|b| *b == b';').next()?.trim_ascii();
        if pair.is_empty() || !pair.contains(&b'=') {
            return None;
        }

        let mut value = HeaderValue::from_bytes(pair).ok()?;
        value.set_sensitive(true);
        Some(SessionToken(value))
    }

    pub fn header_value(&self) -> &HeaderValue {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(<redacted>)")
    }
}

/// Logs in against the auth endpoint.
pub struct SessionClient {
    client: reqwest::Client,
    url: Url,
}

impl SessionClient {
    pub fn new(client: reqwest::Client, url: Url) -> Self {
        Self { client, url }
    }

    /// Sends the credentials as query parameters and returns the first
    /// usable session cookie of the response. No retries.
    pub async fn login(&self, credentials: &Credentials) -> Result<SessionToken, AuthError> {
        let response = self
            .client
            .get(self.url.clone())
            .query(&[
                ("login", credentials.login.as_str()),
                ("password", credentials.password.expose()),
            ])
            .send()
            .await
            // The URL carries the password in its query string
            .map_err(|e| AuthError::Transport(e.without_url()))?;

        let status = response.status();
        tracing::info!(status = %status, url = %self.url, "Auth endpoint responded");

        if !status.is_success() {
            return Err(AuthError::Status(status));
        }

        response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .find_map(SessionToken::from_set_cookie)
            .ok_or(AuthError::MissingCookie)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Secret;
    use crate::testutils::{MockUpstream, Reply};

    fn credentials() -> Credentials {
        Credentials {
            login: "admin".to_string(),
            password: Secret::from("s3cret"),
        }
    }

    #[test]
    fn test_cookie_attributes_stripped() {
        let header = HeaderValue::from_static("sid=abc123; Path=/; HttpOnly");
        let token = SessionToken::from_set_cookie(&header).unwrap();
        assert_eq!(token.header_value(), "sid=abc123");
        assert!(token.header_value().is_sensitive());
        assert_eq!(format!("{token:?}"), "SessionToken(<redacted>)");
    }

    #[test]
    fn test_cookie_without_pair_rejected() {
        assert!(SessionToken::from_set_cookie(&HeaderValue::from_static("")).is_none());
        assert!(SessionToken::from_set_cookie(&HeaderValue::from_static("; Path=/")).is_none());
        assert!(SessionToken::from_set_cookie(&HeaderValue::from_static("garbage")).is_none());
    }

    #[tokio::test]
    async fn test_login_returns_cookie() {
        let upstream = MockUpstream::start(|_| {
            Reply::status(200).with_header("set-cookie", "sid=abc123; Path=/; HttpOnly")
        })
        .await;

        let client = SessionClient::new(reqwest::Client::new(), upstream.url("/_api/auth/login"));
        let token = client.login(&credentials()).await.unwrap();
        assert_eq!(token.header_value(), "sid=abc123");

        let requests = upstream.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, "GET");
        let query = requests[0].query_pairs();
        assert_eq!(query["login"], "admin");
        assert_eq!(query["password"], "s3cret");
    }

    #[tokio::test]
    async fn test_login_unauthorized() {
        let upstream = MockUpstream::start(|_| Reply::status(401)).await;

        let client = SessionClient::new(reqwest::Client::new(), upstream.url("/_api/auth/login"));
        let err = client.login(&credentials()).await.unwrap_err();
        assert!(matches!(err, AuthError::Status(s) if s.as_u16() == 401));
    }

    #[tokio::test]
    async fn test_login_without_cookie() {
        let upstream = MockUpstream::start(|_| Reply::status(200)).await;

        let client = SessionClient::new(reqwest::Client::new(), upstream.url("/_api/auth/login"));
        let err = client.login(&credentials()).await.unwrap_err();
        assert!(matches!(err, AuthError::MissingCookie));
    }

    #[tokio::test]
    async fn test_login_transport_error() {
        // Bind and release a port so nothing is listening on it
        let addr = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap();
        let url = Url::parse(&format!("http://{addr}/_api/auth/login")).unwrap();

        let client = SessionClient::new(reqwest::Client::new(), url);
        let err = client.login(&credentials()).await.unwrap_err();
        assert!(matches!(err, AuthError::Transport(_)));

        let message = crate::errors::RelayError::from(err).to_string();
        assert!(message.starts_with("login failed: login request failed"));
        assert!(!message.contains("s3cret"), "password leaked: {message}");
    }
}
