//! Event Fetcher
//!
//! Reads the most recent events from the document store. The store expects
//! its query document in the body of a `GET` request, which most client
//! abstractions do not offer, so the request is assembled explicitly as a
//! [`BodyRequest`] and handed to the client as a raw `reqwest::Request`.

pub mod protocol;

use crate::errors::FetchError;
use crate::session::SessionToken;
use http::header::{CONTENT_TYPE, COOKIE, HeaderMap, HeaderName, HeaderValue};
use http::Method;
use protocol::{EventQuery, EventRecord, EventsResponse};
use serde::Serialize;
use url::Url;

/// A request with an explicit method and a body, independent of what the
/// method conventionally allows.
#[derive(Debug)]
pub struct BodyRequest {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl BodyRequest {
    /// Builds a request whose body is `body` encoded as JSON.
    pub fn json<T: Serialize>(
        method: Method,
        url: Url,
        body: &T,
    ) -> Result<Self, serde_json::Error> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        Ok(Self {
            method,
            url,
            headers,
            body: serde_json::to_vec(body)?,
        })
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn into_request(self) -> reqwest::Request {
        let mut request = reqwest::Request::new(self.method, self.url);
        *request.headers_mut() = self.headers;
        *request.body_mut() = Some(reqwest::Body::from(self.body));
        request
    }
}

pub struct EventFetcher {
    client: reqwest::Client,
    url: Url,
}

impl EventFetcher {
    pub fn new(client: reqwest::Client, url: Url) -> Self {
        Self { client, url }
    }

    /// Runs `query` against the store and returns the rows in response order.
    ///
    /// This is a single request; the response is not paginated further even
    /// if the store reports more pages.
    pub async fn fetch(
        &self,
        session: &SessionToken,
        query: &EventQuery,
    ) -> Result<Vec<EventRecord>, FetchError> {
        let request = BodyRequest::json(Method::GET, self.url.clone(), query)
            .map_err(FetchError::Encode)?
            .header(COOKIE, session.header_value().clone())
            .into_request();

        let response = self.client.execute(request).await?;
        let status = response.status();
        tracing::info!(status = %status, url = %self.url, "Event store responded");

        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let body = response.bytes().await?;
        let parsed: EventsResponse = serde_json::from_slice(&body).map_err(FetchError::Decode)?;

        for (slot, message) in parsed.messages.present() {
            tracing::warn!(slot, message = %message, "Event store attached a message");
        }

        if parsed.status != "OK" {
            tracing::warn!(status = %parsed.status, "Event store reported a non-OK status");
        }

        let rows = parsed.data.rows;
        if rows.len() > query.limit as usize {
            tracing::warn!(
                rows = rows.len(),
                limit = query.limit,
                "Event store returned more rows than requested"
            );
        }

        tracing::debug!(
            rows = rows.len(),
            page = parsed.data.page,
            pages_count = parsed.data.pages_count,
            rows_count = parsed.data.rows_count,
            "Fetched events"
        );

        Ok(rows)
    }
}
