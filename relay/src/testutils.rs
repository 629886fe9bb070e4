use crate::events::protocol::{Author, EventParams, EventRecord, Period};
use chrono::{DateTime, Duration};
use http::HeaderMap;
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder;
use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use url::Url;

/// A request as seen by the mock upstream
#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn query_pairs(&self) -> HashMap<String, String> {
        let query = self.query.as_deref().unwrap_or_default();
        url::form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect()
    }

    pub fn form(&self) -> HashMap<String, String> {
        url::form_urlencoded::parse(&self.body).into_owned().collect()
    }
}

/// Canned response returned by the mock upstream
pub struct Reply {
    status: u16,
    headers: Vec<(&'static str, String)>,
    body: String,
}

impl Reply {
    pub fn status(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    pub fn json(status: u16, body: String) -> Self {
        Self {
            status,
            headers: vec![("content-type", "application/json".to_string())],
            body,
        }
    }

    pub fn with_header(mut self, name: &'static str, value: &str) -> Self {
        self.headers.push((name, value.to_string()));
        self
    }

    fn into_response(self) -> Response<Full<Bytes>> {
        let mut builder = Response::builder().status(self.status);
        for (name, value) in self.headers {
            builder = builder.header(name, value);
        }
        builder.body(Full::new(Bytes::from(self.body))).unwrap()
    }
}

/// In-process HTTP server that records every request and answers through a
/// handler closure. The server stops when the value is dropped.
pub struct MockUpstream {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    task: JoinHandle<()>,
}

impl MockUpstream {
    pub async fn start<F>(handler: F) -> Self
    where
        F: Fn(&RecordedRequest) -> Reply + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to address");
        let addr = listener.local_addr().unwrap();

        let handler = Arc::new(handler);
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = requests.clone();

        let task = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let io = TokioIo::new(stream);
                let handler = handler.clone();
                let recorded = recorded.clone();

                tokio::spawn(async move {
                    let service = service_fn(move |req: Request<Incoming>| {
                        let handler = handler.clone();
                        let recorded = recorded.clone();
                        async move {
                            let (parts, body) = req.into_parts();
                            let body = body
                                .collect()
                                .await
                                .map(|collected| collected.to_bytes())
                                .unwrap_or_default();

                            let request = RecordedRequest {
                                method: parts.method.to_string(),
                                path: parts.uri.path().to_string(),
                                query: parts.uri.query().map(String::from),
                                headers: parts.headers,
                                body,
                            };
                            let reply = handler(&request);
                            recorded.lock().unwrap().push(request);

                            Ok::<_, Infallible>(reply.into_response())
                        }
                    });

                    let _ = Builder::new(TokioExecutor::new())
                        .serve_connection(io, service)
                        .await;
                });
            }
        });

        Self {
            addr,
            requests,
            task,
        }
    }

    pub fn url(&self, path: &str) -> Url {
        Url::parse(&format!("http://{}{}", self.addr, path)).unwrap()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }
}

impl Drop for MockUpstream {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// A matrix request by "ivanov" on 2023-05-01.
pub fn event_record(index: usize) -> EventRecord {
    let time = DateTime::parse_from_rfc3339("2023-05-01T18:00:00+03:00").unwrap()
        - Duration::minutes(index as i64);

    EventRecord {
        id: format!("events/{index}"),
        key: index.to_string(),
        revision: format!("_rev{index}"),
        author: Author {
            mo_id: 42,
            user_id: 40,
            user_name: "ivanov".to_string(),
        },
        group: "matrix".to_string(),
        message: "requested indicator".to_string(),
        params: EventParams {
            indicator_to_mo_id: 315914,
            period: Period {
                end: "2023-05-31".to_string(),
                start: "2023-05-01".to_string(),
                type_id: 3,
                type_key: "month".to_string(),
            },
            platform: "web".to_string(),
        },
        time,
        kind: "MATRIX_REQUEST".to_string(),
    }
}

/// `count` records built by [`event_record`], each passed through `tweak`.
pub fn event_rows(count: usize, tweak: impl Fn(usize, &mut EventRecord)) -> Vec<EventRecord> {
    (0..count)
        .map(|i| {
            let mut record = event_record(i);
            tweak(i, &mut record);
            record
        })
        .collect()
}

/// Response envelope of the event store around `rows`.
pub fn events_body(rows: &[EventRecord]) -> String {
    serde_json::json!({
        "MESSAGES": {"error": null, "warning": null, "info": null},
        "DATA": {
            "page": 1,
            "pages_count": 1,
            "rows_count": rows.len(),
            "rows": rows,
        },
        "STATUS": "OK",
    })
    .to_string()
}
