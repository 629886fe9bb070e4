//! Wire types for the event store query endpoint.
//!
//! The endpoint takes a filter/sort/limit document as the body of a `GET`
//! request and answers with an envelope around the matching rows:
//!
//! ```json
//! {
//!   "MESSAGES": {"error": null, "warning": null, "info": null},
//!   "DATA": {"page": 1, "pages_count": 1, "rows_count": 10, "rows": [...]},
//!   "STATUS": "OK"
//! }
//! ```

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

/// Query document sent as the request body.
///
/// # Example
/// ```json
/// {
///   "filter": {"field": {"key": "type", "sign": "LIKE", "values": ["MATRIX_REQUEST"]}},
///   "sort": {"fields": ["time"], "direction": "DESC"},
///   "limit": 10
/// }
/// ```
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EventQuery {
    pub filter: Filter,
    pub sort: Sort,
    pub limit: u32,
}

impl Default for EventQuery {
    fn default() -> Self {
        Self {
            filter: Filter::default(),
            sort: Sort::default(),
            limit: 10,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Filter {
    pub field: FieldFilter,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FieldFilter {
    pub key: String,
    pub sign: String,
    pub values: Vec<String>,
}

impl Default for FieldFilter {
    fn default() -> Self {
        Self {
            key: "type".to_string(),
            sign: "LIKE".to_string(),
            values: vec!["MATRIX_REQUEST".to_string()],
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Sort {
    pub fields: Vec<String>,
    pub direction: SortDirection,
}

impl Default for Sort {
    fn default() -> Self {
        Self {
            fields: vec!["time".to_string()],
            direction: SortDirection::Desc,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Response envelope of the event endpoint.
#[derive(Debug, Deserialize)]
pub struct EventsResponse {
    #[serde(rename = "MESSAGES", default)]
    pub messages: Messages,

    #[serde(rename = "DATA")]
    pub data: EventsPage,

    #[serde(rename = "STATUS", default)]
    pub status: String,
}

/// Free-form diagnostics the store attaches to a response. Each field may be
/// null, a string, or a list depending on the server version.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Messages {
    pub error: JsonValue,
    pub warning: JsonValue,
    pub info: JsonValue,
}

impl Messages {
    /// Yields `(level, value)` for every message slot that carries content.
    pub fn present(&self) -> impl Iterator<Item = (&'static str, &JsonValue)> {
        [
            ("error", &self.error),
            ("warning", &self.warning),
            ("info", &self.info),
        ]
        .into_iter()
        .filter(|(_, value)| !is_blank(value))
    }
}

fn is_blank(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => true,
        JsonValue::String(s) => s.is_empty(),
        JsonValue::Array(a) => a.is_empty(),
        JsonValue::Object(o) => o.is_empty(),
        _ => false,
    }
}

#[derive(Debug, Deserialize)]
pub struct EventsPage {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub pages_count: u32,
    #[serde(default)]
    pub rows_count: u32,
    pub rows: Vec<EventRecord>,
}

/// A single event as stored in the document store.
///
/// Only the fields the fact is derived from are required; store metadata
/// and author ids default when absent.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EventRecord {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_key", default)]
    pub key: String,
    #[serde(rename = "_rev", default)]
    pub revision: String,
    pub author: Author,
    #[serde(default)]
    pub group: String,
    #[serde(rename = "msg", default)]
    pub message: String,
    pub params: EventParams,
    pub time: DateTime<FixedOffset>,
    #[serde(rename = "type")]
    pub kind: String,
}

impl EventRecord {
    /// Calendar date of the event in the offset it was recorded with.
    pub fn date(&self) -> NaiveDate {
        self.time.date_naive()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Author {
    #[serde(default)]
    pub mo_id: i64,
    #[serde(default)]
    pub user_id: i64,
    pub user_name: String,
}

/// Parameters of the requested fact.
///
/// Compared structurally when grouping a batch, so every field takes part in
/// equality and hashing.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct EventParams {
    pub indicator_to_mo_id: i64,
    pub period: Period,
    #[serde(default)]
    pub platform: String,
}

impl fmt::Display for EventParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "indicator {} {}#{} {}..{} on {}",
            self.indicator_to_mo_id,
            self.period.type_key,
            self.period.type_id,
            self.period.start,
            self.period.end,
            self.platform
        )
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Period {
    pub end: String,
    pub start: String,
    pub type_id: i64,
    pub type_key: String,
}
