//! Consistency Reducer
//!
//! A fetched batch is expected to be the same fact reported several times.
//! The reducer groups the batch along three dimensions and checks that each
//! one collapses to a single key:
//!
//! 1. **User name** of the author
//! 2. **Date** of the event, in the offset it was recorded with
//! 3. **Params**, compared structurally
//!
//! What happens when a dimension does not collapse is decided by
//! [`AnomalyPolicy`]. Either way the full report is logged so an operator
//! can see which records disagree.

use crate::events::protocol::EventRecord;
use indexmap::IndexMap;
use serde::Deserialize;
use std::fmt;
use std::hash::Hash;

/// How the reducer treats a batch that does not collapse to one key per dimension
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyPolicy {
    /// Any anomaly fails the run, nothing is submitted
    #[default]
    Abort,
    /// Log anomalies and emit one canonical record per distinct user
    PerUser,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dimension {
    UserName,
    Date,
    Params,
}

impl Dimension {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Dimension::UserName => "user_name",
            Dimension::Date => "date",
            Dimension::Params => "params",
        }
    }
}

/// Record indices grouped by key, in first-appearance order.
struct Grouping<K> {
    groups: IndexMap<K, Vec<usize>>,
}

impl<K: Hash + Eq + fmt::Display> Grouping<K> {
    fn build<'a, F>(records: &'a [EventRecord], key: F) -> Self
    where
        F: Fn(&'a EventRecord) -> K,
    {
        let mut groups: IndexMap<K, Vec<usize>> = IndexMap::new();
        for (index, record) in records.iter().enumerate() {
            groups.entry(key(record)).or_default().push(index);
        }
        Self { groups }
    }

    /// Index of the first record in every group.
    fn first_of_each(&self) -> impl Iterator<Item = usize> + '_ {
        self.groups.values().filter_map(|indices| indices.first().copied())
    }

    fn report(&self, dimension: Dimension) -> DimensionReport {
        DimensionReport {
            dimension,
            groups: self
                .groups
                .iter()
                .map(|(key, indices)| (key.to_string(), indices.clone()))
                .collect(),
        }
    }
}

/// Distinct keys seen along one dimension and the records behind each key.
#[derive(Clone, Debug, PartialEq)]
pub struct DimensionReport {
    pub dimension: Dimension,
    pub groups: Vec<(String, Vec<usize>)>,
}

impl DimensionReport {
    pub fn count(&self) -> usize {
        self.groups.len()
    }

    pub fn is_uniform(&self) -> bool {
        self.count() == 1
    }

    #[cfg(test)]
    fn keys(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|(key, _)| key.as_str())
    }
}

impl fmt::Display for DimensionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} distinct {{", self.dimension.as_str(), self.count())?;
        for (i, (key, indices)) in self.groups.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key:?}: {indices:?}")?;
        }
        f.write_str("}")
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ConsistencyReport {
    pub records: usize,
    pub dimensions: [DimensionReport; 3],
}

impl ConsistencyReport {
    pub fn is_consistent(&self) -> bool {
        self.dimensions.iter().all(DimensionReport::is_uniform)
    }

    pub fn anomalies(&self) -> impl Iterator<Item = &DimensionReport> {
        self.dimensions.iter().filter(|d| !d.is_uniform())
    }

    pub fn dimension(&self, dimension: Dimension) -> &DimensionReport {
        match dimension {
            Dimension::UserName => &self.dimensions[0],
            Dimension::Date => &self.dimensions[1],
            Dimension::Params => &self.dimensions[2],
        }
    }
}

impl fmt::Display for ConsistencyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} records", self.records)?;
        for dimension in &self.dimensions {
            write!(f, "; {dimension}")?;
        }
        Ok(())
    }
}

/// The batch did not collapse to a single key in at least one dimension.
#[derive(thiserror::Error, Debug)]
#[error("batch is not uniform: {report}")]
pub struct ConsistencyAnomaly {
    pub report: ConsistencyReport,
}

/// Groups `records` along every dimension. The user grouping is returned as
/// well since canonical records are picked from it.
fn inspect(records: &[EventRecord]) -> (Grouping<&str>, ConsistencyReport) {
    let by_user = Grouping::build(records, |r| r.author.user_name.as_str());
    let by_date = Grouping::build(records, EventRecord::date);
    let by_params = Grouping::build(records, |r| &r.params);

    let report = ConsistencyReport {
        records: records.len(),
        dimensions: [
            by_user.report(Dimension::UserName),
            by_date.report(Dimension::Date),
            by_params.report(Dimension::Params),
        ],
    };

    (by_user, report)
}

/// Groups `records` and returns the canonical record(s) allowed by `policy`.
///
/// Under [`AnomalyPolicy::Abort`] the result is exactly one record, the first
/// in response order. Under [`AnomalyPolicy::PerUser`] it is the first record
/// of every user group. An empty batch is an anomaly under both policies.
pub fn reduce(
    records: &[EventRecord],
    policy: AnomalyPolicy,
) -> Result<Vec<&EventRecord>, ConsistencyAnomaly> {
    let (by_user, report) = inspect(records);

    if report.is_consistent() {
        tracing::info!(
            records = report.records,
            groups = %report,
            "Batch collapses to a single fact"
        );
    } else {
        for anomaly in report.anomalies() {
            tracing::warn!(
                dimension = anomaly.dimension.as_str(),
                count = anomaly.count(),
                groups = %anomaly,
                "Grouping did not collapse to a single key"
            );
        }
    }

    let must_abort = match policy {
        AnomalyPolicy::Abort => !report.is_consistent(),
        AnomalyPolicy::PerUser => records.is_empty(),
    };
    if must_abort {
        return Err(ConsistencyAnomaly { report });
    }

    Ok(by_user.first_of_each().map(|i| &records[i]).collect())
}
