//! Fact Submitter
//!
//! Turns a canonical event into the flat form the fact endpoint stores and
//! posts it with the static bearer token.

use crate::errors::SubmitError;
use crate::events::protocol::EventRecord;
use crate::metrics_defs::{FACTS_FAILED, FACTS_SUBMITTED};
use serde::{Deserialize, Serialize};
use shared::counter;
use url::Url;

/// Fixed values written into every fact.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct FactDefaults {
    pub period_key: String,
    pub indicator_to_mo_id: String,
    pub indicator_to_mo_fact_id: String,
    pub value: String,
    pub is_plan: String,
    pub auth_user_id: String,
    pub supertag: Supertag,
}

impl Default for FactDefaults {
    fn default() -> Self {
        Self {
            period_key: "month".to_string(),
            indicator_to_mo_id: "315914".to_string(),
            indicator_to_mo_fact_id: "0".to_string(),
            value: "1".to_string(),
            is_plan: "0".to_string(),
            auth_user_id: "40".to_string(),
            supertag: Supertag::default(),
        }
    }
}

/// Tag attached to the fact; its value is the author's user name.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Supertag {
    pub id: i64,
    pub name: String,
    pub key: String,
    pub values_source: i64,
}

impl Default for Supertag {
    fn default() -> Self {
        Self {
            id: 2,
            name: "Клиент".to_string(),
            key: "client".to_string(),
            values_source: 0,
        }
    }
}

#[derive(Serialize)]
struct TaggedValue<'a> {
    tag: &'a Supertag,
    value: &'a str,
}

/// Form fields posted to the fact endpoint.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct FactPayload {
    pub period_start: String,
    pub period_end: String,
    pub period_key: String,
    pub indicator_to_mo_id: String,
    pub indicator_to_mo_fact_id: String,
    pub value: String,
    pub fact_time: String,
    pub is_plan: String,
    pub supertags: String,
    pub auth_user_id: String,
    pub comment: String,
}

impl FactPayload {
    pub fn build(record: &EventRecord, defaults: &FactDefaults) -> Result<Self, serde_json::Error> {
        let supertags = serde_json::to_string(&[TaggedValue {
            tag: &defaults.supertag,
            value: &record.author.user_name,
        }])?;

        Ok(Self {
            period_start: record.params.period.start.clone(),
            period_end: record.params.period.end.clone(),
            period_key: defaults.period_key.clone(),
            indicator_to_mo_id: defaults.indicator_to_mo_id.clone(),
            indicator_to_mo_fact_id: defaults.indicator_to_mo_fact_id.clone(),
            value: defaults.value.clone(),
            fact_time: record.date().format("%Y-%m-%d").to_string(),
            is_plan: defaults.is_plan.clone(),
            supertags,
            auth_user_id: defaults.auth_user_id.clone(),
            comment: serde_json::to_string_pretty(&record.params)?,
        })
    }
}

/// What to do with the remaining facts once one submission fails
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SubmitPolicy {
    /// Stop at the first failure
    #[default]
    FailFast,
    /// Try every fact, then fail if any of them failed
    AttemptAll,
}

pub struct FactSubmitter {
    client: reqwest::Client,
    url: Url,
    bearer_token: String,
}

impl FactSubmitter {
    pub fn new(client: reqwest::Client, url: Url, bearer_token: String) -> Self {
        Self {
            client,
            url,
            bearer_token,
        }
    }

    pub async fn submit(&self, payload: &FactPayload) -> Result<(), SubmitError> {
        let response = self
            .client
            .post(self.url.clone())
            .bearer_auth(&self.bearer_token)
            .form(payload)
            .send()
            .await?;

        let status = response.status();
        tracing::info!(status = %status, url = %self.url, "Fact endpoint responded");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, body = %body, "Fact was rejected");
            return Err(SubmitError::Status(status));
        }

        Ok(())
    }

    /// Submits `payloads` one after another and returns how many were stored.
    pub async fn submit_all(
        &self,
        payloads: &[FactPayload],
        policy: SubmitPolicy,
    ) -> Result<usize, SubmitError> {
        let mut failed = 0;

        for payload in payloads {
            match self.submit(payload).await {
                Ok(()) => counter!(FACTS_SUBMITTED).increment(1),
                Err(e) => {
                    counter!(FACTS_FAILED).increment(1);
                    if policy == SubmitPolicy::FailFast {
                        return Err(e);
                    }
                    tracing::error!(
                        error = %e,
                        fact_time = %payload.fact_time,
                        "Fact submission failed, continuing with the rest"
                    );
                    failed += 1;
                }
            }
        }

        if failed > 0 {
            return Err(SubmitError::Partial {
                failed,
                total: payloads.len(),
            });
        }

        Ok(payloads.len())
    }
}
