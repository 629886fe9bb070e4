use crate::config::Config;
use crate::errors::{ClientBuildError, RelayError, Result, Step, SubmitError};
use crate::events::EventFetcher;
use crate::facts::{FactPayload, FactSubmitter};
use crate::metrics_defs::{ANOMALIES, EVENTS_FETCHED, RUNS, STEP_DURATION};
use crate::reducer;
use crate::session::SessionClient;
use shared::{counter, histogram};
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, Default)]
pub struct RunOptions {
    /// Build and log the facts without posting them
    pub dry_run: bool,
}

/// What a successful run did
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunSummary {
    pub fetched: usize,
    pub canonical: usize,
    pub submitted: usize,
}

/// Runs login, fetch, reduce and submit one after another.
///
/// All three endpoints share one HTTP client. A failing step ends the run,
/// so no fact is posted unless every earlier step succeeded.
pub struct Relay {
    config: Config,
    session: SessionClient,
    events: EventFetcher,
    facts: FactSubmitter,
}

impl Relay {
    pub fn new(config: Config) -> std::result::Result<Self, ClientBuildError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(concat!("kpi-relay/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            session: SessionClient::new(client.clone(), config.endpoints.auth.clone()),
            events: EventFetcher::new(client.clone(), config.endpoints.events.clone()),
            facts: FactSubmitter::new(
                client,
                config.endpoints.facts.clone(),
                config.bearer_token.expose().to_string(),
            ),
            config,
        })
    }

    pub async fn run(&self, options: RunOptions) -> Result<RunSummary> {
        let result = self.run_steps(options).await;

        match &result {
            Ok(summary) => {
                tracing::info!(
                    fetched = summary.fetched,
                    canonical = summary.canonical,
                    submitted = summary.submitted,
                    dry_run = options.dry_run,
                    "Relay run finished"
                );
                counter!(RUNS, "outcome" => "success").increment(1);
            }
            Err(e) => {
                if e.is_anomaly() {
                    counter!(ANOMALIES).increment(1);
                }
                counter!(RUNS, "outcome" => "failure", "step" => e.step().as_str()).increment(1);
            }
        }

        result
    }

    async fn run_steps(&self, options: RunOptions) -> Result<RunSummary> {
        let started = Instant::now();
        let session = self.session.login(&self.config.credentials).await?;
        record_duration(Step::Login, started);

        let started = Instant::now();
        let records = self.events.fetch(&session, &self.config.query).await?;
        record_duration(Step::Fetch, started);
        histogram!(EVENTS_FETCHED).record(records.len() as f64);

        let started = Instant::now();
        let canonical = reducer::reduce(&records, self.config.anomaly_policy)?;
        record_duration(Step::Reduce, started);

        let payloads = canonical
            .iter()
            .map(|record| FactPayload::build(record, &self.config.facts))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| RelayError::Submit(SubmitError::Encode(e)))?;

        for (record, payload) in canonical.iter().zip(&payloads) {
            tracing::info!(
                event_id = %record.id,
                user_name = %record.author.user_name,
                fact_time = %payload.fact_time,
                "Prepared fact"
            );
            tracing::debug!(payload = ?payload, "Fact payload");
        }

        let submitted = if options.dry_run {
            tracing::info!(facts = payloads.len(), "Dry run, not submitting facts");
            0
        } else {
            let started = Instant::now();
            let submitted = self
                .facts
                .submit_all(&payloads, self.config.submit_policy)
                .await?;
            record_duration(Step::Submit, started);
            submitted
        };

        Ok(RunSummary {
            fetched: records.len(),
            canonical: canonical.len(),
            submitted,
        })
    }
}

fn record_duration(step: Step, started: Instant) {
    histogram!(STEP_DURATION, "step" => step.as_str()).record(started.elapsed().as_secs_f64());
}
