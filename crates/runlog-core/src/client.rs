//! Blocking HTTP client for the tracking server REST API.

use chrono::{DateTime, Utc};
use reqwest::blocking::{Client as HttpClient, Response};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::info;
use url::Url;
use uuid::Uuid;

use crate::artifacts::ArtifactStore;
use crate::config::TrackingConfig;
use crate::error::{Result, TrackError};
use crate::models::{Experiment, MetricPoint, Run, RunData, RunStatus};
use crate::run::ActiveRun;

/// A session against one tracking server.
///
/// All calls are synchronous and blocking; no retries are performed. A
/// malformed tracking URI fails at construction, an unreachable one at
/// first use.
#[derive(Debug)]
pub struct TrackingClient {
    http: HttpClient,
    base: String,
    store: ArtifactStore,
}

// Request/Response bodies

#[derive(Serialize)]
struct CreateExperimentRequest<'a> {
    name: &'a str,
}

#[derive(Serialize)]
struct CreateRunRequest<'a> {
    name: &'a str,
    started_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct LogParamRequest<'a> {
    key: &'a str,
    value: &'a str,
}

#[derive(Serialize)]
struct LogMetricRequest<'a> {
    key: &'a str,
    value: f64,
    step: Option<u64>,
    timestamp: DateTime<Utc>,
}

#[derive(Serialize)]
struct UpdateRunRequest {
    status: RunStatus,
    finished_at: DateTime<Utc>,
}

#[derive(Deserialize, Default)]
struct ParamConflict {
    #[serde(default)]
    existing: String,
}

impl TrackingClient {
    pub fn new(config: TrackingConfig) -> Result<Self> {
        let base = config.tracking_uri.trim_end_matches('/').to_string();
        let parsed = Url::parse(&base)
            .map_err(|e| TrackError::Config(format!("invalid tracking URI '{base}': {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(TrackError::Config(format!(
                "tracking URI '{base}' must be http or https"
            )));
        }

        let http = HttpClient::builder().timeout(config.timeout()).build()?;
        let store = ArtifactStore::new(config.store.clone(), config.timeout())?;

        Ok(Self { http, base, store })
    }

    pub fn tracking_uri(&self) -> &str {
        &self.base
    }

    /// Resolve an experiment by name, creating it if absent.
    pub fn get_or_create_experiment(&self, name: &str) -> Result<Experiment> {
        let response = self
            .http
            .post(self.url("/api/experiments"))
            .json(&CreateExperimentRequest { name })
            .send()?;
        let response = self.check(response, None)?;
        Ok(response.json()?)
    }

    pub fn list_experiments(&self) -> Result<Vec<Experiment>> {
        let response = self.http.get(self.url("/api/experiments")).send()?;
        let response = self.check(response, None)?;
        Ok(response.json()?)
    }

    pub fn list_runs(&self, experiment_id: &str) -> Result<Vec<Run>> {
        let response = self
            .http
            .get(self.url(&format!("/api/experiments/{experiment_id}/runs")))
            .send()?;
        let not_found = TrackError::ExperimentNotFound(experiment_id.to_string());
        let response = self.check(response, Some(not_found))?;
        Ok(response.json()?)
    }

    /// Open a new run with a generated name. The returned handle ends the
    /// run on every exit path.
    pub fn start_run(&self, experiment_id: &str) -> Result<ActiveRun<'_>> {
        let suffix = Uuid::new_v4().simple().to_string();
        let name = format!("run-{}", &suffix[..8]);
        self.start_run_named(experiment_id, &name)
    }

    pub fn start_run_named(&self, experiment_id: &str, name: &str) -> Result<ActiveRun<'_>> {
        let response = self
            .http
            .post(self.url(&format!("/api/experiments/{experiment_id}/runs")))
            .json(&CreateRunRequest {
                name,
                started_at: Utc::now(),
            })
            .send()?;
        let not_found = TrackError::ExperimentNotFound(experiment_id.to_string());
        let response = self.check(response, Some(not_found))?;
        let run: Run = response.json()?;

        info!(run = %run.id, experiment = %experiment_id, "run started");
        Ok(ActiveRun::new(self, run))
    }

    pub fn get_run(&self, run_id: &str) -> Result<RunData> {
        let response = self
            .http
            .get(self.url(&format!("/api/runs/{run_id}")))
            .send()?;
        let not_found = TrackError::RunNotFound(run_id.to_string());
        let response = self.check(response, Some(not_found))?;
        Ok(response.json()?)
    }

    /// All points logged under one metric key, in append order.
    pub fn metric_history(&self, run_id: &str, key: &str) -> Result<Vec<MetricPoint>> {
        let response = self
            .http
            .get(self.url(&format!("/api/runs/{run_id}/metrics")))
            .query(&[("key", key)])
            .send()?;
        let not_found = TrackError::RunNotFound(run_id.to_string());
        let response = self.check(response, Some(not_found))?;
        Ok(response.json()?)
    }

    pub(crate) fn log_param(&self, run_id: &str, key: &str, value: &str) -> Result<()> {
        let response = self
            .http
            .post(self.url(&format!("/api/runs/{run_id}/params")))
            .json(&LogParamRequest { key, value })
            .send()?;

        if response.status() == StatusCode::CONFLICT {
            let conflict: ParamConflict = response.json().unwrap_or_default();
            return Err(TrackError::DuplicateParam {
                key: key.to_string(),
                existing: conflict.existing,
            });
        }

        let not_found = TrackError::RunNotFound(run_id.to_string());
        self.check(response, Some(not_found))?;
        Ok(())
    }

    pub(crate) fn log_metric(
        &self,
        run_id: &str,
        key: &str,
        value: f64,
        step: Option<u64>,
    ) -> Result<()> {
        let response = self
            .http
            .post(self.url(&format!("/api/runs/{run_id}/metrics")))
            .json(&LogMetricRequest {
                key,
                value,
                step,
                timestamp: Utc::now(),
            })
            .send()?;
        let not_found = TrackError::RunNotFound(run_id.to_string());
        self.check(response, Some(not_found))?;
        Ok(())
    }

    /// Transition a run to a terminal state. Idempotent server-side.
    pub(crate) fn end_run(&self, run_id: &str, status: RunStatus) -> Result<Run> {
        let response = self
            .http
            .patch(self.url(&format!("/api/runs/{run_id}")))
            .json(&UpdateRunRequest {
                status,
                finished_at: Utc::now(),
            })
            .send()?;
        let not_found = TrackError::RunNotFound(run_id.to_string());
        let response = self.check(response, Some(not_found))?;
        let run: Run = response.json()?;

        info!(run = %run.id, status = %run.status, "run ended");
        Ok(run)
    }

    pub(crate) fn store(&self) -> &ArtifactStore {
        &self.store
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// Map non-2xx responses to errors. `not_found` overrides the generic
    /// mapping for 404.
    fn check(&self, response: Response, not_found: Option<TrackError>) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::NOT_FOUND {
            if let Some(err) = not_found {
                return Err(err);
            }
        }
        let message = response
            .text()
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| status.to_string());
        Err(TrackError::Api {
            status: status.as_u16(),
            message,
        })
    }
}
