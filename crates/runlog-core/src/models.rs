//! Data models for the tracking API.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of a run.
///
/// A run starts in `Running` and must end in one of the terminal states.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunStatus {
    Running,
    Finished,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, RunStatus::Running)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Running => write!(f, "RUNNING"),
            RunStatus::Finished => write!(f, "FINISHED"),
            RunStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// A named grouping of runs, created lazily by name on the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experiment {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// One execution record. The id and artifact root are server-assigned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: String,
    pub name: String,
    pub experiment_id: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    /// Root `s3://bucket/prefix` URI for this run's artifacts.
    pub artifact_uri: String,
}

/// A single metric observation. Multiple points per key form a time series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricPoint {
    pub key: String,
    pub value: f64,
    #[serde(default)]
    pub step: Option<u64>,
    pub timestamp: DateTime<Utc>,
}

/// Read view of a run: the run itself plus its logged parameters and the
/// latest value per metric key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunData {
    pub run: Run,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    #[serde(default)]
    pub latest_metrics: BTreeMap<String, f64>,
}
