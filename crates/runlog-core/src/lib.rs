//! runlog-core: a synchronous client for a remote run-tracking server.
//!
//! A [`TrackingClient`] opens runs against the server's REST API and
//! returns an [`ActiveRun`] handle that guarantees a terminal state on
//! every exit path. Parameters are write-once, metrics are append-only
//! time series, and artifacts are uploaded to an S3-compatible object
//! store with SigV4-signed requests.
//!
//! ```no_run
//! use runlog_core::{TrackingClient, TrackingConfig};
//!
//! # fn main() -> runlog_core::Result<()> {
//! let client = TrackingClient::new(TrackingConfig::from_env()?)?;
//! let experiment = client.get_or_create_experiment("resnet_cifar10")?;
//!
//! let mut run = client.start_run(&experiment.id)?;
//! run.log_param("learning_rate", "0.01")?;
//! run.log_metric("accuracy", 0.85, None)?;
//! run.log_artifacts("outputs")?;
//! run.finish()?;
//! # Ok(())
//! # }
//! ```

pub mod artifacts;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod run;
pub mod sigv4;

pub use artifacts::{ArtifactLocation, ArtifactStore};
pub use client::TrackingClient;
pub use config::{Credentials, StoreConfig, TrackingConfig};
pub use error::{Result, TrackError};
pub use models::{Experiment, MetricPoint, Run, RunData, RunStatus};
pub use run::ActiveRun;
