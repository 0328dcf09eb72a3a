//! runlog CLI: log runs to a remote tracking server from the command line.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Table};
use indicatif::ProgressBar;
use tracing_subscriber::EnvFilter;

use runlog_core::{artifacts, ActiveRun, TrackingClient, TrackingConfig};

const SAMPLE_ARTIFACT: &str = "This is an example artifact.\nAccuracy: 0.85";

#[derive(Parser)]
#[command(
    name = "runlog",
    about = "📈 runlog: record parameters, metrics, and artifacts on a remote tracking server",
    version
)]
struct Cli {
    /// Tracking server URI (overrides RUNLOG_TRACKING_URI)
    #[arg(long, global = true)]
    tracking_uri: Option<String>,
    /// Read configuration from a YAML file instead of the environment
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log a sample run: writes a local example artifact, then records two
    /// parameters, one metric, and the artifact directory
    Demo {
        /// Experiment name
        #[arg(long, short, default_value = "logging_example")]
        experiment: String,
        /// Local directory for the sample artifact
        #[arg(long, default_value = "outputs")]
        output_dir: PathBuf,
    },
    /// Log a run from command-line values
    Log {
        /// Experiment name
        #[arg(long, short)]
        experiment: String,
        /// Parameter (repeatable)
        #[arg(long = "param", short = 'p', value_name = "KEY=VALUE")]
        params: Vec<String>,
        /// Metric, with an optional step suffix (repeatable)
        #[arg(long = "metric", short = 'm', value_name = "KEY=VALUE[@STEP]")]
        metrics: Vec<String>,
        /// File or directory to upload (repeatable)
        #[arg(long = "artifact", short = 'a', value_name = "PATH")]
        artifacts: Vec<PathBuf>,
    },
    /// List experiments, or the runs of one experiment
    List {
        /// Show runs for a specific experiment
        #[arg(long, short)]
        experiment: Option<String>,
    },
    /// Show one run: status, parameters, latest metric values
    Show {
        /// Run identifier
        run_id: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => TrackingConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => TrackingConfig::from_env()?,
    };
    if let Some(uri) = cli.tracking_uri {
        config.tracking_uri = uri;
    }

    match cli.command {
        Commands::Demo {
            experiment,
            output_dir,
        } => cmd_demo(config, &experiment, &output_dir),
        Commands::Log {
            experiment,
            params,
            metrics,
            artifacts,
        } => cmd_log(config, &experiment, &params, &metrics, &artifacts),
        Commands::List { experiment } => cmd_list(config, experiment.as_deref()),
        Commands::Show { run_id } => cmd_show(config, &run_id),
    }
}

// ─── Command implementations ──────────────────────────────────────────────────

fn cmd_demo(config: TrackingConfig, experiment: &str, output_dir: &Path) -> Result<()> {
    // The local artifact is written before any network traffic, so it
    // survives an unreachable server.
    fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;
    let info_path = output_dir.join("info.txt");
    fs::write(&info_path, SAMPLE_ARTIFACT)
        .with_context(|| format!("failed to write {}", info_path.display()))?;
    println!("Wrote sample artifact: {}", info_path.display());

    let client = TrackingClient::new(config)?;
    let exp = client.get_or_create_experiment(experiment)?;
    let mut run = client.start_run(&exp.id)?;
    let run_id = run.id().to_string();

    run.log_param("learning_rate", "0.01")?;
    run.log_param("epochs", "10")?;
    run.log_metric("accuracy", 0.85, None)?;
    upload_dir_with_progress(&mut run, output_dir)?;
    run.finish()?;

    println!("✓ Parameters, metric, and artifacts logged.");
    println!(
        "View run at: {}/#/experiments/{}/runs/{}",
        client.tracking_uri(),
        exp.id,
        run_id
    );
    Ok(())
}

fn cmd_log(
    config: TrackingConfig,
    experiment: &str,
    params: &[String],
    metrics: &[String],
    artifact_paths: &[PathBuf],
) -> Result<()> {
    // Parse everything up front so a malformed argument never opens a run.
    let params: Vec<(String, String)> = params
        .iter()
        .map(|raw| parse_param(raw))
        .collect::<Result<_>>()?;
    let metrics: Vec<(String, f64, Option<u64>)> = metrics
        .iter()
        .map(|raw| parse_metric(raw))
        .collect::<Result<_>>()?;

    let client = TrackingClient::new(config)?;
    let exp = client.get_or_create_experiment(experiment)?;
    let mut run = client.start_run(&exp.id)?;
    let run_id = run.id().to_string();

    run.log_params(params)?;
    for (key, value, step) in metrics {
        run.log_metric(&key, value, step)?;
    }
    for path in artifact_paths {
        if path.is_dir() {
            upload_dir_with_progress(&mut run, path)?;
        } else {
            run.log_artifact(path)?;
        }
    }
    run.finish()?;

    println!("✓ Logged run {run_id} to experiment '{experiment}'");
    Ok(())
}

fn cmd_list(config: TrackingConfig, experiment: Option<&str>) -> Result<()> {
    let client = TrackingClient::new(config)?;

    if let Some(name) = experiment {
        let exp = client
            .list_experiments()?
            .into_iter()
            .find(|e| e.name == name)
            .with_context(|| format!("experiment '{name}' not found"))?;
        let runs = client.list_runs(&exp.id)?;

        if runs.is_empty() {
            println!("No runs found for experiment '{name}'");
            return Ok(());
        }

        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(["Run", "Name", "Status", "Started", "Finished"]);
        for run in &runs {
            let finished = run
                .finished_at
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "-".to_string());
            table.add_row([
                run.id.as_str(),
                &run.name,
                &run.status.to_string(),
                &run.started_at.format("%Y-%m-%d %H:%M").to_string(),
                &finished,
            ]);
        }
        println!("Experiment: {name}");
        println!("{table}");
    } else {
        let experiments = client.list_experiments()?;

        if experiments.is_empty() {
            println!("No experiments found on {}", client.tracking_uri());
            return Ok(());
        }

        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(["ID", "Experiment", "Created"]);
        for exp in &experiments {
            table.add_row([
                exp.id.as_str(),
                &exp.name,
                &exp.created_at.format("%Y-%m-%d %H:%M").to_string(),
            ]);
        }
        println!("Experiments on: {}", client.tracking_uri());
        println!("{table}");
    }

    Ok(())
}

fn cmd_show(config: TrackingConfig, run_id: &str) -> Result<()> {
    let client = TrackingClient::new(config)?;
    let data = client.get_run(run_id)?;

    println!("Run: {} ({})", data.run.id, data.run.name);
    println!("Experiment: {}", data.run.experiment_id);
    println!("Status: {}", data.run.status);
    println!("Started: {}", data.run.started_at.format("%Y-%m-%d %H:%M:%S"));
    if let Some(finished) = data.run.finished_at {
        println!("Finished: {}", finished.format("%Y-%m-%d %H:%M:%S"));
    }
    println!("Artifacts: {}", data.run.artifact_uri);
    println!();

    if !data.params.is_empty() {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(["Parameter", "Value"]);
        for (key, value) in &data.params {
            table.add_row([key.as_str(), value.as_str()]);
        }
        println!("{table}");
    }

    if !data.latest_metrics.is_empty() {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(["Metric", "Latest value"]);
        for (key, value) in &data.latest_metrics {
            table.add_row([key.as_str(), &value.to_string()]);
        }
        println!("{table}");
    }

    Ok(())
}

// ─── Utilities ────────────────────────────────────────────────────────────────

fn upload_dir_with_progress(run: &mut ActiveRun<'_>, dir: &Path) -> Result<()> {
    let files = artifacts::collect_files(dir)?;
    let bar = ProgressBar::new(files.len() as u64);
    for (path, rel) in files {
        run.log_artifact_as(&rel, &path)?;
        bar.inc(1);
    }
    bar.finish_and_clear();
    Ok(())
}

fn parse_param(raw: &str) -> Result<(String, String)> {
    let Some((key, value)) = raw.split_once('=') else {
        bail!("invalid parameter '{raw}', expected KEY=VALUE");
    };
    if key.is_empty() {
        bail!("invalid parameter '{raw}', expected KEY=VALUE");
    }
    Ok((key.to_string(), value.to_string()))
}

fn parse_metric(raw: &str) -> Result<(String, f64, Option<u64>)> {
    let Some((key, rest)) = raw.split_once('=') else {
        bail!("invalid metric '{raw}', expected KEY=VALUE[@STEP]");
    };
    if key.is_empty() {
        bail!("invalid metric '{raw}', expected KEY=VALUE[@STEP]");
    }
    let (value, step) = match rest.split_once('@') {
        Some((value, step)) => {
            let step: u64 = step
                .parse()
                .with_context(|| format!("invalid step in metric '{raw}'"))?;
            (value, Some(step))
        }
        None => (rest, None),
    };
    let value: f64 = value
        .parse()
        .with_context(|| format!("invalid value in metric '{raw}'"))?;
    Ok((key.to_string(), value, step))
}
