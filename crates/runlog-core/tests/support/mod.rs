//! In-process stubs for the tracking server and the object store.
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::{json, Value};

use runlog_core::{Credentials, StoreConfig, TrackingConfig};

pub const TEST_ACCESS_KEY: &str = "test-access";
pub const TEST_SECRET_KEY: &str = "test-secret";
pub const TEST_BUCKET: &str = "runlog-test";

// ─── Tracking server stub ────────────────────────────────────────────────────

#[derive(Default)]
pub struct TrackingStub {
    pub experiments: Mutex<Vec<(String, String)>>,
    pub runs: Mutex<BTreeMap<String, StubRun>>,
    counter: AtomicU64,
}

pub struct StubRun {
    pub name: String,
    pub experiment_id: String,
    pub status: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub artifact_uri: String,
    pub params: BTreeMap<String, String>,
    pub metrics: Vec<Value>,
}

impl TrackingStub {
    fn next_id(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn run_status(&self, run_id: &str) -> Option<String> {
        self.runs
            .lock()
            .unwrap()
            .get(run_id)
            .map(|r| r.status.clone())
    }

    pub fn seed_param(&self, run_id: &str, key: &str, value: &str) {
        self.runs
            .lock()
            .unwrap()
            .get_mut(run_id)
            .expect("run must exist")
            .params
            .insert(key.to_string(), value.to_string());
    }
}

fn run_json(id: &str, run: &StubRun) -> Value {
    json!({
        "id": id,
        "name": run.name,
        "experiment_id": run.experiment_id,
        "status": run.status,
        "started_at": run.started_at,
        "finished_at": run.finished_at,
        "artifact_uri": run.artifact_uri,
    })
}

async fn create_experiment(
    State(state): State<Arc<TrackingStub>>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let name = body["name"].as_str().unwrap_or_default().to_string();
    let mut experiments = state.experiments.lock().unwrap();
    let id = match experiments.iter().find(|(_, n)| *n == name) {
        Some((id, _)) => id.clone(),
        None => {
            let id = format!("e{}", state.next_id());
            experiments.push((id.clone(), name.clone()));
            id
        }
    };
    Json(json!({
        "id": id,
        "name": name,
        "created_at": "2026-01-01T00:00:00Z",
    }))
}

async fn list_experiments(State(state): State<Arc<TrackingStub>>) -> impl IntoResponse {
    let experiments = state.experiments.lock().unwrap();
    let list: Vec<Value> = experiments
        .iter()
        .map(|(id, name)| {
            json!({
                "id": id,
                "name": name,
                "created_at": "2026-01-01T00:00:00Z",
            })
        })
        .collect();
    Json(list)
}

async fn create_run(
    State(state): State<Arc<TrackingStub>>,
    Path(experiment_id): Path<String>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let known = state
        .experiments
        .lock()
        .unwrap()
        .iter()
        .any(|(id, _)| *id == experiment_id);
    if !known {
        return (StatusCode::NOT_FOUND, "no such experiment").into_response();
    }

    let id = format!("r{}", state.next_id());
    let run = StubRun {
        name: body["name"].as_str().unwrap_or_default().to_string(),
        experiment_id: experiment_id.clone(),
        status: "RUNNING".to_string(),
        started_at: body["started_at"]
            .as_str()
            .unwrap_or("2026-01-01T00:00:00Z")
            .to_string(),
        finished_at: None,
        artifact_uri: format!("s3://{TEST_BUCKET}/{experiment_id}/{id}/artifacts"),
        params: BTreeMap::new(),
        metrics: Vec::new(),
    };
    let response = Json(run_json(&id, &run)).into_response();
    state.runs.lock().unwrap().insert(id, run);
    response
}

async fn list_runs(
    State(state): State<Arc<TrackingStub>>,
    Path(experiment_id): Path<String>,
) -> impl IntoResponse {
    let known = state
        .experiments
        .lock()
        .unwrap()
        .iter()
        .any(|(id, _)| *id == experiment_id);
    if !known {
        return (StatusCode::NOT_FOUND, "no such experiment").into_response();
    }
    let runs = state.runs.lock().unwrap();
    let list: Vec<Value> = runs
        .iter()
        .filter(|(_, r)| r.experiment_id == experiment_id)
        .map(|(id, r)| run_json(id, r))
        .collect();
    Json(list).into_response()
}

async fn get_run(
    State(state): State<Arc<TrackingStub>>,
    Path(run_id): Path<String>,
) -> impl IntoResponse {
    let runs = state.runs.lock().unwrap();
    let Some(run) = runs.get(&run_id) else {
        return (StatusCode::NOT_FOUND, "no such run").into_response();
    };
    let mut latest: BTreeMap<String, f64> = BTreeMap::new();
    for point in &run.metrics {
        if let (Some(key), Some(value)) = (point["key"].as_str(), point["value"].as_f64()) {
            latest.insert(key.to_string(), value);
        }
    }
    Json(json!({
        "run": run_json(&run_id, run),
        "params": run.params,
        "latest_metrics": latest,
    }))
    .into_response()
}

async fn log_param(
    State(state): State<Arc<TrackingStub>>,
    Path(run_id): Path<String>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let mut runs = state.runs.lock().unwrap();
    let Some(run) = runs.get_mut(&run_id) else {
        return (StatusCode::NOT_FOUND, "no such run").into_response();
    };
    let key = body["key"].as_str().unwrap_or_default().to_string();
    let value = body["value"].as_str().unwrap_or_default().to_string();
    if let Some(existing) = run.params.get(&key) {
        if *existing != value {
            return (
                StatusCode::CONFLICT,
                Json(json!({
                    "message": format!("parameter '{key}' already set"),
                    "existing": existing,
                })),
            )
                .into_response();
        }
        return StatusCode::NO_CONTENT.into_response();
    }
    run.params.insert(key, value);
    StatusCode::NO_CONTENT.into_response()
}

async fn log_metric(
    State(state): State<Arc<TrackingStub>>,
    Path(run_id): Path<String>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let mut runs = state.runs.lock().unwrap();
    let Some(run) = runs.get_mut(&run_id) else {
        return (StatusCode::NOT_FOUND, "no such run").into_response();
    };
    run.metrics.push(body);
    StatusCode::NO_CONTENT.into_response()
}

async fn get_metrics(
    State(state): State<Arc<TrackingStub>>,
    Path(run_id): Path<String>,
    Query(query): Query<BTreeMap<String, String>>,
) -> impl IntoResponse {
    let runs = state.runs.lock().unwrap();
    let Some(run) = runs.get(&run_id) else {
        return (StatusCode::NOT_FOUND, "no such run").into_response();
    };
    let key = query.get("key").cloned().unwrap_or_default();
    let points: Vec<Value> = run
        .metrics
        .iter()
        .filter(|p| p["key"].as_str() == Some(key.as_str()))
        .cloned()
        .collect();
    Json(points).into_response()
}

async fn update_run(
    State(state): State<Arc<TrackingStub>>,
    Path(run_id): Path<String>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let mut runs = state.runs.lock().unwrap();
    let Some(run) = runs.get_mut(&run_id) else {
        return (StatusCode::NOT_FOUND, "no such run").into_response();
    };
    if let Some(status) = body["status"].as_str() {
        run.status = status.to_string();
    }
    if let Some(finished_at) = body["finished_at"].as_str() {
        run.finished_at = Some(finished_at.to_string());
    }
    Json(run_json(&run_id, run)).into_response()
}

pub fn spawn_tracking_stub() -> (String, Arc<TrackingStub>) {
    let state = Arc::new(TrackingStub::default());
    let app = Router::new()
        .route("/api/experiments", post(create_experiment).get(list_experiments))
        .route("/api/experiments/{id}/runs", post(create_run).get(list_runs))
        .route("/api/runs/{id}", get(get_run).patch(update_run))
        .route("/api/runs/{id}/params", post(log_param))
        .route("/api/runs/{id}/metrics", post(log_metric).get(get_metrics))
        .with_state(state.clone());
    (spawn_router(app), state)
}

// ─── Object store stub ───────────────────────────────────────────────────────

#[derive(Default)]
pub struct StoreStub {
    pub objects: Mutex<Vec<StoredObject>>,
}

pub struct StoredObject {
    pub bucket: String,
    pub key: String,
    pub body: Vec<u8>,
    pub authorization: String,
    pub content_sha256: String,
}

impl StoreStub {
    pub fn keys(&self) -> Vec<String> {
        self.objects
            .lock()
            .unwrap()
            .iter()
            .map(|o| o.key.clone())
            .collect()
    }
}

async fn put_object(
    State(state): State<Arc<StoreStub>>,
    Path((bucket, key)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    if bucket == "denied" {
        return (StatusCode::INTERNAL_SERVER_ERROR, "denied").into_response();
    }
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    };
    state.objects.lock().unwrap().push(StoredObject {
        bucket,
        key,
        body: body.to_vec(),
        authorization: header("authorization"),
        content_sha256: header("x-amz-content-sha256"),
    });
    StatusCode::OK.into_response()
}

pub fn spawn_store_stub() -> (String, Arc<StoreStub>) {
    let state = Arc::new(StoreStub::default());
    let app = Router::new()
        .route("/{bucket}/{*key}", put(put_object))
        .with_state(state.clone());
    (spawn_router(app), state)
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn spawn_router(app: Router) -> String {
    let (tx, rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("build test runtime");
        rt.block_on(async move {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                .await
                .expect("bind stub listener");
            tx.send(listener.local_addr().expect("stub addr"))
                .expect("send stub addr");
            axum::serve(listener, app).await.expect("serve stub");
        });
    });
    let addr: SocketAddr = rx.recv().expect("receive stub addr");
    format!("http://{addr}")
}

pub fn test_credentials() -> Credentials {
    Credentials {
        access_key: TEST_ACCESS_KEY.to_string(),
        secret_key: TEST_SECRET_KEY.to_string(),
    }
}

pub fn test_store_config(endpoint: &str) -> StoreConfig {
    StoreConfig {
        endpoint: endpoint.to_string(),
        region: "us-east-1".to_string(),
        credentials: Some(test_credentials()),
    }
}

pub fn test_config(tracking_uri: &str, store_endpoint: &str) -> TrackingConfig {
    TrackingConfig::new(tracking_uri, test_store_config(store_endpoint))
}
