//! Experiment tracking sinks.
//!
//! A run collects hyperparameters, scalar metrics and artifact files. Runs go
//! either to an MLflow tracking server over its REST API or to a local
//! directory laid out one folder per run.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Lifecycle state of a run, named as MLflow names them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunStatus {
    Running,
    Finished,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "RUNNING",
            RunStatus::Finished => "FINISHED",
            RunStatus::Failed => "FAILED",
        }
    }
}

/// Sink for one run at a time.
pub trait Tracker {
    /// Open a run and return its id.
    fn start_run(&mut self, run_name: &str) -> Result<String>;
    fn log_params(&mut self, params: &[(String, String)]) -> Result<()>;
    fn log_metric(&mut self, key: &str, value: f64) -> Result<()>;
    /// Store `local_path` under `artifact_path` in the run.
    fn log_artifact(&mut self, artifact_path: &str, local_path: &Path) -> Result<()>;
    fn end_run(&mut self, status: RunStatus) -> Result<()>;
}

fn no_active_run() -> Error {
    Error::Tracking("no active run".to_string())
}

fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| Error::Tracking(format!("{} has no file name", path.display())))
}

/// Pick a sink from a tracking URI: `http(s)://` for a server, anything else
/// (optionally `file://`-prefixed) is a local directory.
pub fn tracker_from_uri(uri: &str, experiment_id: &str) -> Result<Box<dyn Tracker>> {
    if uri.starts_with("http://") || uri.starts_with("https://") {
        Ok(Box::new(MlflowTracker::new(uri, experiment_id)?))
    } else {
        let root = uri.strip_prefix("file://").or_else(|| uri.strip_prefix("file:"));
        Ok(Box::new(FileTracker::new(root.unwrap_or(uri), experiment_id)))
    }
}

#[derive(Deserialize)]
struct CreateRunResponse {
    run: MlflowRun,
}

#[derive(Deserialize)]
struct MlflowRun {
    info: MlflowRunInfo,
}

#[derive(Deserialize)]
struct MlflowRunInfo {
    run_id: String,
}

/// Client for an MLflow tracking server (REST API 2.0).
///
/// Artifacts are uploaded through the server's artifact proxy, so the server
/// must run with artifact serving enabled.
pub struct MlflowTracker {
    client: Client,
    base_url: String,
    experiment_id: String,
    run_id: Option<String>,
}

impl MlflowTracker {
    pub fn new(base_url: &str, experiment_id: &str) -> Result<Self> {
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            experiment_id: experiment_id.to_string(),
            run_id: None,
        })
    }

    fn post(&self, endpoint: &str, body: serde_json::Value) -> Result<reqwest::blocking::Response> {
        let url = format!("{}/api/2.0/mlflow/{}", self.base_url, endpoint);
        debug!("POST {}", url);
        Ok(self.client.post(url).json(&body).send()?.error_for_status()?)
    }

    fn run_id(&self) -> Result<&str> {
        self.run_id.as_deref().ok_or_else(no_active_run)
    }
}

impl Tracker for MlflowTracker {
    fn start_run(&mut self, run_name: &str) -> Result<String> {
        let response: CreateRunResponse = self
            .post(
                "runs/create",
                json!({
                    "experiment_id": self.experiment_id,
                    "run_name": run_name,
                    "start_time": Utc::now().timestamp_millis(),
                }),
            )?
            .json()?;
        let run_id = response.run.info.run_id;
        info!("Started MLflow run {} at {}", run_id, self.base_url);
        self.run_id = Some(run_id.clone());
        Ok(run_id)
    }

    fn log_params(&mut self, params: &[(String, String)]) -> Result<()> {
        let params: Vec<_> = params
            .iter()
            .map(|(key, value)| json!({ "key": key, "value": value }))
            .collect();
        self.post(
            "runs/log-batch",
            json!({ "run_id": self.run_id()?, "params": params }),
        )?;
        Ok(())
    }

    fn log_metric(&mut self, key: &str, value: f64) -> Result<()> {
        self.post(
            "runs/log-metric",
            json!({
                "run_id": self.run_id()?,
                "key": key,
                "value": value,
                "timestamp": Utc::now().timestamp_millis(),
                "step": 0,
            }),
        )?;
        Ok(())
    }

    fn log_artifact(&mut self, artifact_path: &str, local_path: &Path) -> Result<()> {
        let bytes = std::fs::read(local_path).map_err(|e| Error::io(local_path, e))?;
        let url = format!(
            "{}/api/2.0/mlflow-artifacts/artifacts/{}/{}/artifacts/{}/{}",
            self.base_url,
            self.experiment_id,
            self.run_id()?,
            artifact_path,
            file_name(local_path)?
        );
        debug!("PUT {}", url);
        self.client.put(url).body(bytes).send()?.error_for_status()?;
        Ok(())
    }

    fn end_run(&mut self, status: RunStatus) -> Result<()> {
        self.post(
            "runs/update",
            json!({
                "run_id": self.run_id()?,
                "status": status.as_str(),
                "end_time": Utc::now().timestamp_millis(),
            }),
        )?;
        self.run_id = None;
        Ok(())
    }
}

/// Run metadata written to `run.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub run_name: String,
    pub experiment_id: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

/// One line of `metrics.jsonl`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub key: String,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
    pub step: u64,
}

/// Directory-backed store: `<root>/<experiment>/<run_id>/`.
pub struct FileTracker {
    root: PathBuf,
    experiment_id: String,
    active: Option<RunRecord>,
}

impl FileTracker {
    pub fn new<P: Into<PathBuf>>(root: P, experiment_id: &str) -> Self {
        Self {
            root: root.into(),
            experiment_id: experiment_id.to_string(),
            active: None,
        }
    }

    /// Directory of the active run.
    pub fn run_dir(&self) -> Result<PathBuf> {
        let run = self.active.as_ref().ok_or_else(no_active_run)?;
        Ok(self.root.join(&self.experiment_id).join(&run.run_id))
    }

    fn write_json<T: Serialize>(&self, file: &str, value: &T) -> Result<()> {
        let path = self.run_dir()?.join(file);
        let json = serde_json::to_string_pretty(value)?;
        std::fs::write(&path, json).map_err(|e| Error::io(&path, e))
    }
}

impl Tracker for FileTracker {
    fn start_run(&mut self, run_name: &str) -> Result<String> {
        let started_at = Utc::now();
        let run = RunRecord {
            run_id: started_at.format("%Y%m%d%H%M%S%f").to_string(),
            run_name: run_name.to_string(),
            experiment_id: self.experiment_id.clone(),
            status: RunStatus::Running,
            started_at,
            ended_at: None,
        };
        let run_id = run.run_id.clone();
        self.active = Some(run);

        let dir = self.run_dir()?;
        std::fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;
        self.write_json("run.json", &self.active)?;
        info!("Started local run {} in {}", run_id, dir.display());
        Ok(run_id)
    }

    fn log_params(&mut self, params: &[(String, String)]) -> Result<()> {
        let map: serde_json::Map<_, _> = params
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect();
        self.write_json("params.json", &map)
    }

    fn log_metric(&mut self, key: &str, value: f64) -> Result<()> {
        let record = MetricRecord {
            key: key.to_string(),
            value,
            timestamp: Utc::now(),
            step: 0,
        };
        let path = self.run_dir()?.join("metrics.jsonl");
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| Error::io(&path, e))?;
        writeln!(file, "{}", serde_json::to_string(&record)?).map_err(|e| Error::io(&path, e))
    }

    fn log_artifact(&mut self, artifact_path: &str, local_path: &Path) -> Result<()> {
        let dir = self.run_dir()?.join("artifacts").join(artifact_path);
        std::fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;
        let target = dir.join(file_name(local_path)?);
        std::fs::copy(local_path, &target).map_err(|e| Error::io(local_path, e))?;
        Ok(())
    }

    fn end_run(&mut self, status: RunStatus) -> Result<()> {
        let run = self.active.as_mut().ok_or_else(no_active_run)?;
        run.status = status;
        run.ended_at = Some(Utc::now());
        self.write_json("run.json", &self.active)?;
        self.active = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_tracker_run_layout() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = FileTracker::new(dir.path(), "0");

        tracker.start_run("PricePredictionModel").unwrap();
        let run_dir = tracker.run_dir().unwrap();
        tracker
            .log_params(&[("max_depth".to_string(), "5".to_string())])
            .unwrap();
        tracker.log_metric("mae", 2.5).unwrap();
        tracker.log_metric("rmse", 3.5).unwrap();

        let model = dir.path().join("model.bin");
        std::fs::write(&model, b"booster").unwrap();
        tracker.log_artifact("xgboost_model", &model).unwrap();
        tracker.end_run(RunStatus::Finished).unwrap();

        let params: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(run_dir.join("params.json")).unwrap())
                .unwrap();
        assert_eq!(params["max_depth"], "5");

        let metrics = std::fs::read_to_string(run_dir.join("metrics.jsonl")).unwrap();
        let records: Vec<MetricRecord> = metrics
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].key, "mae");

        let run: RunRecord =
            serde_json::from_str(&std::fs::read_to_string(run_dir.join("run.json")).unwrap())
                .unwrap();
        assert_eq!(run.status, RunStatus::Finished);
        assert!(run.ended_at.is_some());

        assert!(run_dir.join("artifacts/xgboost_model/model.bin").exists());
    }

    #[test]
    fn test_mlflow_tracker_endpoints() {
        use mockito::Matcher;

        let mut server = mockito::Server::new();
        let create = server
            .mock("POST", "/api/2.0/mlflow/runs/create")
            .match_body(Matcher::AllOf(vec![
                Matcher::PartialJson(json!({
                    "experiment_id": "3",
                    "run_name": "PricePredictionModel",
                })),
                Matcher::Regex(r#""start_time":\d+"#.to_string()),
            ]))
            .with_header("content-type", "application/json")
            .with_body(r#"{"run":{"info":{"run_id":"abc123","status":"RUNNING"}}}"#)
            .create();
        let params = server
            .mock("POST", "/api/2.0/mlflow/runs/log-batch")
            .match_body(Matcher::Json(json!({
                "run_id": "abc123",
                "params": [
                    { "key": "max_depth", "value": "5" },
                    { "key": "alpha", "value": "0.1" },
                ],
            })))
            .with_body("{}")
            .create();
        let metric = server
            .mock("POST", "/api/2.0/mlflow/runs/log-metric")
            .match_body(Matcher::PartialJson(json!({
                "run_id": "abc123",
                "key": "rmse",
                "value": 2.5,
                "step": 0,
            })))
            .with_body("{}")
            .create();
        let artifact = server
            .mock(
                "PUT",
                "/api/2.0/mlflow-artifacts/artifacts/3/abc123/artifacts/xgboost_model/model.bin",
            )
            .match_body("booster")
            .with_body("{}")
            .create();
        let update = server
            .mock("POST", "/api/2.0/mlflow/runs/update")
            .match_body(Matcher::AllOf(vec![
                Matcher::PartialJson(json!({ "run_id": "abc123", "status": "FINISHED" })),
                Matcher::Regex(r#""end_time":\d+"#.to_string()),
            ]))
            .with_body("{}")
            .create();

        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("model.bin");
        std::fs::write(&model, b"booster").unwrap();

        let mut tracker = MlflowTracker::new(&format!("{}/", server.url()), "3").unwrap();
        assert_eq!(tracker.start_run("PricePredictionModel").unwrap(), "abc123");
        tracker
            .log_params(&[
                ("max_depth".to_string(), "5".to_string()),
                ("alpha".to_string(), "0.1".to_string()),
            ])
            .unwrap();
        tracker.log_metric("rmse", 2.5).unwrap();
        tracker.log_artifact("xgboost_model", &model).unwrap();
        tracker.end_run(RunStatus::Finished).unwrap();

        create.assert();
        params.assert();
        metric.assert();
        artifact.assert();
        update.assert();

        assert!(matches!(
            tracker.log_metric("mae", 1.0).unwrap_err(),
            Error::Tracking(_)
        ));
    }

    #[test]
    fn test_mlflow_tracker_requires_run() {
        let server = mockito::Server::new();
        let mut tracker = MlflowTracker::new(&server.url(), "0").unwrap();
        assert!(matches!(
            tracker.log_metric("mae", 1.0).unwrap_err(),
            Error::Tracking(_)
        ));
        assert!(matches!(
            tracker.end_run(RunStatus::Finished).unwrap_err(),
            Error::Tracking(_)
        ));
    }

    #[test]
    fn test_logging_without_run_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = FileTracker::new(dir.path(), "0");
        assert!(matches!(
            tracker.log_metric("mae", 1.0).unwrap_err(),
            Error::Tracking(_)
        ));
    }

    #[test]
    fn test_run_status_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&RunStatus::Finished).unwrap(), "\"FINISHED\"");
        assert_eq!(RunStatus::Failed.as_str(), "FAILED");
    }

    #[test]
    fn test_tracker_from_uri_local_path() {
        let dir = tempfile::tempdir().unwrap();
        let uri = format!("file://{}", dir.path().display());
        let mut tracker = tracker_from_uri(&uri, "7").unwrap();
        let run_id = tracker.start_run("r").unwrap();
        tracker.end_run(RunStatus::Finished).unwrap();
        assert!(dir.path().join("7").join(run_id).join("run.json").exists());
    }
}
