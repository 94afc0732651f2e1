//! Batch orchestration.
//!
//! Drives N evaluations concurrently over a bounded worker pool. Workers
//! are fully independent (each owns its workspace) and a failure in one
//! never aborts the batch. The orchestrator is the single writer of the
//! aggregate `results.jsonl`, appending one line per instance in
//! completion order while a progress bar tracks the running pass count.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::{Semaphore, mpsc};

use depfix_core::{RegistryEndpoints, RepoInstance};

use crate::evaluator::{EvalArgs, EvalResult, Evaluator, ExecStatus};
use crate::sandbox::SandboxRunner;
use crate::workspace::{CacheLevel, backup_existing};

/// Batch-level configuration.
#[derive(Clone)]
pub struct RunConfig {
    pub concurrency: usize,
    pub text_eval: bool,
    pub exec_eval: bool,
    pub cache_level: CacheLevel,
    pub timeout_secs: u64,
    pub resume: bool,
    pub runner_image: String,
    pub endpoints: RegistryEndpoints,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            concurrency: 10,
            text_eval: true,
            exec_eval: true,
            cache_level: CacheLevel::All,
            timeout_secs: 1200,
            resume: false,
            runner_image: crate::sandbox::DEFAULT_RUNNER_IMAGE.to_string(),
            endpoints: RegistryEndpoints::default(),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum OrchestratorError {
    #[error("failed to prepare workspace root {path}: {source}")]
    Workspace {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write aggregate results {path}: {source}")]
    Aggregate {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

fn prepare_workspace_root(root: &Path, resume: bool) -> Result<(), OrchestratorError> {
    let wrap = |source| OrchestratorError::Workspace {
        path: root.display().to_string(),
        source,
    };
    if root.exists() {
        let has_entries = std::fs::read_dir(root).map_err(wrap)?.next().is_some();
        if has_entries && !resume {
            // Prior run present: move it aside instead of overwriting.
            backup_existing(root).map_err(wrap)?;
        }
    }
    std::fs::create_dir_all(root).map_err(wrap)?;
    Ok(())
}

/// Evaluates every instance and streams results to
/// `<workspace_root>/results.jsonl`.
///
/// Returns the per-instance results in completion order. Only
/// orchestrator-scope failures (unwritable workspace or aggregate file)
/// are errors; per-instance failures are embedded in their results.
pub async fn run_batch(
    dataset: Vec<RepoInstance>,
    predictions: HashMap<String, String>,
    workspace_root: PathBuf,
    repos_root: PathBuf,
    config: RunConfig,
) -> Result<Vec<EvalResult>, OrchestratorError> {
    prepare_workspace_root(&workspace_root, config.resume)?;

    let aggregate_path = workspace_root.join("results.jsonl");
    let wrap_aggregate = |source| OrchestratorError::Aggregate {
        path: aggregate_path.display().to_string(),
        source,
    };
    backup_existing(&aggregate_path).map_err(wrap_aggregate)?;
    let mut aggregate = std::fs::File::create(&aggregate_path).map_err(wrap_aggregate)?;

    let total = dataset.len() as u64;
    let progress = ProgressBar::new(total);
    progress.set_style(
        ProgressStyle::with_template(
            "{msg} [{bar:40}] {pos}/{len} ({elapsed_precise})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    progress.set_message("passed 0");

    let runner = SandboxRunner::new(config.runner_image.clone());
    let semaphore = Arc::new(Semaphore::new(config.concurrency.max(1)));
    let (tx, mut rx) = mpsc::unbounded_channel::<EvalResult>();

    let mut handles = Vec::new();
    for instance in dataset {
        let Some(prediction) = predictions.get(&instance.instance_id).cloned() else {
            continue;
        };
        let args = EvalArgs {
            project_root: repos_root.join(&instance.instance_id),
            prediction,
            workspace: workspace_root.join(&instance.instance_id),
            text_eval: config.text_eval,
            exec_eval: config.exec_eval,
            cache_level: config.cache_level,
            timeout_secs: config.timeout_secs,
            resume: config.resume,
            endpoints: config.endpoints.clone(),
            runner: runner.clone(),
            instance,
        };
        let semaphore = Arc::clone(&semaphore);
        let tx = tx.clone();
        handles.push(tokio::spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .expect("worker pool semaphore closed");
            let instance_id = args.instance.instance_id.clone();
            let result = match Evaluator::new(args) {
                Ok(evaluator) => evaluator.run().await,
                Err(err) => {
                    tracing::error!(instance = %instance_id, %err, "failed to open workspace");
                    EvalResult {
                        instance_id,
                        text: None,
                        exec: None,
                        detail: None,
                    }
                }
            };
            // The receiver only drops on orchestrator teardown.
            let _ = tx.send(result);
        }));
    }
    drop(tx);

    let mut results = Vec::new();
    let mut passed = 0u64;
    while let Some(result) = rx.recv().await {
        if result.exec == Some(ExecStatus::Pass) {
            passed += 1;
        }
        let line = serde_json::to_string(&result).map_err(|e| {
            wrap_aggregate(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;
        writeln!(aggregate, "{line}").map_err(wrap_aggregate)?;
        results.push(result);
        progress.set_message(format!("passed {passed}"));
        progress.inc(1);
    }
    progress.finish_with_message(format!("passed {passed}/{total}"));

    for handle in handles {
        if let Err(err) = handle.await {
            tracing::error!(%err, "evaluation task panicked");
        }
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_backs_up_non_resume() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("eval");
        std::fs::create_dir_all(root.join("old-instance")).unwrap();

        prepare_workspace_root(&root, false).unwrap();
        assert!(dir.path().join("eval-bak/old-instance").exists());
        assert!(root.exists());
    }

    #[test]
    fn test_prepare_keeps_workspace_on_resume() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("eval");
        std::fs::create_dir_all(root.join("old-instance")).unwrap();

        prepare_workspace_root(&root, true).unwrap();
        assert!(root.join("old-instance").exists());
        assert!(!dir.path().join("eval-bak").exists());
    }

    #[tokio::test]
    async fn test_empty_batch_writes_empty_aggregate() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("eval");
        let results = run_batch(
            Vec::new(),
            HashMap::new(),
            root.clone(),
            dir.path().join("repos"),
            RunConfig {
                exec_eval: false,
                ..RunConfig::default()
            },
        )
        .await
        .unwrap();
        assert!(results.is_empty());
        assert_eq!(
            std::fs::read_to_string(root.join("results.jsonl")).unwrap(),
            ""
        );
    }

    #[tokio::test]
    async fn test_prior_aggregate_backed_up() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("eval");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join("results.jsonl"), "old\n").unwrap();

        run_batch(
            Vec::new(),
            HashMap::new(),
            root.clone(),
            dir.path().join("repos"),
            RunConfig {
                resume: true,
                exec_eval: false,
                ..RunConfig::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(
            std::fs::read_to_string(root.join("results.jsonl-bak")).unwrap(),
            "old\n"
        );
    }
}
