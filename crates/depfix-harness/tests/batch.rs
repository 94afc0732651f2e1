//! Batch-level behaviour: aggregate output, failure isolation, backups.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::process::Command;

use depfix_core::{Language, RegistryEndpoints, RepoInstance};
use depfix_harness::orchestrator::{RunConfig, run_batch};
use depfix_harness::workspace::CacheLevel;

fn git(dir: &Path, args: &[&str]) {
    let out = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("git invocation");
    assert!(out.status.success(), "git {args:?} failed: {out:?}");
}

fn masked_repo(dir: &Path, file: &str, content: &str) {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(dir.join(file), content).unwrap();
    git(dir, &["init", "-q"]);
    git(dir, &["config", "user.email", "eval@localhost"]);
    git(dir, &["config", "user.name", "eval"]);
    git(dir, &["add", "-A"]);
    git(dir, &["commit", "-qm", "init instance"]);
}

fn instance(id: &str, patch: String) -> RepoInstance {
    RepoInstance {
        instance_id: id.to_string(),
        language: Language::Python,
        metadata: serde_json::Value::Null,
        act_command: "act -j test".to_string(),
        ci_file: ".github/workflows/ci.yml".to_string(),
        patch,
        build_files: vec!["requirements.txt".to_string()],
        env_specs: BTreeMap::from([
            ("SDK".to_string(), "3.11".to_string()),
            ("OS".to_string(), "ubuntu-22.04".to_string()),
        ]),
    }
}

async fn oracle_diff() -> String {
    let mut edits = depfix_harness::diffs::FileEdits::new();
    edits.insert(
        "requirements.txt".to_string(),
        ("\n".to_string(), "requests\n".to_string()),
    );
    depfix_harness::diffs::synth_diff(&edits).await.unwrap()
}

#[tokio::test]
async fn batch_writes_one_result_line_per_instance() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", mockito::Matcher::Regex(r"^/pypi/.+/json$".to_string()))
        .with_status(200)
        .with_body("{}")
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let repos = dir.path().join("repos");
    let diff = oracle_diff().await;

    let mut dataset = Vec::new();
    let mut predictions = HashMap::new();
    for id in ["batch-a", "batch-b"] {
        masked_repo(&repos.join(id), "requirements.txt", "\n");
        dataset.push(instance(id, diff.clone()));
        predictions.insert(id.to_string(), diff.clone());
    }
    // one instance whose candidate patch is garbage: isolated, not fatal
    masked_repo(&repos.join("batch-broken"), "requirements.txt", "\n");
    dataset.push(instance("batch-broken", diff.clone()));
    predictions.insert(
        "batch-broken".to_string(),
        "diff --git a/x b/x\n--- a/x\n+++ b/x\n@@ -9 +9 @@\n-missing\n+broken\n".to_string(),
    );

    let workspace = dir.path().join("eval");
    let results = run_batch(
        dataset,
        predictions,
        workspace.clone(),
        repos,
        RunConfig {
            concurrency: 2,
            exec_eval: false,
            cache_level: CacheLevel::All,
            endpoints: RegistryEndpoints {
                pypi: server.url(),
                ..RegistryEndpoints::default()
            },
            ..RunConfig::default()
        },
    )
    .await
    .unwrap();

    assert_eq!(results.len(), 3);

    let aggregate = std::fs::read_to_string(workspace.join("results.jsonl")).unwrap();
    let lines: Vec<&str> = aggregate.lines().collect();
    assert_eq!(lines.len(), 3);
    for line in lines {
        let value: serde_json::Value = serde_json::from_str(line).unwrap();
        assert!(value["instance_id"].is_string());
    }

    let broken = results
        .iter()
        .find(|r| r.instance_id == "batch-broken")
        .unwrap();
    let text = broken.text.expect("text metrics for broken candidate");
    assert_eq!(text.name_only.fn_, 1);
    assert_eq!(text.name_only.tp, 0);

    let good = results.iter().find(|r| r.instance_id == "batch-a").unwrap();
    assert_eq!(good.text.unwrap().name_only.tp, 1);
}

#[tokio::test]
async fn non_resume_backs_up_prior_workspace() {
    let dir = tempfile::tempdir().unwrap();
    let workspace = dir.path().join("eval");
    std::fs::create_dir_all(workspace.join("stale-instance")).unwrap();

    run_batch(
        Vec::new(),
        HashMap::new(),
        workspace.clone(),
        dir.path().join("repos"),
        RunConfig {
            exec_eval: false,
            ..RunConfig::default()
        },
    )
    .await
    .unwrap();

    assert!(dir.path().join("eval-bak/stale-instance").exists());
    assert!(workspace.join("results.jsonl").exists());
}
