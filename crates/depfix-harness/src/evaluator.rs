//! Per-instance evaluation.
//!
//! One [`Evaluator`] owns one workspace and runs the full pipeline for a
//! single instance: stage the oracle tree and apply the oracle patch, stage
//! the model tree and apply the candidate patch, parse dependencies on both
//! sides, compute textual metrics, optionally run CI in the sandbox, and
//! persist `result.json`.
//!
//! Error policy follows a strict asymmetry: the oracle side must be
//! well-formed (dataset construction guarantees it), so oracle failures
//! abort the instance with a logged error and a null result. The model
//! side degrades: any copy, patch or parse failure means the candidate
//! contributed nothing, i.e. empty dependencies for every build file and a
//! failed exec verdict.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use depfix_core::{BuildFile, CoreError, DependencyMap, RegistryEndpoints, RepoInstance};

use crate::buildfile::make_build_file;
use crate::logging::InstanceLog;
use crate::metrics::{TextMetrics, compare_file};
use crate::patch::{PatchError, apply_patch};
use crate::sandbox::SandboxRunner;
use crate::workspace::{CacheLevel, apply_cache_level, copy_tree};

const EVAL_LOG: &str = "evaluate.log";
const EVAL_RESULT: &str = "result.json";
const EXEC_OUTPUT_LOG: &str = "exec-output.log";

/// Verdict of the sandboxed CI run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecStatus {
    Pass,
    Fail,
}

/// Per-file dependency names on both sides, for inspection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Detail {
    pub oracle: BTreeMap<String, Vec<String>>,
    pub predicted: BTreeMap<String, Vec<String>>,
}

/// The persisted per-instance result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalResult {
    pub instance_id: String,
    pub text: Option<TextMetrics>,
    pub exec: Option<ExecStatus>,
    pub detail: Option<Detail>,
}

impl EvalResult {
    fn empty(instance_id: &str) -> Self {
        Self {
            instance_id: instance_id.to_string(),
            text: None,
            exec: None,
            detail: None,
        }
    }
}

/// Everything one evaluation needs, fixed up front.
pub struct EvalArgs {
    pub instance: RepoInstance,
    /// The masked repository snapshot this instance evaluates against.
    pub project_root: PathBuf,
    /// The candidate unified diff.
    pub prediction: String,
    pub workspace: PathBuf,
    pub text_eval: bool,
    pub exec_eval: bool,
    pub cache_level: CacheLevel,
    pub timeout_secs: u64,
    pub resume: bool,
    pub endpoints: RegistryEndpoints,
    pub runner: SandboxRunner,
}

#[derive(Error, Debug)]
enum EvalError {
    #[error("oracle patch failed: {0}")]
    OraclePatch(#[source] PatchError),

    #[error("oracle parse failed: {0}")]
    OracleParse(#[source] CoreError),

    #[error("parser contract violation: {0}")]
    Contract(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// What the model side contributed, after degradation.
struct ModelSide {
    deps: DependencyMap,
    /// Build-file view over the staged model tree, present only when
    /// staging succeeded (used for fake-library probes).
    build: Option<Box<dyn BuildFile>>,
    patched: bool,
}

/// Evaluates one instance inside its workspace.
pub struct Evaluator {
    args: EvalArgs,
    log: InstanceLog,
}

impl Evaluator {
    /// Creates the workspace directory and opens the per-instance log.
    pub fn new(args: EvalArgs) -> std::io::Result<Self> {
        std::fs::create_dir_all(&args.workspace)?;
        let log = InstanceLog::create(&args.instance.instance_id, &args.workspace.join(EVAL_LOG))?;
        Ok(Self { args, log })
    }

    /// Runs the evaluation to completion.
    ///
    /// Never fails: internal errors are logged and surface as a result
    /// with null sections. The cache policy is applied on every path.
    pub async fn run(self) -> EvalResult {
        let instance_id = self.args.instance.instance_id.clone();

        let cached = self.load_cached_result();
        if self.args.resume
            && let Some(cached) = &cached
            && self.cached_is_complete(cached)
        {
            self.log.info("resume: cached result covers all requested sections");
            return cached.clone();
        }

        let result = match self.evaluate(cached).await {
            Ok(result) => result,
            Err(err) => {
                self.log.error(format!("evaluation aborted: {err}"));
                EvalResult::empty(&instance_id)
            }
        };

        if let Err(err) = self.write_result(&result) {
            self.log.error(format!("failed to write result.json: {err}"));
        }
        if let Err(err) = apply_cache_level(&self.args.workspace, self.args.cache_level) {
            self.log.error(format!("failed to apply cache policy: {err}"));
        }
        result
    }

    fn cached_is_complete(&self, cached: &EvalResult) -> bool {
        let text_done = !self.args.text_eval || cached.text.is_some();
        let exec_done = !self.args.exec_eval
            || (cached.exec.is_some() && self.args.workspace.join(EXEC_OUTPUT_LOG).exists());
        text_done && exec_done
    }

    fn load_cached_result(&self) -> Option<EvalResult> {
        let path = self.args.workspace.join(EVAL_RESULT);
        let content = std::fs::read_to_string(path).ok()?;
        let result: EvalResult = match serde_json::from_str(&content) {
            Ok(result) => result,
            Err(err) => {
                self.log.warn(format!("ignoring unreadable cached result: {err}"));
                return None;
            }
        };
        if result.instance_id != self.args.instance.instance_id {
            self.log.warn(format!(
                "ignoring cached result for different instance: {}",
                result.instance_id
            ));
            return None;
        }
        Some(result)
    }

    async fn evaluate(&self, cached: Option<EvalResult>) -> Result<EvalResult, EvalError> {
        let instance = &self.args.instance;

        let (oracle_deps, _oracle_build) = self.stage_oracle().await?;
        let model = self.stage_model().await;

        let mut detail = Detail::default();
        for (file, deps) in &oracle_deps {
            detail
                .oracle
                .insert(file.clone(), deps.iter().map(|d| d.name().to_string()).collect());
        }
        for (file, deps) in &model.deps {
            detail
                .predicted
                .insert(file.clone(), deps.iter().map(|d| d.name().to_string()).collect());
        }

        let resume = self.args.resume;
        let cached_text = cached.as_ref().and_then(|c| c.text);
        let cached_exec = cached.as_ref().and_then(|c| c.exec);

        let text = if self.args.text_eval {
            if resume && cached_text.is_some() {
                self.log.info("resume: reusing cached text metrics");
                cached_text
            } else {
                Some(self.text_eval(&oracle_deps, &model).await)
            }
        } else {
            None
        };

        let exec = if self.args.exec_eval {
            let reusable = resume
                && cached_exec.is_some()
                && self.args.workspace.join(EXEC_OUTPUT_LOG).exists();
            if reusable {
                self.log.info("resume: reusing cached exec verdict");
                cached_exec
            } else {
                Some(self.exec_eval(&model).await)
            }
        } else {
            None
        };

        Ok(EvalResult {
            instance_id: instance.instance_id.clone(),
            text,
            exec,
            detail: Some(detail),
        })
    }

    /// Stages `workspace/oracle/` and parses the oracle dependency set.
    async fn stage_oracle(&self) -> Result<(DependencyMap, Box<dyn BuildFile>), EvalError> {
        let instance = &self.args.instance;
        let oracle_root = self.args.workspace.join("oracle");
        if oracle_root.exists() {
            std::fs::remove_dir_all(&oracle_root)?;
        }
        copy_tree(&self.args.project_root, &oracle_root)?;

        let patch_file = oracle_root.join(random_patch_name());
        std::fs::write(&patch_file, &instance.patch)?;
        apply_patch(&oracle_root, &patch_file, &self.log)
            .await
            .map_err(EvalError::OraclePatch)?;

        let build = make_build_file(
            instance.language,
            &oracle_root,
            &instance.build_files,
            self.args.endpoints.clone(),
        )
        .map_err(EvalError::OracleParse)?;
        let deps = build
            .parse_dependencies()
            .map_err(EvalError::OracleParse)?;

        let expected: std::collections::BTreeSet<&str> =
            instance.build_files.iter().map(String::as_str).collect();
        let actual: std::collections::BTreeSet<&str> =
            deps.keys().map(String::as_str).collect();
        if expected != actual {
            return Err(EvalError::Contract(format!(
                "oracle parse keys {actual:?} != build files {expected:?}"
            )));
        }

        Ok((deps, build))
    }

    /// Stages `workspace/model/`. Every failure degrades to an empty
    /// dependency set for each declared build file.
    async fn stage_model(&self) -> ModelSide {
        let empty = || {
            let deps = self
                .args
                .instance
                .build_files
                .iter()
                .map(|f| (f.clone(), Vec::new()))
                .collect();
            ModelSide {
                deps,
                build: None,
                patched: false,
            }
        };

        match self.try_stage_model().await {
            Ok(side) => side,
            Err(err) => {
                self.log
                    .warn(format!("candidate patch contributed nothing: {err}"));
                empty()
            }
        }
    }

    async fn try_stage_model(&self) -> Result<ModelSide, Box<dyn std::error::Error + Send + Sync>> {
        let instance = &self.args.instance;
        let model_root = self.args.workspace.join("model");
        if model_root.exists() {
            std::fs::remove_dir_all(&model_root)?;
        }
        copy_tree(&self.args.project_root, &model_root)?;

        let patch_file = model_root.join(random_patch_name());
        std::fs::write(&patch_file, &self.args.prediction)?;
        apply_patch(&model_root, &patch_file, &self.log).await?;

        let build = make_build_file(
            instance.language,
            &model_root,
            &instance.build_files,
            self.args.endpoints.clone(),
        )?;
        let mut deps = build.parse_dependencies()?;
        for file in &instance.build_files {
            deps.entry(file.clone()).or_default();
        }

        Ok(ModelSide {
            deps,
            build: Some(build),
            patched: true,
        })
    }

    /// Sums per-file confusion counts and probes predicted names against
    /// the registry.
    async fn text_eval(&self, oracle_deps: &DependencyMap, model: &ModelSide) -> TextMetrics {
        let mut metrics = TextMetrics::default();
        for (file, oracle_file_deps) in oracle_deps {
            let model_file_deps = model.deps.get(file).map_or(&[][..], Vec::as_slice);
            let (exact, name_only) = compare_file(model_file_deps, oracle_file_deps);
            metrics.exact.add(exact);
            metrics.name_only.add(name_only);

            if let Some(build) = &model.build {
                for dep in model_file_deps {
                    if build.is_fake_lib(file, dep).await {
                        self.log
                            .warn(format!("predicted fake library in {file}: {}", dep.name()));
                        metrics.fake_libs += 1;
                    }
                }
            }
        }
        self.log.info(format!(
            "text metrics: exact TP={} FP={} FN={}, name-only TP={} FP={} FN={}, fake libs {}",
            metrics.exact.tp,
            metrics.exact.fp,
            metrics.exact.fn_,
            metrics.name_only.tp,
            metrics.name_only.fp,
            metrics.name_only.fn_,
            metrics.fake_libs
        ));
        metrics
    }

    /// Runs CI on the staged model tree. A candidate whose patch never
    /// applied fails without launching a container.
    async fn exec_eval(&self, model: &ModelSide) -> ExecStatus {
        if !model.patched {
            self.log.error("exec evaluation failed: candidate patch did not apply");
            return ExecStatus::Fail;
        }

        let instance = &self.args.instance;
        let model_root = self.args.workspace.join("model");
        let output_file = self.args.workspace.join(EXEC_OUTPUT_LOG);

        let outcome = self
            .args
            .runner
            .run_ci(
                &instance.instance_id,
                &model_root,
                &instance.act_command,
                self.args.timeout_secs,
                &output_file,
                &self.log,
            )
            .await;

        match outcome {
            Ok(outcome) if outcome.passed => ExecStatus::Pass,
            Ok(_) => ExecStatus::Fail,
            Err(err) => {
                self.log.error(format!("sandbox error: {err}"));
                ExecStatus::Fail
            }
        }
    }

    fn write_result(&self, result: &EvalResult) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(result).map_err(std::io::Error::other)?;
        std::fs::write(self.args.workspace.join(EVAL_RESULT), json)
    }
}

fn random_patch_name() -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("patch-{}.diff", &suffix[..4])
}
