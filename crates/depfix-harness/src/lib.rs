//! Evaluation harness for depfix.
//!
//! Given a dataset of masked repositories and one candidate patch per
//! instance, the harness measures two things per instance:
//!
//! - **exec**: does the candidate patch make the repository's CI test job
//!   pass inside a sandboxed, nested-container-capable runner?
//! - **text**: how does the candidate dependency set compare, textually,
//!   to the oracle's (exact and name-only TP/FP/FN, plus a fake-library
//!   count from public-registry probes)?
//!
//! The [`orchestrator`] drives N [`evaluator`]s concurrently with resume
//! semantics; each evaluator owns a per-instance [`workspace`], applies
//! patches via [`patch`], parses both trees through [`buildfile`], and runs
//! CI through [`sandbox`].

pub mod buildfile;
pub mod dataset;
pub mod diffs;
pub mod evaluator;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod patch;
pub mod sandbox;
pub mod workspace;

pub use buildfile::make_build_file;
pub use dataset::{load_dataset, load_predictions};
pub use diffs::synth_diff;
pub use evaluator::{EvalArgs, EvalResult, Evaluator, ExecStatus};
pub use metrics::{Confusion, TextMetrics};
pub use orchestrator::{RunConfig, run_batch};
pub use patch::{PatchError, apply_patch};
pub use sandbox::{CiOutcome, SandboxError, SandboxRunner};
pub use workspace::CacheLevel;
