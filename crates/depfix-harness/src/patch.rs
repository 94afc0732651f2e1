//! Robust unified-diff application.
//!
//! Candidate patches come from model output and are often slightly off on
//! whitespace or context, so application is two-staged: a strict
//! `git apply` with whitespace-insensitive options, then a fuzzy Unix
//! `patch` fallback. On success the result is committed so subsequent
//! tooling sees a clean working tree.

use std::path::Path;

use thiserror::Error;
use tokio::process::Command;

use crate::logging::InstanceLog;

/// Both application strategies failed, or the follow-up commit did.
#[derive(Error, Debug)]
pub enum PatchError {
    #[error("patch failed to apply:\n{stderr}")]
    Apply { stderr: String },

    #[error("git commit failed:\n{output}")]
    Commit { output: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

async fn run(testbed: &Path, program: &str, args: &[&str]) -> std::io::Result<std::process::Output> {
    Command::new(program)
        .args(args)
        .current_dir(testbed)
        .output()
        .await
}

/// Applies a unified diff inside `testbed` and commits the result.
///
/// `patch_file` must live inside `testbed`. Strategy:
///
/// 1. `git apply --allow-empty -v --ignore-whitespace --ignore-space-change`
/// 2. fallback: `patch --batch --fuzz=5 -p1 -i <file>`
/// 3. `git commit -am "fix build"` (a no-op diff commits nothing and is
///    not an error)
pub async fn apply_patch(
    testbed: &Path,
    patch_file: &Path,
    log: &InstanceLog,
) -> Result<(), PatchError> {
    let rel = patch_file
        .strip_prefix(testbed)
        .unwrap_or(patch_file)
        .to_string_lossy()
        .into_owned();

    let strict = run(
        testbed,
        "git",
        &[
            "apply",
            "--allow-empty",
            "-v",
            "--ignore-whitespace",
            "--ignore-space-change",
            &rel,
        ],
    )
    .await?;

    if !strict.status.success() {
        log.info("strict git apply failed, retrying with fuzzy patch");
        log.info(format!(
            "git apply error: {}",
            String::from_utf8_lossy(&strict.stderr)
        ));

        let fuzzy = run(
            testbed,
            "patch",
            &["--batch", "--fuzz=5", "-p1", "-i", &rel],
        )
        .await?;
        if !fuzzy.status.success() {
            let stderr = format!(
                "{}\n{}",
                String::from_utf8_lossy(&fuzzy.stdout),
                String::from_utf8_lossy(&fuzzy.stderr)
            );
            log.error(format!("patch failed to apply:\n{stderr}"));
            return Err(PatchError::Apply { stderr });
        }
        log.info("fuzzy patch applied");
    } else {
        log.info("patch applied");
    }

    commit_all(testbed, log).await
}

async fn commit_all(testbed: &Path, log: &InstanceLog) -> Result<(), PatchError> {
    let commit = run(testbed, "git", &["commit", "-am", "fix build"]).await?;
    if commit.status.success() {
        log.info("committed patched tree");
        return Ok(());
    }
    let output = format!(
        "{}{}",
        String::from_utf8_lossy(&commit.stdout),
        String::from_utf8_lossy(&commit.stderr)
    );
    // An empty diff leaves nothing to commit; that is a valid outcome.
    if output.contains("nothing to commit")
        || output.contains("nothing added to commit")
        || output.contains("working tree clean")
    {
        log.info("no changes to commit");
        return Ok(());
    }
    log.error(format!("git commit failed:\n{output}"));
    Err(PatchError::Commit { output })
}
