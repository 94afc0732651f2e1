//! Unified-diff synthesis.
//!
//! Candidate patches are synthesised from in-memory manifest edits without
//! touching the live repository tree: the old contents are committed into a
//! scratch git repository, overwritten with the new contents, and the
//! repository's own diff is read back, so the output is by construction a
//! diff that `git apply` accepts against a tree holding the old contents.

use std::collections::BTreeMap;
use std::path::Path;

use tokio::process::Command;

/// (old content, new content) pairs keyed by repo-relative path.
pub type FileEdits = BTreeMap<String, (String, String)>;

#[derive(thiserror::Error, Debug)]
pub enum DiffError {
    #[error("git {step} failed:\n{stderr}")]
    Git { step: &'static str, stderr: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

async fn git(playground: &Path, step: &'static str, args: &[&str]) -> Result<Vec<u8>, DiffError> {
    let output = Command::new("git")
        .args(args)
        .current_dir(playground)
        .output()
        .await?;
    if !output.status.success() {
        return Err(DiffError::Git {
            step,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }
    Ok(output.stdout)
}

/// Produces a unified diff turning each file's old content into its new
/// content.
///
/// The scratch repository lives in a [`tempfile::TempDir`], which removes
/// it on every exit path including errors.
pub async fn synth_diff(edits: &FileEdits) -> Result<String, DiffError> {
    let playground = tempfile::tempdir()?;
    let root = playground.path();

    git(root, "init", &["init", "-q"]).await?;
    git(root, "config", &["config", "user.email", "depfix@localhost"]).await?;
    git(root, "config", &["config", "user.name", "depfix"]).await?;

    for (file, (old_content, _)) in edits {
        let path = root.join(file);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, old_content).await?;
    }
    git(root, "add", &["add", "-A"]).await?;
    git(root, "commit", &["commit", "-qm", "initial commit"]).await?;

    for (file, (_, new_content)) in edits {
        tokio::fs::write(root.join(file), new_content).await?;
    }

    let stdout = git(root, "diff", &["diff"]).await?;
    Ok(String::from_utf8_lossy(&stdout).into_owned())
}
