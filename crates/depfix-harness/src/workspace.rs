//! Workspace management.
//!
//! Every instance evaluation owns one workspace directory holding the
//! staged `oracle/` and `model/` trees, `evaluate.log`, `result.json` and
//! the captured CI output. Workspaces are scoped resources: staged trees
//! are created at evaluator entry and the cache policy is consulted only in
//! the release path.

use std::io;
use std::path::{Path, PathBuf};

use clap::ValueEnum;

/// What to keep of a workspace once its evaluation finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CacheLevel {
    /// Keep everything, staged trees included.
    All,
    /// Delete staged trees, keep logs and the result file.
    Log,
    /// Remove the entire workspace.
    None,
}

impl std::fmt::Display for CacheLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::All => "all",
            Self::Log => "log",
            Self::None => "none",
        })
    }
}

/// Renames an existing path aside by appending `-bak` (then `-bak-bak`, …)
/// until a free name is found. Returns the backup path, or `None` when
/// there was nothing to back up.
pub fn backup_existing(path: &Path) -> io::Result<Option<PathBuf>> {
    if !path.exists() {
        return Ok(None);
    }
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut backup = path.with_file_name(format!("{file_name}-bak"));
    while backup.exists() {
        let name = backup
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        backup = backup.with_file_name(format!("{name}-bak"));
    }
    std::fs::rename(path, &backup)?;
    Ok(Some(backup))
}

/// Copies a project tree, preserving symlinks as symlinks.
pub fn copy_tree(src: &Path, dst: &Path) -> io::Result<()> {
    std::fs::create_dir_all(dst)?;
    for entry in walkdir::WalkDir::new(src).follow_links(false).min_depth(1) {
        let entry = entry.map_err(io::Error::other)?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(io::Error::other)?;
        let target = dst.join(rel);
        let file_type = entry.file_type();
        if file_type.is_dir() {
            std::fs::create_dir_all(&target)?;
        } else if file_type.is_symlink() {
            let link = std::fs::read_link(entry.path())?;
            #[cfg(unix)]
            std::os::unix::fs::symlink(link, &target)?;
            #[cfg(not(unix))]
            std::fs::copy(entry.path(), &target).map(|_| ())?;
        } else {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Applies the cache policy to a finished workspace.
pub fn apply_cache_level(workspace: &Path, level: CacheLevel) -> io::Result<()> {
    match level {
        CacheLevel::All => Ok(()),
        CacheLevel::Log => {
            if !workspace.exists() {
                return Ok(());
            }
            for entry in std::fs::read_dir(workspace)? {
                let entry = entry?;
                if entry.file_type()?.is_dir() {
                    std::fs::remove_dir_all(entry.path())?;
                }
            }
            Ok(())
        }
        CacheLevel::None => {
            if workspace.exists() {
                std::fs::remove_dir_all(workspace)?;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backup_chain() {
        let dir = tempfile::tempdir().unwrap();
        let ws = dir.path().join("eval");

        std::fs::create_dir(&ws).unwrap();
        let first = backup_existing(&ws).unwrap().unwrap();
        assert_eq!(first, dir.path().join("eval-bak"));

        std::fs::create_dir(&ws).unwrap();
        let second = backup_existing(&ws).unwrap().unwrap();
        assert_eq!(second, dir.path().join("eval-bak-bak"));

        assert_eq!(backup_existing(&ws).unwrap(), None);
    }

    #[test]
    fn test_copy_tree_preserves_symlinks() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        std::fs::create_dir_all(src.join("nested")).unwrap();
        std::fs::write(src.join("nested/file.txt"), "data").unwrap();
        #[cfg(unix)]
        std::os::unix::fs::symlink("nested/file.txt", src.join("link.txt")).unwrap();

        let dst = dir.path().join("dst");
        copy_tree(&src, &dst).unwrap();

        assert_eq!(
            std::fs::read_to_string(dst.join("nested/file.txt")).unwrap(),
            "data"
        );
        #[cfg(unix)]
        {
            let meta = std::fs::symlink_metadata(dst.join("link.txt")).unwrap();
            assert!(meta.file_type().is_symlink());
        }
    }

    #[test]
    fn test_cache_level_log_keeps_files() {
        let dir = tempfile::tempdir().unwrap();
        let ws = dir.path().join("ws");
        std::fs::create_dir_all(ws.join("oracle")).unwrap();
        std::fs::create_dir_all(ws.join("model")).unwrap();
        std::fs::write(ws.join("result.json"), "{}").unwrap();
        std::fs::write(ws.join("evaluate.log"), "log").unwrap();

        apply_cache_level(&ws, CacheLevel::Log).unwrap();
        assert!(!ws.join("oracle").exists());
        assert!(!ws.join("model").exists());
        assert!(ws.join("result.json").exists());
        assert!(ws.join("evaluate.log").exists());
    }

    #[test]
    fn test_cache_level_none_removes_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let ws = dir.path().join("ws");
        std::fs::create_dir_all(&ws).unwrap();
        apply_cache_level(&ws, CacheLevel::None).unwrap();
        assert!(!ws.exists());
    }

    #[test]
    fn test_cache_level_all_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let ws = dir.path().join("ws");
        std::fs::create_dir_all(ws.join("oracle")).unwrap();
        apply_cache_level(&ws, CacheLevel::All).unwrap();
        assert!(ws.join("oracle").exists());
    }
}
