//! Per-instance evaluation logs.
//!
//! Every evaluator owns one [`InstanceLog`] appending timestamped lines to
//! `evaluate.log` in its workspace. Lines are mirrored as `tracing` events
//! so a batch run still has a single global stream. The file handle closes
//! when the evaluator drops, keeping descriptor usage flat across large
//! batches.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;

/// Append-only log for one instance evaluation.
pub struct InstanceLog {
    instance_id: String,
    path: PathBuf,
    file: Mutex<File>,
}

impl InstanceLog {
    /// Opens (truncating) the log file, creating parent directories.
    pub fn create(instance_id: &str, path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        Ok(Self {
            instance_id: instance_id.to_string(),
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn info(&self, message: impl AsRef<str>) {
        tracing::info!(instance = %self.instance_id, "{}", message.as_ref());
        self.write_line("INFO", message.as_ref());
    }

    pub fn warn(&self, message: impl AsRef<str>) {
        tracing::warn!(instance = %self.instance_id, "{}", message.as_ref());
        self.write_line("WARNING", message.as_ref());
    }

    pub fn error(&self, message: impl AsRef<str>) {
        tracing::error!(instance = %self.instance_id, "{}", message.as_ref());
        self.write_line("ERROR", message.as_ref());
    }

    fn write_line(&self, level: &str, message: &str) {
        let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S%.3f");
        if let Ok(mut file) = self.file.lock() {
            // A full disk should not abort an evaluation.
            let _ = writeln!(file, "{timestamp} - {level} - {message}");
        }
    }
}
