//! Dataset and prediction loading.

use std::collections::HashMap;
use std::path::Path;

use depfix_core::RepoInstance;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON on line {line} of {path}: {source}")]
    Json {
        path: String,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("predictions path must be \"gold\", .json, or .jsonl: {0}")]
    UnsupportedFormat(String),
}

/// One candidate patch produced by an external generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub instance_id: String,
    #[serde(default)]
    pub model_name_or_path: Option<String>,
    #[serde(default)]
    pub model_patch: String,
}

fn read(path: &Path) -> Result<String, DatasetError> {
    std::fs::read_to_string(path).map_err(|source| DatasetError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Loads the JSON-lines dataset into immutable instances.
pub fn load_dataset(path: &Path) -> Result<Vec<RepoInstance>, DatasetError> {
    let content = read(path)?;
    let mut instances = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let instance: RepoInstance =
            serde_json::from_str(line).map_err(|source| DatasetError::Json {
                path: path.display().to_string(),
                line: idx + 1,
                source,
            })?;
        instances.push(instance);
    }
    Ok(instances)
}

/// Loads candidate patches keyed by instance id.
///
/// `path_or_gold` is either the literal `gold` (use each instance's oracle
/// patch), a `.json` array of predictions, or a `.jsonl` stream. Returns
/// the patch map and the generating model's name.
pub fn load_predictions(
    path_or_gold: &str,
    dataset: &[RepoInstance],
) -> Result<(HashMap<String, String>, String), DatasetError> {
    if path_or_gold == "gold" {
        let map = dataset
            .iter()
            .map(|i| (i.instance_id.clone(), i.patch.clone()))
            .collect();
        return Ok((map, "gold".to_string()));
    }

    let path = Path::new(path_or_gold);
    let content = read(path)?;
    let predictions: Vec<Prediction> = if path_or_gold.ends_with(".json") {
        serde_json::from_str(&content).map_err(|source| DatasetError::Json {
            path: path_or_gold.to_string(),
            line: 0,
            source,
        })?
    } else if path_or_gold.ends_with(".jsonl") {
        let mut records = Vec::new();
        for (idx, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            records.push(serde_json::from_str(line).map_err(|source| DatasetError::Json {
                path: path_or_gold.to_string(),
                line: idx + 1,
                source,
            })?);
        }
        records
    } else {
        return Err(DatasetError::UnsupportedFormat(path_or_gold.to_string()));
    };

    let model_name = predictions
        .first()
        .and_then(|p| p.model_name_or_path.clone())
        .unwrap_or_else(|| "unknown".to_string());
    let map = predictions
        .into_iter()
        .map(|p| (p.instance_id, p.model_patch))
        .collect();
    Ok((map, model_name))
}

/// Restricts the dataset to instances that have a prediction and (when the
/// filter is non-empty) appear in `instance_ids`. Missing predictions are
/// reported, never fatal.
pub fn filter_dataset(
    dataset: Vec<RepoInstance>,
    instance_ids: &[String],
    predictions: &HashMap<String, String>,
) -> Vec<RepoInstance> {
    let selected: Vec<RepoInstance> = dataset
        .into_iter()
        .filter(|i| instance_ids.is_empty() || instance_ids.contains(&i.instance_id))
        .collect();

    let missing: Vec<&str> = selected
        .iter()
        .filter(|i| !predictions.contains_key(&i.instance_id))
        .map(|i| i.instance_id.as_str())
        .collect();
    if !missing.is_empty() {
        tracing::warn!(count = missing.len(), ?missing, "instances without predictions");
    }

    selected
        .into_iter()
        .filter(|i| predictions.contains_key(&i.instance_id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance_json(id: &str) -> String {
        format!(
            r#"{{"instance_id": "{id}", "language": "python", "act_command": "act -j test", "ci_file": "ci.yml", "patch": "oracle-{id}", "build_files": ["requirements.txt"], "env_specs": {{"SDK": "3.11", "OS": "ubuntu-22.04"}}}}"#
        )
    }

    #[test]
    fn test_load_dataset_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dataset.jsonl");
        std::fs::write(
            &path,
            format!("{}\n\n{}\n", instance_json("a-1"), instance_json("b-2")),
        )
        .unwrap();

        let dataset = load_dataset(&path).unwrap();
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset[1].instance_id, "b-2");
    }

    #[test]
    fn test_load_dataset_bad_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dataset.jsonl");
        std::fs::write(&path, "not json\n").unwrap();
        assert!(matches!(
            load_dataset(&path),
            Err(DatasetError::Json { line: 1, .. })
        ));
    }

    #[test]
    fn test_gold_predictions_use_oracle_patch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dataset.jsonl");
        std::fs::write(&path, format!("{}\n", instance_json("a-1"))).unwrap();
        let dataset = load_dataset(&path).unwrap();

        let (preds, model) = load_predictions("gold", &dataset).unwrap();
        assert_eq!(model, "gold");
        assert_eq!(preds["a-1"], "oracle-a-1");
    }

    #[test]
    fn test_load_predictions_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preds.jsonl");
        std::fs::write(
            &path,
            r#"{"instance_id": "a-1", "model_name_or_path": "gpt-x", "model_patch": "diff"}"#,
        )
        .unwrap();

        let (preds, model) = load_predictions(path.to_str().unwrap(), &[]).unwrap();
        assert_eq!(model, "gpt-x");
        assert_eq!(preds["a-1"], "diff");
    }

    #[test]
    fn test_load_predictions_rejects_other_formats() {
        assert!(matches!(
            load_predictions("preds.csv", &[]),
            Err(DatasetError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_filter_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dataset.jsonl");
        std::fs::write(
            &path,
            format!("{}\n{}\n", instance_json("a-1"), instance_json("b-2")),
        )
        .unwrap();
        let dataset = load_dataset(&path).unwrap();

        let mut preds = HashMap::new();
        preds.insert("a-1".to_string(), "diff".to_string());

        let filtered = filter_dataset(dataset.clone(), &[], &preds);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].instance_id, "a-1");

        let filtered = filter_dataset(dataset, &["b-2".to_string()], &preds);
        assert!(filtered.is_empty());
    }
}
