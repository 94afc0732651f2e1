//! Textual comparison metrics.
//!
//! Both metrics are set operations: exact matches over full dependency
//! payloads (each ecosystem's equality rule) and name-only matches over
//! canonicalised names.

use std::collections::HashSet;

use depfix_core::Dependency;
use serde::{Deserialize, Serialize};

/// True/false positive/negative counts for one comparison.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confusion {
    #[serde(rename = "TP")]
    pub tp: u32,
    #[serde(rename = "FP")]
    pub fp: u32,
    #[serde(rename = "FN")]
    pub fn_: u32,
}

impl Confusion {
    pub fn add(&mut self, other: Confusion) {
        self.tp += other.tp;
        self.fp += other.fp;
        self.fn_ += other.fn_;
    }
}

/// The per-instance textual result: exact and name-only confusion counts
/// plus the number of predicted dependencies no registry knows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextMetrics {
    pub exact: Confusion,
    pub name_only: Confusion,
    pub fake_libs: u32,
}

/// Computes exact and name-only confusion counts for one build file.
pub fn compare_file(model: &[Dependency], oracle: &[Dependency]) -> (Confusion, Confusion) {
    let model_set: HashSet<&Dependency> = model.iter().collect();
    let oracle_set: HashSet<&Dependency> = oracle.iter().collect();
    let exact = confusion_of(&model_set, &oracle_set);

    let model_names: HashSet<String> = model.iter().map(Dependency::canonical_name).collect();
    let oracle_names: HashSet<String> = oracle.iter().map(Dependency::canonical_name).collect();
    let name_only = confusion_of(&model_names, &oracle_names);

    debug_assert_eq!(exact.tp + exact.fn_, oracle_set.len() as u32);
    debug_assert_eq!(exact.tp + exact.fp, model_set.len() as u32);
    debug_assert_eq!(name_only.tp + name_only.fn_, oracle_names.len() as u32);
    debug_assert_eq!(name_only.tp + name_only.fp, model_names.len() as u32);

    (exact, name_only)
}

fn confusion_of<T: Eq + std::hash::Hash>(model: &HashSet<T>, oracle: &HashSet<T>) -> Confusion {
    Confusion {
        tp: model.intersection(oracle).count() as u32,
        fp: model.difference(oracle).count() as u32,
        fn_: oracle.difference(model).count() as u32,
    }
}
