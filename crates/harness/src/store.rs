//! Experiment result storage
//!
//! Lays results out as `<results_dir>/<experiment>/conversation_N/` with a
//! fixed filename per artifact, plus one `aggregated_results.json` at the
//! experiment root. Filenames are part of the contract; downstream tooling
//! reads them directly.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const SCHEMA_FILE: &str = "schema.json";
pub const GROUND_TRUTH_FILE: &str = "ground_truth.json";
pub const CONVERSATION_FILE: &str = "generated_conversation.txt";
pub const EXTRACTION_FILE: &str = "extracted.json";
pub const EVALUATION_FILE: &str = "evaluation.json";
pub const AGGREGATE_FILE: &str = "aggregated_results.json";

/// Filesystem store for one experiment
pub struct ExperimentStore {
    root: PathBuf,
}

impl ExperimentStore {
    /// Open (creating if needed) the directory for a named experiment
    pub fn open(results_dir: &Path, experiment: &str) -> Result<Self> {
        let root = results_dir.join(experiment);
        fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create experiment dir: {}", root.display()))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory for one conversation, created on demand
    pub fn conversation_dir(&self, index: usize) -> Result<PathBuf> {
        let dir = self.root.join(format!("conversation_{}", index));
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create conversation dir: {}", dir.display()))?;
        Ok(dir)
    }

    /// Indices of conversations already present, in ascending order
    pub fn conversations(&self) -> Result<Vec<usize>> {
        let mut indices = Vec::new();
        for entry in fs::read_dir(&self.root)
            .with_context(|| format!("Failed to read experiment dir: {}", self.root.display()))?
        {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            if let Some(index) = name
                .to_str()
                .and_then(|n| n.strip_prefix("conversation_"))
                .and_then(|n| n.parse::<usize>().ok())
            {
                indices.push(index);
            }
        }
        indices.sort_unstable();
        Ok(indices)
    }

    pub fn save_json<T: Serialize>(&self, index: usize, file: &str, value: &T) -> Result<()> {
        let path = self.conversation_dir(index)?.join(file);
        let contents = serde_json::to_string_pretty(value)?;
        fs::write(&path, contents)
            .with_context(|| format!("Failed to write {}", path.display()))
    }

    pub fn load_json<T: DeserializeOwned>(&self, index: usize, file: &str) -> Result<T> {
        let path = self.root.join(format!("conversation_{}", index)).join(file);
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn save_text(&self, index: usize, file: &str, contents: &str) -> Result<()> {
        let path = self.conversation_dir(index)?.join(file);
        fs::write(&path, contents)
            .with_context(|| format!("Failed to write {}", path.display()))
    }

    pub fn load_text(&self, index: usize, file: &str) -> Result<String> {
        let path = self.root.join(format!("conversation_{}", index)).join(file);
        fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))
    }

    pub fn has_file(&self, index: usize, file: &str) -> bool {
        self.root
            .join(format!("conversation_{}", index))
            .join(file)
            .exists()
    }

    /// Save a JSON file at the experiment root
    pub fn save_root_json<T: Serialize>(&self, file: &str, value: &T) -> Result<()> {
        let path = self.root.join(file);
        let contents = serde_json::to_string_pretty(value)?;
        fs::write(&path, contents)
            .with_context(|| format!("Failed to write {}", path.display()))
    }

    pub fn load_root_json<T: DeserializeOwned>(&self, file: &str) -> Result<T> {
        let path = self.root.join(file);
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }
}

/// Names of experiments under a results directory
pub fn list_experiments(results_dir: &Path) -> Result<Vec<String>> {
    if !results_dir.exists() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in fs::read_dir(results_dir)
        .with_context(|| format!("Failed to read results dir: {}", results_dir.display()))?
    {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}
