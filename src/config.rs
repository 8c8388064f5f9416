use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Largest number of files the multi-way comparator keeps open at once.
pub const DEFAULT_MAX_OPEN_FILES: usize = 512;

/// Settings for one deduplication run.
///
/// Loaded from an optional TOML file and then overridden by command-line
/// flags. Every field has a default so a partial file is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory to scan.
    pub input: PathBuf,
    /// Case-insensitive substrings; entries may themselves be comma-separated.
    pub excludes: Vec<String>,
    /// Move duplicates here instead of deleting them.
    pub move_to: Option<PathBuf>,
    /// Report what would be done without touching the filesystem.
    pub test: bool,
    /// Skip files whose size is at or above this many bytes.
    pub max_size: Option<u64>,
    /// Worker threads, defaults to the detected parallelism.
    pub threads: Option<usize>,
    /// File-descriptor budget for a single multi-way comparison.
    pub max_open_files: usize,
    /// Draw progress spinners and bars on the terminal.
    #[serde(skip)]
    pub progress: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input: PathBuf::from("."),
            excludes: Vec::new(),
            move_to: None,
            test: false,
            max_size: None,
            threads: None,
            max_open_files: DEFAULT_MAX_OPEN_FILES,
            progress: false,
        }
    }
}

impl Config {
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            ..Self::default()
        }
    }

    /// Reads a TOML configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: '{}'", path.display()))?;
        toml::from_str(&text)
            .with_context(|| format!("Failed to parse config file: '{}'", path.display()))
    }

    /// Lower-cased exclude patterns with blanks dropped.
    pub fn exclude_patterns(&self) -> Vec<String> {
        self.excludes
            .iter()
            .flat_map(|entry| entry.split(','))
            .map(|pattern| pattern.trim().to_lowercase())
            .filter(|pattern| !pattern.is_empty())
            .collect()
    }

    pub fn worker_threads(&self) -> usize {
        self.threads.filter(|&n| n > 0).unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }
}
