use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use crate::config::Config;

#[derive(Parser, Debug)]
#[command(name = "level6")]
#[command(version, about = "Find byte-identical files and delete or move the redundant copies")]
pub struct Cli {
    /// Directory to scan for duplicates (default: current directory)
    #[arg(short, long, env = "LEVEL6_INPUT")]
    pub input: Option<PathBuf>,

    /// Comma-separated, case-insensitive patterns to exclude
    #[arg(short, long, env = "LEVEL6_EXCLUDES", value_delimiter = ',')]
    pub excludes: Vec<String>,

    /// Move duplicates to this directory instead of deleting them
    #[arg(short, long = "move", env = "LEVEL6_MOVE")]
    pub move_to: Option<PathBuf>,

    /// Test run: only report what would be done
    #[arg(short, long)]
    pub test: bool,

    /// Skip files at or above this size in bytes
    #[arg(long, env = "LEVEL6_MAX_SIZE")]
    pub max_size: Option<u64>,

    /// Number of worker threads (default: number of CPU cores)
    #[arg(long, env = "LEVEL6_THREADS")]
    pub threads: Option<usize>,

    /// Most files compared at once before falling back to pairwise comparison
    #[arg(long)]
    pub max_open_files: Option<usize>,

    /// TOML configuration file; flags override its values
    #[arg(short, long, env = "LEVEL6_CONFIG")]
    pub config: Option<PathBuf>,

    /// Print the summary (and test-run listing) as JSON
    #[arg(long)]
    pub json: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Only log errors and hide progress
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Cli {
    /// Builds the run configuration: file values first, flags on top.
    pub fn to_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };
        if let Some(input) = &self.input {
            config.input = input.clone();
        }
        if !self.excludes.is_empty() {
            config.excludes = self.excludes.clone();
        }
        if let Some(dir) = &self.move_to {
            config.move_to = Some(dir.clone());
        }
        config.test |= self.test;
        if self.max_size.is_some() {
            config.max_size = self.max_size;
        }
        if self.threads.is_some() {
            config.threads = self.threads;
        }
        if let Some(limit) = self.max_open_files {
            config.max_open_files = limit;
        }
        config.progress = !self.quiet && !self.json;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_flags_map_to_config() {
        let cli = Cli::try_parse_from([
            "level6", "-t", "-m", "/dups", "-i", "/", "-e", "this,That",
        ])
        .unwrap();
        let config = cli.to_config().unwrap();
        assert_eq!(config.input, PathBuf::from("/"));
        assert_eq!(config.move_to, Some(PathBuf::from("/dups")));
        assert!(config.test);
        assert_eq!(config.exclude_patterns(), ["this", "that"]);
    }

    #[test]
    fn test_no_flags_uses_defaults() {
        let cli = Cli::try_parse_from(["level6"]).unwrap();
        let config = cli.to_config().unwrap();
        assert_eq!(config.max_open_files, 512);
        assert!(!config.test);
        assert!(config.progress);
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("level6.toml");
        fs::write(&path, "input = \"/from/file\"\nmax_open_files = 8\nthreads = 2\n").unwrap();

        let cli = Cli::try_parse_from([
            "level6",
            "--config",
            path.to_str().unwrap(),
            "--threads",
            "4",
            "--quiet",
        ])
        .unwrap();
        let config = cli.to_config().unwrap();
        assert_eq!(config.input, PathBuf::from("/from/file"));
        assert_eq!(config.max_open_files, 8);
        assert_eq!(config.threads, Some(4));
        assert!(!config.progress);
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["level6", "-q", "-v"]).is_err());
    }
}
