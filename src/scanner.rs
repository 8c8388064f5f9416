use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

use indicatif::{HumanBytes, HumanCount, ProgressBar};
use log::{debug, error, info};
use walkdir::WalkDir;

use crate::context::RunContext;
use crate::error::{Error, Result};
use crate::stats;
use crate::utils::{FileRecord, SizeGroups};

/// Decides which regular files are candidates.
#[derive(Debug, Clone, Default)]
pub struct WalkFilter {
    /// Lower-cased substrings; a path containing any of them is dropped.
    pub excludes: Vec<String>,
    /// Files at or above this size are dropped.
    pub max_size: Option<u64>,
}

impl WalkFilter {
    pub fn is_excluded(&self, path: &Path) -> bool {
        let lowered = path.to_string_lossy().to_lowercase();
        self.excludes
            .iter()
            .any(|pattern| lowered.contains(pattern.as_str()))
    }

    fn is_too_large(&self, size: u64) -> bool {
        self.max_size.is_some_and(|max| size >= max)
    }
}

/// Walks `root` and groups every accepted file by its size.
///
/// Symbolic links, non-regular files, empty files, excluded paths and files
/// over the size ceiling are skipped. Errors on individual entries are
/// recorded and the walk carries on; only a root that cannot be opened or
/// listed aborts it.
pub fn scan_directory(
    root: &Path,
    filter: &WalkFilter,
    ctx: &RunContext,
    progress: bool,
) -> Result<SizeGroups> {
    if let Err(source) = fs::metadata(root) {
        error!("Cannot open input path '{}': {}", root.display(), source);
        return Err(Error::InvalidInput {
            path: root.to_path_buf(),
            source,
        });
    }

    info!("Scanning {}", root.display());
    let pb = new_spinner(progress);

    let mut groups = SizeGroups::new();
    let mut total_size = 0u64;
    for entry in WalkDir::new(root).follow_links(false) {
        let scanned = ctx.stats.add(stats::FILES_SCANNED, 1);
        if scanned % 256 == 0 {
            pb.set_message(format!("Scanning files... {} scanned", HumanCount(scanned)));
        }

        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if err.depth() == 0 => {
                pb.finish_and_clear();
                let source = err
                    .into_io_error()
                    .unwrap_or_else(|| io::Error::other("input path cannot be listed"));
                error!("Cannot list input path '{}': {}", root.display(), source);
                return Err(Error::InvalidInput {
                    path: root.to_path_buf(),
                    source,
                });
            }
            Err(err) => {
                let path = err.path().unwrap_or(root).to_path_buf();
                ctx.record(Error::Walk { path, source: err });
                continue;
            }
        };

        let path = entry.path();
        let file_type = entry.file_type();
        if file_type.is_dir() {
            continue;
        }
        if file_type.is_symlink() || !file_type.is_file() {
            debug!("Discarding irregular file: '{}'", path.display());
            continue;
        }

        let size = match entry.metadata() {
            Ok(metadata) => metadata.len(),
            Err(err) => {
                ctx.record(Error::Walk {
                    path: path.to_path_buf(),
                    source: err,
                });
                continue;
            }
        };
        if size == 0 {
            debug!("Discarding empty file: '{}'", path.display());
            continue;
        }
        if filter.is_too_large(size) {
            debug!("Discarding oversized file: '{}' ({})", path.display(), HumanBytes(size));
            continue;
        }
        if filter.is_excluded(path) {
            debug!("Discarding excluded file: '{}'", path.display());
            continue;
        }

        ctx.stats.add(stats::FILES_COLLECTED, 1);
        total_size += size;
        groups
            .entry(size)
            .or_default()
            .push(FileRecord::new(path.to_path_buf(), size));
    }
    pb.finish_and_clear();

    info!(
        "Collected {} files in {} size groups ({})",
        HumanCount(ctx.stats.get(stats::FILES_COLLECTED)),
        HumanCount(groups.len() as u64),
        HumanBytes(total_size)
    );
    Ok(groups)
}

fn new_spinner(visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    pb.set_message("Scanning files...");
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn filter(excludes: &[&str]) -> WalkFilter {
        WalkFilter {
            excludes: excludes.iter().map(|s| s.to_string()).collect(),
            max_size: None,
        }
    }

    #[test]
    fn test_groups_files_by_size() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("nested");
        fs::create_dir(&nested).unwrap();
        fs::write(dir.path().join("a.txt"), b"hello").unwrap();
        fs::write(nested.join("b.txt"), b"world").unwrap();
        fs::write(dir.path().join("c.txt"), b"longer text").unwrap();

        let ctx = RunContext::new();
        let groups = scan_directory(dir.path(), &filter(&[]), &ctx, false).unwrap();

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[&5].len(), 2);
        assert_eq!(groups[&11].len(), 1);
        assert_eq!(ctx.stats.get(stats::FILES_COLLECTED), 3);
        // root, nested dir and three files
        assert_eq!(ctx.stats.get(stats::FILES_SCANNED), 5);
    }

    #[test]
    fn test_exclude_is_case_insensitive_but_still_scanned() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("keep.txt"), b"data").unwrap();
        fs::write(dir.path().join("skip.IGNORE"), b"data").unwrap();
        fs::write(dir.path().join("other.ignore.txt"), b"data").unwrap();

        let ctx = RunContext::new();
        let groups = scan_directory(dir.path(), &filter(&[".ignore"]), &ctx, false).unwrap();

        let collected: Vec<_> = groups.values().flatten().collect();
        assert_eq!(collected.len(), 1);
        assert!(collected[0].path.ends_with("keep.txt"));
        assert_eq!(ctx.stats.get(stats::FILES_SCANNED), 4);
        assert_eq!(ctx.stats.get(stats::FILES_COLLECTED), 1);
    }

    #[test]
    fn test_skips_empty_and_oversized_files() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("empty"), b"").unwrap();
        fs::write(dir.path().join("small"), b"abc").unwrap();
        fs::write(dir.path().join("large"), b"abcdefgh").unwrap();
        fs::write(dir.path().join("edge"), b"abcd").unwrap();

        let ctx = RunContext::new();
        let walk_filter = WalkFilter {
            excludes: Vec::new(),
            max_size: Some(4),
        };
        let groups = scan_directory(dir.path(), &walk_filter, &ctx, false).unwrap();

        assert_eq!(groups.len(), 1);
        assert!(groups.contains_key(&3));
    }

    #[cfg(unix)]
    #[test]
    fn test_skips_symlinks() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("target.txt");
        fs::write(&target, b"linked").unwrap();
        std::os::unix::fs::symlink(&target, dir.path().join("link.txt")).unwrap();

        let ctx = RunContext::new();
        let groups = scan_directory(dir.path(), &filter(&[]), &ctx, false).unwrap();

        assert_eq!(groups[&6].len(), 1);
        assert_eq!(groups[&6][0].path, target);
    }

    #[test]
    fn test_missing_root_is_structural_error() {
        let dir = tempdir().unwrap();
        let ctx = RunContext::new();
        let result = scan_directory(&dir.path().join("absent"), &filter(&[]), &ctx, false);
        assert!(matches!(result, Err(Error::InvalidInput { .. })));
    }
}
