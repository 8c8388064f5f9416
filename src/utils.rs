use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A candidate file travelling through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub path: PathBuf,
    pub size: u64,
    pub fast_hash: Option<u32>,
    pub strong_hash: Option<blake3::Hash>,
}

impl FileRecord {
    pub fn new(path: PathBuf, size: u64) -> Self {
        Self {
            path,
            size,
            fast_hash: None,
            strong_hash: None,
        }
    }
}

/// Files grouped by their length in bytes.
pub type SizeGroups = HashMap<u64, Vec<FileRecord>>;

/// Paths proven to hold byte-identical content. Always at least two entries.
pub type DuplicateSet = Vec<PathBuf>;

/// Number of components in a path, used as its depth.
pub fn path_depth(path: &Path) -> usize {
    path.components().count()
}

pub fn format_human_elapsed(elapsed: Duration) -> String {
    let elapsed_secs = elapsed.as_secs();
    let elapsed_subsec_millis = elapsed.subsec_millis();
    if elapsed_secs >= 3600 {
        // h:mm:ss
        let hours = elapsed_secs / 3600;
        let minutes = (elapsed_secs % 3600) / 60;
        let seconds = elapsed_secs % 60;
        format!("{hours}:{minutes:02}:{seconds:02}.{elapsed_subsec_millis:03} (h:mm:ss.mmm)")
    } else if elapsed_secs >= 60 {
        let minutes = elapsed_secs / 60;
        let seconds = elapsed_secs % 60;
        format!("{minutes}:{seconds:02}.{elapsed_subsec_millis:03} (m:ss.mmm)")
    } else {
        format!("{}.{:03} seconds", elapsed_secs, elapsed_subsec_millis)
    }
}
