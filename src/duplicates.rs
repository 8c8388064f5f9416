use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use colored::Colorize;
use log::info;

use crate::utils::{DuplicateSet, path_depth};

/// Picks the keeper of every duplicate set and returns everything else.
///
/// A frequency table counts how often each parent directory appears across
/// all sets. Each set is then sorted by path depth, then by parent frequency,
/// then by path; the first entry is kept and the rest are returned. Sets are
/// left sorted in place so callers can show the keeper.
pub fn resolve(sets: &mut [DuplicateSet]) -> Vec<PathBuf> {
    let mut frequency: HashMap<PathBuf, usize> = HashMap::new();
    for path in sets.iter().flatten() {
        *frequency.entry(parent(path).to_path_buf()).or_default() += 1;
    }

    let mut filtered = Vec::new();
    for set in sets.iter_mut() {
        set.sort_by(|a, b| rank(a, b, &frequency));
        filtered.extend(set.iter().skip(1).cloned());
    }
    filtered
}

fn rank(a: &Path, b: &Path, frequency: &HashMap<PathBuf, usize>) -> Ordering {
    let weight = |path: &Path| frequency.get(parent(path)).copied().unwrap_or(0);
    path_depth(a)
        .cmp(&path_depth(b))
        .then_with(|| weight(a).cmp(&weight(b)))
        .then_with(|| a.cmp(b))
}

fn parent(path: &Path) -> &Path {
    path.parent().unwrap_or(path)
}

/// Prints each resolved set with its keeper first.
pub fn print_results(sets: &[DuplicateSet], base_path: &Path) {
    if sets.is_empty() {
        println!("{}", "No duplicate files found!".green());
        return;
    }
    let flagged: usize = sets.iter().map(|set| set.len() - 1).sum();
    info!("{} duplicate sets, {} files flagged", sets.len(), flagged);

    for set in sets {
        let mut paths = set.iter();
        if let Some(keeper) = paths.next() {
            println!("{} {}", "keep".green(), relative(keeper, base_path).display());
        }
        for path in paths {
            println!("  {} {}", "drop".yellow(), relative(path, base_path).display());
        }
    }
}

fn relative<'a>(path: &'a Path, base_path: &Path) -> &'a Path {
    path.strip_prefix(base_path).unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sets(groups: &[&[&str]]) -> Vec<DuplicateSet> {
        groups
            .iter()
            .map(|group| group.iter().map(PathBuf::from).collect())
            .collect()
    }

    #[test]
    fn test_keeps_shallowest_path() {
        let mut input = sets(&[&["/a/b/y", "/a/x"]]);
        assert_eq!(resolve(&mut input), [PathBuf::from("/a/b/y")]);
        assert_eq!(input[0][0], PathBuf::from("/a/x"));
    }

    #[test]
    fn test_deeper_copies_are_filtered() {
        let mut input = sets(&[
            &["/path/to/duplicate/one", "/deep/path/to/duplicate/one"],
            &["/path/to/duplicate/two", "/deep/path/to/duplicate/two"],
        ]);
        assert_eq!(
            resolve(&mut input),
            [
                PathBuf::from("/deep/path/to/duplicate/one"),
                PathBuf::from("/deep/path/to/duplicate/two"),
            ]
        );
    }

    #[test]
    fn test_equal_depth_prefers_less_frequent_parent() {
        // /q holds two duplicates, /p and /r one each
        let mut input = sets(&[&["/q/one", "/p/one"], &["/q/two", "/r/two"]]);
        let filtered = resolve(&mut input);
        assert_eq!(filtered, [PathBuf::from("/q/one"), PathBuf::from("/q/two")]);
        assert_eq!(input[0][0], PathBuf::from("/p/one"));
        assert_eq!(input[1][0], PathBuf::from("/r/two"));
    }

    #[test]
    fn test_full_tie_is_lexicographic() {
        let mut input = sets(&[&["/d/b", "/d/a"]]);
        assert_eq!(resolve(&mut input), [PathBuf::from("/d/b")]);

        let mut reversed = sets(&[&["/d/a", "/d/b"]]);
        assert_eq!(resolve(&mut reversed), [PathBuf::from("/d/b")]);
    }

    #[test]
    fn test_empty_input() {
        assert!(resolve(&mut []).is_empty());
    }
}
