use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::context::RunContext;
use crate::error::{Error, Result};
use crate::stats;

/// What happens to each file that was not kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Delete,
    /// Relocate under this root, keeping the path relative to the scan root.
    Move(PathBuf),
}

/// Applies an [`Action`] to the files selected by the resolver.
pub struct Executor<'a> {
    action: Action,
    root: &'a Path,
    test: bool,
    ctx: &'a RunContext,
}

impl<'a> Executor<'a> {
    pub fn new(action: Action, root: &'a Path, test: bool, ctx: &'a RunContext) -> Self {
        Self {
            action,
            root,
            test,
            ctx,
        }
    }

    /// Acts on every path. A failure is recorded and the next path is tried.
    pub fn execute(&self, paths: &[PathBuf]) {
        self.ctx.stats.add(stats::FILES_FLAGGED, paths.len() as u64);
        for path in paths {
            let result = match &self.action {
                Action::Delete => self.delete(path),
                Action::Move(destination) => self.relocate(path, destination),
            };
            if let Err(err) = result {
                self.ctx.record(err);
            }
        }
    }

    fn delete(&self, path: &Path) -> Result<()> {
        if self.test {
            info!("Would delete '{}'", path.display());
            return Ok(());
        }
        fs::remove_file(path).map_err(|err| Error::io(path, err))?;
        self.ctx.stats.add(stats::FILES_DELETED, 1);
        debug!("Deleted '{}'", path.display());
        self.prune_empty_parents(path);
        Ok(())
    }

    /// Removes now-empty ancestors of a deleted file, stopping at the first
    /// one that cannot be removed and never touching the scan root.
    fn prune_empty_parents(&self, path: &Path) {
        let mut current = path.parent();
        while let Some(dir) = current {
            if dir == self.root || !dir.starts_with(self.root) {
                break;
            }
            if fs::remove_dir(dir).is_err() {
                break;
            }
            self.ctx.stats.add(stats::FOLDERS_DELETED, 1);
            debug!("Removed empty folder '{}'", dir.display());
            current = dir.parent();
        }
    }

    fn relocate(&self, path: &Path, destination: &Path) -> Result<()> {
        let relative = path
            .strip_prefix(self.root)
            .ok()
            .filter(|relative| !relative.as_os_str().is_empty())
            .ok_or_else(|| Error::OutsideRoot {
                path: path.to_path_buf(),
                root: self.root.to_path_buf(),
            })?;
        let target = destination.join(relative);

        if self.test {
            info!("Would move '{}' to '{}'", path.display(), target.display());
            return Ok(());
        }
        if fs::symlink_metadata(&target).is_ok() {
            return Err(Error::TargetExists(target));
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|err| Error::io(parent, err))?;
        }
        move_file(path, &target)?;
        self.ctx.stats.add(stats::FILES_MOVED, 1);
        debug!("Moved '{}' to '{}'", path.display(), target.display());
        Ok(())
    }
}

/// Moves `from` to `to` without ever replacing an existing `to`.
///
/// Links the new name first so an existing target fails the move; where
/// links are unavailable (other filesystem, no link support) the content is
/// copied into a freshly created file instead.
fn move_file(from: &Path, to: &Path) -> Result<()> {
    match fs::hard_link(from, to) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
            return Err(Error::TargetExists(to.to_path_buf()));
        }
        Err(err) => {
            debug!("Cannot link '{}' ({err}), copying instead", to.display());
            copy_new(from, to)?;
        }
    }
    fs::remove_file(from).map_err(|err| Error::io(from, err))
}

fn copy_new(from: &Path, to: &Path) -> Result<()> {
    let mut source = fs::File::open(from).map_err(|err| Error::io(from, err))?;
    let mut target = match fs::OpenOptions::new().write(true).create_new(true).open(to) {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
            return Err(Error::TargetExists(to.to_path_buf()));
        }
        Err(err) => return Err(Error::io(to, err)),
    };
    if let Err(err) = io::copy(&mut source, &mut target) {
        drop(target);
        let _ = fs::remove_file(to);
        return Err(Error::io(to, err));
    }
    Ok(())
}
