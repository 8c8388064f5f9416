//! Runs the whole pipeline once: walk, narrow by checksums, confirm byte by
//! byte, resolve keepers and act on the rest.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;

use indicatif::{HumanCount, ProgressBar, ProgressStyle};
use log::{debug, error, info};
use rayon::prelude::*;

use crate::actions::{Action, Executor};
use crate::compare::{self, OpenFileBudget};
use crate::config::Config;
use crate::context::RunContext;
use crate::duplicates;
use crate::error::{Error, Result};
use crate::hasher::{self, Checksums};
use crate::scanner::{self, WalkFilter};
use crate::stats::{self, Summary};
use crate::utils::{DuplicateSet, FileRecord, SizeGroups};

/// Deduplication engine for one configuration.
///
/// Each call to [`Deduplicator::execute`] is an independent run with fresh
/// counters; the results of the latest run stay readable afterwards.
pub struct Deduplicator {
    config: Config,
    ctx: RunContext,
    duplicates: Vec<DuplicateSet>,
    filtered: Vec<PathBuf>,
}

impl Deduplicator {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            ctx: RunContext::new(),
            duplicates: Vec::new(),
            filtered: Vec::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Runs the pipeline once.
    ///
    /// Returns the last error met along the way, if any. Per-file failures do
    /// not stop the run; an input path that cannot be opened does.
    pub fn execute(&mut self) -> Result<()> {
        self.ctx.reset();
        self.duplicates.clear();
        self.filtered.clear();

        let input = absolute(&self.config.input)?;
        let move_to = match &self.config.move_to {
            Some(dir) => Some(absolute(dir)?),
            None => None,
        };
        let mut excludes = self.config.exclude_patterns();
        if let Some(dir) = &move_to {
            excludes.push(dir.to_string_lossy().to_lowercase());
        }
        let filter = WalkFilter {
            excludes,
            max_size: self.config.max_size,
        };
        debug!("Initial state: input={:?} move_to={:?} {:?}", input, move_to, filter);

        let groups = scanner::scan_directory(&input, &filter, &self.ctx, self.config.progress)?;

        let mut sets = self.find_duplicates(groups)?;
        sets.sort_by(|a, b| a.iter().min().cmp(&b.iter().min()));
        self.filtered = duplicates::resolve(&mut sets);
        self.duplicates = sets;
        info!(
            "Found {} duplicate sets, {} files to act on",
            HumanCount(self.duplicates.len() as u64),
            HumanCount(self.filtered.len() as u64)
        );

        let action = move_to.map_or(Action::Delete, Action::Move);
        Executor::new(action, &input, self.config.test, &self.ctx).execute(&self.filtered);

        match self.ctx.take_error() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Hashes and compares every size bucket on a private worker pool.
    ///
    /// Workers own their checksum state and send each bucket's confirmed sets
    /// over a channel; a single aggregator thread collects them. The open
    /// file budget is shared by all workers. A panicking bucket is recorded
    /// as a worker error and the other buckets carry on.
    fn find_duplicates(&self, groups: SizeGroups) -> Result<Vec<DuplicateSet>> {
        let buckets: Vec<Vec<FileRecord>> = groups
            .into_values()
            .filter(|bucket| bucket.len() > 1)
            .collect();
        if buckets.is_empty() {
            return Ok(Vec::new());
        }

        let threads = self.config.worker_threads();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("level6-worker-{i}"))
            .build()
            .map_err(|err| Error::Worker(err.to_string()))?;
        info!(
            "Comparing {} size groups on {} threads",
            HumanCount(buckets.len() as u64),
            threads
        );

        let pb = new_progress_bar(self.config.progress, buckets.len() as u64);
        let budget = OpenFileBudget::new(self.config.max_open_files);
        let ctx = &self.ctx;

        let (tx, rx) = mpsc::channel::<Vec<DuplicateSet>>();
        let aggregator = thread::spawn(move || {
            let mut sets = Vec::new();
            for partial in rx {
                sets.extend(partial);
            }
            sets
        });

        pool.install(|| {
            buckets.into_par_iter().for_each_init(
                || (Checksums::new(), tx.clone()),
                |(checksums, tx), bucket| {
                    let found = guarded(ctx, || process_bucket(bucket, checksums, &budget, ctx));
                    pb.inc(1);
                    if !found.is_empty() && tx.send(found).is_err() {
                        error!("Duplicate aggregator stopped early");
                    }
                },
            );
        });
        drop(tx);
        pb.finish_and_clear();

        aggregator
            .join()
            .map_err(|_| Error::Worker("duplicate aggregator panicked".to_string()))
    }

    /// Paths selected for deletion or relocation by the latest run.
    pub fn filtered(&self) -> &[PathBuf] {
        &self.filtered
    }

    /// Confirmed duplicate sets of the latest run, keeper first.
    pub fn duplicates(&self) -> &[DuplicateSet] {
        &self.duplicates
    }

    pub fn summary(&self) -> Summary {
        self.ctx.stats.summary()
    }
}

fn process_bucket(
    bucket: Vec<FileRecord>,
    checksums: &mut Checksums,
    budget: &OpenFileBudget,
    ctx: &RunContext,
) -> Vec<DuplicateSet> {
    let mut found = Vec::new();
    for group in hasher::narrow_bucket(bucket, checksums, ctx) {
        let paths: Vec<PathBuf> = group.into_iter().map(|record| record.path).collect();
        for set in compare::compare_group(&paths, budget, ctx) {
            ctx.stats.add(stats::DUPLICATE_SETS, 1);
            ctx.stats.add(stats::DUPLICATE_FILES, set.len() as u64);
            found.push(set);
        }
    }
    found
}

/// Runs one bucket's work, turning a panic into a recorded worker error.
fn guarded(ctx: &RunContext, work: impl FnOnce() -> Vec<DuplicateSet>) -> Vec<DuplicateSet> {
    panic::catch_unwind(AssertUnwindSafe(work)).unwrap_or_else(|payload| {
        ctx.record(Error::Worker(panic_message(payload.as_ref())));
        Vec::new()
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("worker panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("worker panicked: {message}")
    } else {
        "worker panicked".to_string()
    }
}

fn absolute(dir: &Path) -> Result<PathBuf> {
    std::path::absolute(dir).map_err(|source| Error::InvalidInput {
        path: dir.to_path_buf(),
        source,
    })
}

fn new_progress_bar(visible: bool, len: u64) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} size groups ETA: {eta}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}
