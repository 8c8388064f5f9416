pub mod actions;
pub mod cli;
pub mod compare;
pub mod config;
pub mod context;
pub mod dedup;
pub mod duplicates;
pub mod error;
pub mod hasher;
pub mod logging;
pub mod scanner;
pub mod stats;
pub mod utils;

pub use actions::{Action, Executor};
pub use cli::Cli;
pub use config::Config;
pub use context::RunContext;
pub use dedup::Deduplicator;
pub use duplicates::{print_results, resolve};
pub use error::{Error, Result};
pub use logging::init_logging;
pub use scanner::{WalkFilter, scan_directory};
pub use stats::{Stats, Summary};
pub use utils::{DuplicateSet, FileRecord, SizeGroups};
