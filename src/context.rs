use std::sync::{Mutex, PoisonError};

use log::error;

use crate::error::Error;
use crate::stats::{self, Stats};

/// State shared by every stage of a run: the counters and the most recent
/// per-item error.
#[derive(Default)]
pub struct RunContext {
    pub stats: Stats,
    last_error: Mutex<Option<Error>>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Logs a non-fatal error, counts it and keeps it as the run's last error.
    pub fn record(&self, err: Error) {
        error!("{err}");
        self.stats.add(stats::ERRORS, 1);
        *self.last_error.lock().unwrap_or_else(PoisonError::into_inner) = Some(err);
    }

    pub fn has_error(&self) -> bool {
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn take_error(&self) -> Option<Error> {
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Clears counters and the error slot ahead of a new run.
    pub fn reset(&self) {
        self.stats.reset();
        self.take_error();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_record_keeps_only_last_error() {
        let ctx = RunContext::new();
        ctx.record(Error::io("/one", io::Error::from(io::ErrorKind::NotFound)));
        ctx.record(Error::io("/two", io::Error::from(io::ErrorKind::PermissionDenied)));

        assert_eq!(ctx.stats.get(stats::ERRORS), 2);
        let last = ctx.take_error().unwrap();
        assert_eq!(last.path().unwrap(), std::path::Path::new("/two"));
        assert!(!ctx.has_error());
    }

    #[test]
    fn test_reset() {
        let ctx = RunContext::new();
        ctx.record(Error::Worker("boom".into()));
        ctx.reset();
        assert!(!ctx.has_error());
        assert_eq!(ctx.stats.get(stats::ERRORS), 0);
    }
}
