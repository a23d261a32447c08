use tracing::{debug, error, info, warn};

/// Logging capability handed to every connector operation.
///
/// Implementations must be shareable across threads: spatial lookups report
/// from worker threads.
pub trait LogSink: Send + Sync {
    fn info(&self, message: &str);
    fn warning(&self, message: &str);
    fn error(&self, message: &str);
    fn step(&self, message: &str);
    fn task(&self, key: &str, message: &str, total: u64);
    fn progress(&self, key: &str, progress: u64, total: Option<u64>);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLog;

impl LogSink for TracingLog {
    fn info(&self, message: &str) {
        info!("{message}");
    }

    fn warning(&self, message: &str) {
        warn!("{message}");
    }

    fn error(&self, message: &str) {
        error!("{message}");
    }

    fn step(&self, message: &str) {
        info!(step = true, "{message}");
    }

    fn task(&self, key: &str, message: &str, total: u64) {
        debug!(task = key, total, "{message}");
    }

    fn progress(&self, key: &str, progress: u64, total: Option<u64>) {
        debug!(task = key, progress, total, "progress");
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLog;

impl LogSink for NoopLog {
    fn info(&self, _message: &str) {}
    fn warning(&self, _message: &str) {}
    fn error(&self, _message: &str) {}
    fn step(&self, _message: &str) {}
    fn task(&self, _key: &str, _message: &str, _total: u64) {}
    fn progress(&self, _key: &str, _progress: u64, _total: Option<u64>) {}
}
