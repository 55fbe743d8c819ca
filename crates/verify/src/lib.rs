//! CPU-bound verification worker pool.
//!
//! Signature verification is CPU-intensive and must never run on the
//! pipeline's event loop. This crate owns a dedicated rayon pool for it:
//!
//! - [`VerifyPool::spawn_backlog`] submits fire-and-forget verification work;
//!   the task publishes its result itself (typically a non-blocking queue
//!   send). Queue depth is tracked for observability.
//! - [`VerifyPool::run`] dispatches work and waits for its return value, for
//!   callers that need the outcome inline (solicited submissions).
//!
//! The pool applies no backpressure of its own; bounding in-flight work is
//! the submitting pipeline's job.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Errors from pool configuration and dispatch.
#[derive(Debug, Error)]
pub enum VerifyPoolError {
    #[error("failed to build rayon thread pool: {0}")]
    RayonBuild(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("verification task was dropped before completing")]
    TaskLost,
}

/// Configuration for the verification pool.
#[derive(Debug, Clone)]
pub struct VerifyPoolConfig {
    /// Number of worker threads. These are CPU-bound and benefit from
    /// dedicated cores.
    pub threads: usize,

    /// Stack size for worker threads (bytes). Default: 2MB.
    pub stack_size: usize,
}

impl Default for VerifyPoolConfig {
    fn default() -> Self {
        Self::auto()
    }
}

impl VerifyPoolConfig {
    /// Size the pool from the available CPU cores, leaving one core for the
    /// pipeline's own event loop.
    pub fn auto() -> Self {
        let available = std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(4);
        Self {
            threads: available.saturating_sub(1).max(1),
            stack_size: 2 * 1024 * 1024,
        }
    }

    /// A single-threaded pool for tests.
    pub fn minimal() -> Self {
        Self {
            threads: 1,
            stack_size: 2 * 1024 * 1024,
        }
    }

    /// Use a specific thread count.
    pub fn with_threads(threads: usize) -> Self {
        Self {
            threads,
            ..Self::auto()
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), VerifyPoolError> {
        if self.threads == 0 {
            return Err(VerifyPoolError::InvalidConfig(
                "threads must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// A dedicated rayon pool for signature verification.
pub struct VerifyPool {
    pool: rayon::ThreadPool,
    pending: Arc<AtomicUsize>,
}

impl VerifyPool {
    /// Create a pool with the given configuration.
    pub fn new(config: VerifyPoolConfig) -> Result<Self, VerifyPoolError> {
        config.validate()?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.threads)
            .stack_size(config.stack_size)
            .thread_name(|i| format!("verify-{}", i))
            .build()
            .map_err(|e| VerifyPoolError::RayonBuild(e.to_string()))?;

        tracing::info!(threads = config.threads, "verification pool initialized");

        Ok(Self {
            pool,
            pending: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Create with auto-detected configuration.
    pub fn auto() -> Result<Self, VerifyPoolError> {
        Self::new(VerifyPoolConfig::auto())
    }

    /// Submit backlog work to the pool.
    ///
    /// Returns immediately; `f` runs on a worker thread at some later time
    /// and is responsible for publishing its own result.
    pub fn spawn_backlog<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.pending.fetch_add(1, Ordering::Relaxed);
        let pending = self.pending.clone();
        self.pool.spawn(move || {
            f();
            pending.fetch_sub(1, Ordering::Relaxed);
        });
    }

    /// Run `f` on the pool and wait for its result.
    ///
    /// Used by inline callers that need the verification outcome before
    /// continuing; the wait is async so the caller's task yields while the
    /// CPU work runs.
    pub async fn run<F, T>(&self, f: F) -> Result<T, VerifyPoolError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.spawn_backlog(move || {
            // The receiver may have given up; nothing to do with the result.
            let _ = tx.send(f());
        });
        rx.await.map_err(|_| VerifyPoolError::TaskLost)
    }

    /// Number of submitted tasks not yet completed.
    pub fn backlog_depth(&self) -> usize {
        self.pending.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;
    use std::time::Duration;

    #[test]
    fn zero_threads_is_invalid() {
        assert!(matches!(
            VerifyPool::new(VerifyPoolConfig::with_threads(0)),
            Err(VerifyPoolError::InvalidConfig(_))
        ));
    }

    #[test]
    fn spawned_work_runs() {
        let pool = VerifyPool::new(VerifyPoolConfig::minimal()).unwrap();
        let counter = Arc::new(AtomicU64::new(0));

        for _ in 0..8 {
            let counter = counter.clone();
            pool.spawn_backlog(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while counter.load(Ordering::SeqCst) < 8 && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(counter.load(Ordering::SeqCst), 8);
        assert_eq!(pool.backlog_depth(), 0);
    }

    #[tokio::test]
    async fn run_returns_the_result() {
        let pool = VerifyPool::new(VerifyPoolConfig::minimal()).unwrap();
        let value = pool.run(|| 2 + 2).await.unwrap();
        assert_eq!(value, 4);
    }

    #[test]
    fn auto_config_is_valid() {
        let config = VerifyPoolConfig::auto();
        assert!(config.threads >= 1);
        config.validate().unwrap();
    }
}
