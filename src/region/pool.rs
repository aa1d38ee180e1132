//! Bounded pool for concurrent frame fetches.
//!
//! Fetches are I/O-bound, so the pool is sized well above the CPU count.
//! Every task runs as its own tokio task and holds one semaphore permit while
//! it works. Dropping a [`JoinHandle`] detaches the task: it still runs to
//! completion and its result is discarded.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::error::FetchError;

/// Lower bound on the default pool size.
pub const MIN_FETCH_CONCURRENCY: usize = 16;

/// Default pool size: twice the available cores, and never below 16.
pub fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|cores| cores.get() * 2)
        .unwrap_or(MIN_FETCH_CONCURRENCY)
        .max(MIN_FETCH_CONCURRENCY)
}

/// Semaphore-gated task pool, one per open image.
#[derive(Debug, Clone)]
pub struct FetchPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl FetchPool {
    /// Create a pool running at most `size` fetches at once (at least 1).
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    /// Spawn `task` once a permit is free.
    ///
    /// If the pool is closed before a permit is granted the task never runs
    /// and the handle resolves to [`FetchError::Closed`].
    pub fn spawn<T, Fut>(&self, task: Fut) -> JoinHandle<Result<T, FetchError>>
    where
        Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
        T: Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        tokio::spawn(async move {
            let _permit = permits
                .acquire_owned()
                .await
                .map_err(|_| FetchError::Closed)?;
            task.await
        })
    }

    /// Stop granting permits. Queued tasks fail with `Closed`; running ones finish.
    pub fn close(&self) {
        self.permits.close();
    }

    pub fn is_closed(&self) -> bool {
        self.permits.is_closed()
    }

    /// Maximum concurrent fetches.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Permits not currently held.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

impl Default for FetchPool {
    fn default() -> Self {
        Self::new(default_concurrency())
    }
}
