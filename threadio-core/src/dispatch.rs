//! Worker dispatch.
//!
//! A [`Dispatcher`] runs one blocking job away from the calling task and
//! hands back a future resolving to the job's return value. The calling task
//! suspends on that future; the scheduler thread itself never blocks.
//!
//! Two implementations are provided:
//!
//! - [`TokioDispatcher`]: Tokio's blocking thread pool (`spawn_blocking`)
//! - [`RayonDispatcher`]: a Rayon thread pool, with results delivered over a
//!   Tokio oneshot channel
//!
//! Jobs are never interrupted. If the caller stops awaiting, the job still
//! runs to completion and its result is dropped.
//!
//! # Example
//!
//! ```rust
//! use threadio_core::dispatch::{Dispatcher, TokioDispatcher};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> threadio_core::Result<()> {
//! let dispatcher = TokioDispatcher::new();
//! let answer = dispatcher.dispatch(|| 6 * 7).await?;
//! assert_eq!(answer, 42);
//! # Ok(())
//! # }
//! ```

use crate::error::{Result, ThreadIoError};
use std::any::Any;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::oneshot;

/// Future returned by [`Dispatcher::dispatch`].
pub type Dispatched<T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'static>>;

/// Offloads blocking jobs to worker threads.
pub trait Dispatcher: Clone + Send + Sync + 'static {
    /// Run `job` on a worker.
    ///
    /// # Errors
    ///
    /// Returns [`ThreadIoError::Worker`] if the job panicked or no worker
    /// could run it.
    fn dispatch<F, T>(&self, job: F) -> Dispatched<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static;
}

/// Dispatcher backed by Tokio's blocking thread pool.
///
/// Without an explicit [`Handle`], the runtime of the task calling
/// [`dispatch`](Dispatcher::dispatch) is used.
#[derive(Debug, Clone, Default)]
pub struct TokioDispatcher {
    handle: Option<Handle>,
}

impl TokioDispatcher {
    /// Dispatch onto the ambient runtime.
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatch onto a specific runtime.
    pub fn with_handle(handle: Handle) -> Self {
        Self {
            handle: Some(handle),
        }
    }
}

impl Dispatcher for TokioDispatcher {
    fn dispatch<F, T>(&self, job: F) -> Dispatched<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let handle = match &self.handle {
            Some(handle) => handle.clone(),
            None => match Handle::try_current() {
                Ok(handle) => handle,
                Err(err) => {
                    let err = ThreadIoError::worker(format!("no tokio runtime: {err}"));
                    return Box::pin(async move { Err(err) });
                }
            },
        };

        let task = handle.spawn_blocking(job);

        Box::pin(async move {
            task.await
                .map_err(|err| ThreadIoError::worker(format!("blocking job failed: {err}")))
        })
    }
}

/// Dispatcher backed by a Rayon thread pool.
#[derive(Debug, Clone, Default)]
pub struct RayonDispatcher {
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl RayonDispatcher {
    /// Dispatch onto Rayon's global pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatch onto a dedicated pool.
    pub fn with_pool(pool: Arc<rayon::ThreadPool>) -> Self {
        Self { pool: Some(pool) }
    }
}

impl Dispatcher for RayonDispatcher {
    fn dispatch<F, T>(&self, job: F) -> Dispatched<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let run = move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(job));
            // The receiver is gone when the caller stopped waiting.
            let _ = tx.send(outcome);
        };

        match &self.pool {
            Some(pool) => pool.spawn(run),
            None => rayon::spawn(run),
        }

        Box::pin(async move {
            match rx.await {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(payload)) => Err(ThreadIoError::worker(format!(
                    "blocking job panicked: {}",
                    panic_message(payload.as_ref())
                ))),
                Err(_) => Err(ThreadIoError::worker("worker dropped the job")),
            }
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}
