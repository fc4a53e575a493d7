//! The async facade over a blocking resource.
//!
//! [`AsyncFile`] owns a [`BlockingIo`] resource and exposes each of its
//! operations as an `async fn`. Every call:
//!
//! 1. checks the [`Lifecycle`] on the calling task (closed and detached
//!    facades fail here, without touching a worker),
//! 2. waits for the resource lock (FIFO, so calls run in issue order),
//! 3. moves the lock guard into a job and hands the job to the
//!    [`Dispatcher`],
//! 4. suspends until the worker returns, then relays the result unchanged.
//!
//! # Cancel Safety
//!
//! Dropping a call while it waits for its worker does not interrupt the
//! blocking call. The job keeps the lock until it finishes, so the next call
//! on the facade runs strictly afterwards and never sees a half-finished
//! operation. The cancelled call's result is discarded.
//!
//! # Example
//!
//! ```rust,ignore
//! use threadio_core::{AsyncFile, OpenOptions};
//!
//! let mut file = threadio_file::open("data.bin", OpenOptions::for_mode("rb")?).await?;
//! let header = file.read(Some(4)).await?;
//! file.seek(std::io::SeekFrom::Start(0)).await?;
//! let everything = file.readall().await?;
//! file.close().await?;
//! ```

use crate::dispatch::{Dispatcher, TokioDispatcher};
use crate::error::{Result, ThreadIoError};
use crate::lifecycle::Lifecycle;
use crate::options::Mode;
use crate::traits::{BinaryIo, BlockingIo, Capabilities, ReadInto};
use log::{debug, trace};
use std::fmt;
use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Asynchronous facade over a blocking resource `R`, dispatching through `D`.
///
/// Dropping a facade that is still open hands the resource to a worker, so
/// flushing it on drop never blocks the calling thread. Errors from that
/// drop are only logged by the resource; call [`close`](Self::close) to see
/// them.
pub struct AsyncFile<R: BlockingIo, D: Dispatcher = TokioDispatcher> {
    handle: Arc<Mutex<R>>,
    dispatcher: D,
    state: Lifecycle,
    name: PathBuf,
    mode: Mode,
    capabilities: Capabilities,
}

impl<R: BlockingIo, D: Dispatcher> AsyncFile<R, D> {
    /// Run the blocking `opener` on a worker and wrap the resource it returns.
    ///
    /// The facade only exists once the open has completed. Open failures are
    /// returned as-is.
    pub async fn open_with<F>(
        name: impl Into<PathBuf>,
        mode: Mode,
        dispatcher: D,
        opener: F,
    ) -> Result<Self>
    where
        F: FnOnce() -> Result<R> + Send + 'static,
    {
        let name = name.into();
        debug!("opening {} (mode {mode})", name.display());
        let resource = dispatcher.dispatch(opener).await??;
        Ok(Self::from_resource(resource, name, mode, dispatcher))
    }

    /// Wrap a resource that is already open.
    pub fn from_resource(
        resource: R,
        name: impl Into<PathBuf>,
        mode: Mode,
        dispatcher: D,
    ) -> Self {
        let capabilities = resource.capabilities();
        Self {
            handle: Arc::new(Mutex::new(resource)),
            dispatcher,
            state: Lifecycle::Open,
            name: name.into(),
            mode,
            capabilities,
        }
    }

    async fn run<T, F>(&mut self, operation: &'static str, op: F) -> Result<T>
    where
        F: FnOnce(&mut R) -> io::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.state.ensure_open(operation)?;
        let guard = Arc::clone(&self.handle).lock_owned().await;
        trace!("dispatching {operation} on {}", self.name.display());
        let result = self
            .dispatcher
            .dispatch(move || {
                let mut guard = guard;
                op(&mut *guard)
            })
            .await?;
        Ok(result?)
    }

    /// Read up to `size` units, or everything up to EOF for `None`.
    pub async fn read(&mut self, size: Option<usize>) -> Result<R::Buf> {
        self.run("read", move |file| file.read(size)).await
    }

    /// Read one line, at most `limit` units long.
    pub async fn readline(&mut self, limit: Option<usize>) -> Result<R::Buf> {
        self.run("readline", move |file| file.readline(limit)).await
    }

    /// Read all remaining lines, stopping once their total length reaches `hint`.
    pub async fn readlines(&mut self, hint: Option<usize>) -> Result<Vec<R::Buf>> {
        self.run("readlines", move |file| file.readlines(hint)).await
    }

    /// Write `data`, returning how many units were written.
    pub async fn write(&mut self, data: R::Buf) -> Result<usize> {
        self.run("write", move |file| file.write(&data)).await
    }

    /// Write each line in order, in a single worker call.
    pub async fn writelines(&mut self, lines: Vec<R::Buf>) -> Result<()> {
        self.run("writelines", move |file| {
            for line in &lines {
                file.write(line)?;
            }
            Ok(())
        })
        .await
    }

    /// Flush buffered writes.
    pub async fn flush(&mut self) -> Result<()> {
        self.run("flush", |file| file.flush()).await
    }

    /// Move the stream position, returning the new position.
    pub async fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        self.run("seek", move |file| file.seek(pos)).await
    }

    /// Current stream position.
    pub async fn tell(&mut self) -> Result<u64> {
        self.run("tell", |file| file.tell()).await
    }

    /// Resize the file to `size`, or to the current position for `None`.
    pub async fn truncate(&mut self, size: Option<u64>) -> Result<u64> {
        self.run("truncate", move |file| file.truncate(size)).await
    }

    /// Close the resource.
    ///
    /// Closing an already closed facade succeeds immediately. The facade is
    /// marked closed even when the resource reports an error while closing.
    pub async fn close(&mut self) -> Result<()> {
        if !self.state.begin_close()? {
            return Ok(());
        }

        let guard = Arc::clone(&self.handle).lock_owned().await;
        // The job owns the lock from here on, so the close happens even if
        // this call is dropped.
        self.state = Lifecycle::Closed;
        debug!("closing {}", self.name.display());
        let result = self
            .dispatcher
            .dispatch(move || {
                let mut guard = guard;
                guard.close()
            })
            .await;
        Ok(result??)
    }

    /// Release the inner handle of a layered resource.
    ///
    /// Runs on the calling task. Afterwards every operation fails with
    /// [`ThreadIoError::Detached`].
    ///
    /// # Errors
    ///
    /// - [`ThreadIoError::Unsupported`] if the resource has no inner layer;
    ///   the facade stays open
    /// - [`ThreadIoError::Busy`] if a cancelled call is still running on a
    ///   worker
    pub fn detach(&mut self) -> Result<R::Detached> {
        self.state.ensure_open("detach")?;
        let mut guard = self
            .handle
            .try_lock()
            .map_err(|_| ThreadIoError::busy("detach"))?;
        let inner = guard.detach()?;
        drop(guard);

        debug!("detached {}", self.name.display());
        self.state = Lifecycle::Detached;
        Ok(inner)
    }

    /// Whether the facade has been closed.
    pub fn is_closed(&self) -> bool {
        self.state.is_closed()
    }

    /// Whether the inner handle has been detached.
    pub fn is_detached(&self) -> bool {
        self.state.is_detached()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> Lifecycle {
        self.state
    }

    /// Whether the resource was opened for reading.
    pub fn readable(&self) -> bool {
        self.capabilities.readable
    }

    /// Whether the resource was opened for writing.
    pub fn writable(&self) -> bool {
        self.capabilities.writable
    }

    /// Whether the resource supports seeking.
    pub fn seekable(&self) -> bool {
        self.capabilities.seekable
    }

    /// Path the resource was opened from.
    pub fn name(&self) -> &Path {
        &self.name
    }

    /// Mode the resource was opened with.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// The dispatcher used for this facade.
    pub fn dispatcher(&self) -> &D {
        &self.dispatcher
    }
}

impl<R: BinaryIo, D: Dispatcher> AsyncFile<R, D> {
    /// Read into `buffer`, handing it back with the number of bytes read.
    ///
    /// The buffer travels to the worker and back, so it is taken by value.
    pub async fn readinto(&mut self, buffer: Vec<u8>) -> Result<ReadInto> {
        self.run("readinto", move |file| {
            let mut buffer = buffer;
            let bytes_count = file.readinto(&mut buffer)?;
            Ok(ReadInto {
                buffer,
                bytes_count,
            })
        })
        .await
    }

    /// Read everything up to end of file.
    pub async fn readall(&mut self) -> Result<Vec<u8>> {
        self.run("readall", |file| file.readall()).await
    }
}

impl<R: BlockingIo, D: Dispatcher> Drop for AsyncFile<R, D> {
    fn drop(&mut self) {
        if self.state != Lifecycle::Open {
            return;
        }
        trace!("releasing {} on a worker", self.name.display());
        let handle = Arc::clone(&self.handle);
        // Dispatch starts the job right away; nobody waits for it.
        drop(self.dispatcher.dispatch(move || drop(handle)));
    }
}

impl<R: BlockingIo, D: Dispatcher> fmt::Debug for AsyncFile<R, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncFile")
            .field("name", &self.name)
            .field("mode", &self.mode)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
