//! # ThreadIO Gzip
//!
//! Gzip-compressed files behind the [`AsyncFile`] facade.
//!
//! Compression and decompression run on worker threads together with the
//! file I/O. A mode without `b` or `t` opens a binary file; [`open_text`]
//! layers UTF-8 (or the configured encoding) over the decompressed bytes.
//!
//! ## Example
//!
//! ```rust,no_run
//! use threadio_core::{CompressionLevel, OpenOptions};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> threadio_core::Result<()> {
//! let options = OpenOptions::for_mode("wb")?.compress_level(CompressionLevel::FAST);
//! let mut file = threadio_gzip::open("log.gz", options).await?;
//! file.write(b"first entry\n".to_vec()).await?;
//! file.close().await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod file;

pub use file::GzipFile;

use std::path::Path;
use threadio_core::{
    AsyncFile, Dispatcher, Flavor, OpenOptions, Result, TextFile, ThreadIoError, TokioDispatcher,
};

/// Async binary gzip file.
pub type GzipBinaryFile<D = TokioDispatcher> = AsyncFile<GzipFile, D>;

/// Async text gzip file.
pub type GzipTextFile<D = TokioDispatcher> = AsyncFile<TextFile<GzipFile>, D>;

/// Open a gzip file in binary mode on Tokio's blocking pool.
pub async fn open(path: impl AsRef<Path>, options: OpenOptions) -> Result<GzipBinaryFile> {
    open_with(path, options, TokioDispatcher::new()).await
}

/// Open a gzip file in binary mode, running its operations through `dispatcher`.
pub async fn open_with<D: Dispatcher>(
    path: impl AsRef<Path>,
    options: OpenOptions,
    dispatcher: D,
) -> Result<GzipBinaryFile<D>> {
    check_options(&options, Flavor::Binary)?;
    let path = path.as_ref().to_path_buf();
    let name = path.clone();
    let mode = options.mode;
    AsyncFile::open_with(name, mode, dispatcher, move || GzipFile::open(&path, &options)).await
}

/// Open a gzip file in text mode on Tokio's blocking pool.
pub async fn open_text(path: impl AsRef<Path>, options: OpenOptions) -> Result<GzipTextFile> {
    open_text_with(path, options, TokioDispatcher::new()).await
}

/// Open a gzip file in text mode, running its operations through `dispatcher`.
///
/// Accepts modes with `t` or without a flavour letter.
pub async fn open_text_with<D: Dispatcher>(
    path: impl AsRef<Path>,
    options: OpenOptions,
    dispatcher: D,
) -> Result<GzipTextFile<D>> {
    check_options(&options, Flavor::Text)?;
    let path = path.as_ref().to_path_buf();
    let name = path.clone();
    let mode = options.mode;
    AsyncFile::open_with(name, mode, dispatcher, move || {
        let gzip = GzipFile::open(&path, &options)?;
        TextFile::with_options(gzip, &options)
    })
    .await
}

fn check_options(options: &OpenOptions, wanted: Flavor) -> Result<()> {
    let mode = options.mode;
    if mode.is_update() {
        return Err(ThreadIoError::invalid_mode(
            mode.to_string(),
            "gzip files can't be opened for update",
        ));
    }
    if mode.resolve_flavor(wanted) != wanted {
        let reason = match wanted {
            Flavor::Text => "binary mode needs a binary open",
            _ => "text mode needs a text open",
        };
        return Err(ThreadIoError::invalid_mode(mode.to_string(), reason));
    }
    options.validate(wanted)
}
