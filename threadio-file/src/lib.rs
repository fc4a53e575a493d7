//! # ThreadIO File
//!
//! Plain files behind the [`AsyncFile`] facade.
//!
//! Files are opened on a worker and read and written through a
//! [`BufferedFile`]. Binary handles move `Vec<u8>`; text handles decode
//! through [`TextFile`] and move `String`.
//!
//! A mode without `b` or `t` opens a text file, so [`open`] needs an explicit
//! `b`.
//!
//! ## Example
//!
//! ```rust,no_run
//! use threadio_core::OpenOptions;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> threadio_core::Result<()> {
//! let mut file = threadio_file::open_text("notes.txt", OpenOptions::for_mode("r")?).await?;
//! loop {
//!     let line = file.readline(None).await?;
//!     if line.is_empty() {
//!         break;
//!     }
//!     print!("{line}");
//! }
//! file.close().await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod buffered;

pub use buffered::BufferedFile;

use std::path::Path;
use threadio_core::{
    AsyncFile, Dispatcher, Flavor, OpenOptions, Result, TextFile, ThreadIoError, TokioDispatcher,
};

/// Async binary file.
pub type BinaryFile<D = TokioDispatcher> = AsyncFile<BufferedFile, D>;

/// Async text file.
pub type TextFileHandle<D = TokioDispatcher> = AsyncFile<TextFile<BufferedFile>, D>;

/// Open a binary file on Tokio's blocking pool.
pub async fn open(path: impl AsRef<Path>, options: OpenOptions) -> Result<BinaryFile> {
    open_with(path, options, TokioDispatcher::new()).await
}

/// Open a binary file, running its operations through `dispatcher`.
pub async fn open_with<D: Dispatcher>(
    path: impl AsRef<Path>,
    options: OpenOptions,
    dispatcher: D,
) -> Result<BinaryFile<D>> {
    check_flavor(&options, Flavor::Binary)?;
    let path = path.as_ref().to_path_buf();
    let name = path.clone();
    let mode = options.mode;
    AsyncFile::open_with(name, mode, dispatcher, move || {
        BufferedFile::open(&path, &options)
    })
    .await
}

/// Open a text file on Tokio's blocking pool.
pub async fn open_text(path: impl AsRef<Path>, options: OpenOptions) -> Result<TextFileHandle> {
    open_text_with(path, options, TokioDispatcher::new()).await
}

/// Open a text file, running its operations through `dispatcher`.
///
/// The encoding defaults to UTF-8.
pub async fn open_text_with<D: Dispatcher>(
    path: impl AsRef<Path>,
    options: OpenOptions,
    dispatcher: D,
) -> Result<TextFileHandle<D>> {
    check_flavor(&options, Flavor::Text)?;
    let path = path.as_ref().to_path_buf();
    let name = path.clone();
    let mode = options.mode;
    AsyncFile::open_with(name, mode, dispatcher, move || {
        let buffered = BufferedFile::open(&path, &options)?;
        TextFile::with_options(buffered, &options)
    })
    .await
}

fn check_flavor(options: &OpenOptions, wanted: Flavor) -> Result<()> {
    if options.mode.resolve_flavor(Flavor::Text) != wanted {
        let reason = match wanted {
            Flavor::Binary => "binary files need a 'b' mode",
            _ => "text files can't be opened in binary mode",
        };
        return Err(ThreadIoError::invalid_mode(options.mode.to_string(), reason));
    }
    options.validate(wanted)
}
