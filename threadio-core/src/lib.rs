//! # ThreadIO Core
//!
//! Core components for running blocking file objects from async code.
//!
//! This crate provides the building blocks shared by every ThreadIO backend:
//!
//! - [`facade`]: [`AsyncFile`], the async wrapper around a blocking resource
//! - [`dispatch`]: worker pools that run blocking jobs (Tokio, Rayon)
//! - [`traits`]: the blocking resource contract ([`BlockingIo`], [`BinaryIo`])
//! - [`text`]: character decoding over any binary resource
//! - [`options`]: open modes, buffer sizes, encodings, compression levels
//! - [`lifecycle`]: open/closed/detached state of a facade
//! - [`error`]: Error types
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ Facade: AsyncFile                                       │
//! │     lifecycle checks, FIFO lock, result relay           │
//! ├─────────────────────────────────────────────────────────┤
//! │ Dispatch                                                │
//! │     TokioDispatcher (spawn_blocking), RayonDispatcher   │
//! ├─────────────────────────────────────────────────────────┤
//! │ Blocking resource                                       │
//! │     TextFile<B>, BufferedFile, GzipFile                 │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use threadio_core::text::lookup_encoding;
//! use threadio_core::{Flavor, Mode, OpenOptions};
//!
//! let options = OpenOptions::for_mode("r+b").unwrap().buffer_size(4096);
//! assert!(options.mode.readable() && options.mode.writable());
//! assert_eq!(options.mode.flavor(), Flavor::Binary);
//!
//! let mode: Mode = "w".parse().unwrap();
//! assert_eq!(mode.resolve_flavor(Flavor::Binary), Flavor::Binary);
//!
//! assert_eq!(lookup_encoding("latin1", true).unwrap().name(), "windows-1252");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod dispatch;
pub mod error;
pub mod facade;
pub mod lifecycle;
pub mod options;
pub mod text;
pub mod traits;

#[cfg(test)]
mod testing;

// Re-exports for convenience
pub use dispatch::{Dispatched, Dispatcher, RayonDispatcher, TokioDispatcher};
pub use error::{ErrorCategory, Result, ThreadIoError};
pub use facade::AsyncFile;
pub use lifecycle::Lifecycle;
pub use options::{Access, CompressionLevel, DEFAULT_BUFFER_SIZE, Flavor, Mode, OpenOptions};
pub use text::TextFile;
pub use traits::{BinaryIo, BlockingIo, Capabilities, IoBuf, ReadInto};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::dispatch::{Dispatcher, RayonDispatcher, TokioDispatcher};
    pub use crate::error::{Result, ThreadIoError};
    pub use crate::facade::AsyncFile;
    pub use crate::options::{CompressionLevel, Mode, OpenOptions};
    pub use crate::traits::{BinaryIo, BlockingIo};
}
