//! Open modes and open options.
//!
//! Modes use the familiar `fopen`-style letters:
//!
//! | letter | meaning |
//! |--------|---------|
//! | `r`    | open for reading (file must exist) |
//! | `w`    | open for writing, truncating the file first |
//! | `a`    | open for writing, appending to the end |
//! | `x`    | create a new file and open it for writing |
//! | `+`    | open for updating (reading and writing) |
//! | `b`    | binary flavour |
//! | `t`    | text flavour |
//!
//! [`OpenOptions`] bundles the mode with the buffer size, text encoding, and
//! compression level. It is (de)serializable so it can live in a config file.

use crate::error::{Result, ThreadIoError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default buffer size for buffered layers (8KB).
pub const DEFAULT_BUFFER_SIZE: usize = 8 * 1024;

/// What the file is opened for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// `r`
    Read,
    /// `w`
    Write,
    /// `a`
    Append,
    /// `x`
    CreateNew,
}

impl Access {
    fn letter(self) -> char {
        match self {
            Self::Read => 'r',
            Self::Write => 'w',
            Self::Append => 'a',
            Self::CreateNew => 'x',
        }
    }
}

/// Binary or text flavour of a mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    /// No `b` or `t` letter; the opener picks its own default.
    Unspecified,
    /// `b`
    Binary,
    /// `t`
    Text,
}

/// A parsed open mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Mode {
    access: Access,
    update: bool,
    flavor: Flavor,
}

impl Mode {
    /// Plain read mode, `r`.
    pub const READ: Self = Self {
        access: Access::Read,
        update: false,
        flavor: Flavor::Unspecified,
    };

    /// Parse a mode string.
    pub fn parse(mode: &str) -> Result<Self> {
        let mut access = None;
        let mut update = false;
        let mut flavor = Flavor::Unspecified;
        let mut seen = String::with_capacity(mode.len());

        for letter in mode.chars() {
            if seen.contains(letter) {
                return Err(ThreadIoError::invalid_mode(mode, "repeated letter"));
            }
            seen.push(letter);

            let next = match letter {
                'r' => Access::Read,
                'w' => Access::Write,
                'a' => Access::Append,
                'x' => Access::CreateNew,
                '+' => {
                    update = true;
                    continue;
                }
                'b' | 't' => {
                    if flavor != Flavor::Unspecified {
                        return Err(ThreadIoError::invalid_mode(
                            mode,
                            "can't have text and binary mode at once",
                        ));
                    }
                    flavor = if letter == 'b' {
                        Flavor::Binary
                    } else {
                        Flavor::Text
                    };
                    continue;
                }
                other => {
                    return Err(ThreadIoError::invalid_mode(
                        mode,
                        format!("unknown letter {other:?}"),
                    ));
                }
            };

            if access.replace(next).is_some() {
                return Err(ThreadIoError::invalid_mode(
                    mode,
                    "must have exactly one of create/read/write/append mode",
                ));
            }
        }

        let access = access.ok_or_else(|| {
            ThreadIoError::invalid_mode(
                mode,
                "must have exactly one of create/read/write/append mode",
            )
        })?;

        Ok(Self {
            access,
            update,
            flavor,
        })
    }

    /// The access letter.
    pub fn access(&self) -> Access {
        self.access
    }

    /// Whether `+` was given.
    pub fn is_update(&self) -> bool {
        self.update
    }

    /// The flavour as written in the mode string.
    pub fn flavor(&self) -> Flavor {
        self.flavor
    }

    /// The flavour, falling back to `default` when none was written.
    pub fn resolve_flavor(&self, default: Flavor) -> Flavor {
        match self.flavor {
            Flavor::Unspecified => default,
            explicit => explicit,
        }
    }

    /// Whether reads are allowed.
    pub fn readable(&self) -> bool {
        self.access == Access::Read || self.update
    }

    /// Whether writes are allowed.
    pub fn writable(&self) -> bool {
        self.access != Access::Read || self.update
    }

    /// Translate to [`std::fs::OpenOptions`].
    pub fn to_std(&self) -> std::fs::OpenOptions {
        let mut options = std::fs::OpenOptions::new();
        options.read(self.readable());
        match self.access {
            Access::Read => {
                options.write(self.update);
            }
            Access::Write => {
                options.write(true).create(true).truncate(true);
            }
            Access::Append => {
                options.append(true).create(true);
            }
            Access::CreateNew => {
                options.write(true).create_new(true);
            }
        }
        options
    }
}

impl Default for Mode {
    fn default() -> Self {
        Self::READ
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.access.letter())?;
        if self.update {
            f.write_str("+")?;
        }
        match self.flavor {
            Flavor::Unspecified => Ok(()),
            Flavor::Binary => f.write_str("b"),
            Flavor::Text => f.write_str("t"),
        }
    }
}

impl FromStr for Mode {
    type Err = ThreadIoError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Mode {
    type Error = ThreadIoError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Mode> for String {
    fn from(mode: Mode) -> Self {
        mode.to_string()
    }
}

/// Compression level for writers that support it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct CompressionLevel(u8);

impl CompressionLevel {
    /// No compression (store only).
    pub const NONE: Self = Self(0);
    /// Fastest compression.
    pub const FAST: Self = Self(1);
    /// Default compression (balanced).
    pub const DEFAULT: Self = Self(6);
    /// Best compression (slowest).
    pub const BEST: Self = Self(9);

    /// Create a compression level, rejecting anything outside 0..=9.
    pub fn new(level: i64) -> Result<Self> {
        u8::try_from(level)
            .ok()
            .filter(|level| *level <= 9)
            .map(Self)
            .ok_or_else(|| ThreadIoError::invalid_level(level))
    }

    /// Get the level value.
    pub fn level(&self) -> u8 {
        self.0
    }
}

impl Default for CompressionLevel {
    fn default() -> Self {
        Self::BEST
    }
}

impl TryFrom<i64> for CompressionLevel {
    type Error = ThreadIoError;

    fn try_from(level: i64) -> Result<Self> {
        Self::new(level)
    }
}

impl From<CompressionLevel> for u8 {
    fn from(level: CompressionLevel) -> Self {
        level.0
    }
}

/// Options controlling how a file is opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenOptions {
    /// Open mode.
    pub mode: Mode,
    /// Size of the read-ahead and write buffers, in bytes.
    pub buffer_size: usize,
    /// Text encoding label (text modes only). `None` means UTF-8.
    pub encoding: Option<String>,
    /// Compression level used by compressing writers.
    pub compress_level: CompressionLevel,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            encoding: None,
            compress_level: CompressionLevel::default(),
        }
    }
}

impl OpenOptions {
    /// Default options with the given mode string.
    pub fn for_mode(mode: &str) -> Result<Self> {
        Ok(Self {
            mode: Mode::parse(mode)?,
            ..Self::default()
        })
    }

    /// Set the mode.
    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the buffer size.
    pub fn buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// Set the text encoding label.
    pub fn encoding(mut self, label: impl Into<String>) -> Self {
        self.encoding = Some(label.into());
        self
    }

    /// Set the compression level.
    pub fn compress_level(mut self, level: CompressionLevel) -> Self {
        self.compress_level = level;
        self
    }

    /// Check the options against the flavour the opener will use.
    ///
    /// Runs on the caller before anything is dispatched to a worker.
    pub fn validate(&self, flavor: Flavor) -> Result<()> {
        if self.buffer_size == 0 {
            return Err(ThreadIoError::invalid_argument(
                "buffer size must be greater than zero",
            ));
        }
        match (flavor, &self.encoding) {
            (Flavor::Binary, Some(_)) => Err(ThreadIoError::invalid_argument(
                "binary mode doesn't take an encoding argument",
            )),
            (Flavor::Text, Some(label)) => {
                crate::text::lookup_encoding(label, self.mode.writable()).map(|_| ())
            }
            _ => Ok(()),
        }
    }
}
