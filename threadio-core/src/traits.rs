//! Core traits for blocking resources.
//!
//! [`BlockingIo`] lists every operation an [`AsyncFile`](crate::AsyncFile)
//! forwards to a worker. Implementations perform ordinary blocking I/O; they
//! are never called on the scheduler thread (except [`BlockingIo::detach`]).

use crate::error::{Result, ThreadIoError};
use crate::options::DEFAULT_BUFFER_SIZE;
use std::io::{self, SeekFrom};

/// Data unit produced and consumed by a resource (`Vec<u8>` or `String`).
pub trait IoBuf: Send + 'static {
    /// Length as counted by `readlines` size hints.
    fn len(&self) -> usize;

    /// Whether the buffer is empty (end of file for reads).
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl IoBuf for Vec<u8> {
    fn len(&self) -> usize {
        Vec::len(self)
    }
}

impl IoBuf for String {
    fn len(&self) -> usize {
        String::len(self)
    }
}

/// Static capabilities of a resource, fixed at open time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    /// Reads are allowed.
    pub readable: bool,
    /// Writes are allowed.
    pub writable: bool,
    /// Seeking is allowed.
    pub seekable: bool,
}

/// A blocking file-like resource.
pub trait BlockingIo: Send + 'static {
    /// Unit of data read and written.
    type Buf: IoBuf;

    /// Inner handle released by [`detach`](Self::detach).
    type Detached: Send + 'static;

    /// Capabilities of this resource.
    fn capabilities(&self) -> Capabilities;

    /// Read up to `size` units, or everything up to EOF for `None`.
    ///
    /// Returns fewer than `size` units only at end of file.
    fn read(&mut self, size: Option<usize>) -> io::Result<Self::Buf>;

    /// Read one line including its terminating `\n`, at most `limit` units.
    fn readline(&mut self, limit: Option<usize>) -> io::Result<Self::Buf>;

    /// Read lines until EOF, or until their total length reaches `hint`.
    fn readlines(&mut self, hint: Option<usize>) -> io::Result<Vec<Self::Buf>> {
        let mut lines = Vec::new();
        let mut total = 0usize;
        loop {
            let line = self.readline(None)?;
            if line.is_empty() {
                break;
            }
            total += line.len();
            lines.push(line);
            if hint.is_some_and(|hint| hint > 0 && total >= hint) {
                break;
            }
        }
        Ok(lines)
    }

    /// Write `data`, returning how many units were accepted.
    fn write(&mut self, data: &Self::Buf) -> io::Result<usize>;

    /// Flush buffered writes down to the operating system.
    fn flush(&mut self) -> io::Result<()>;

    /// Move the stream position.
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64>;

    /// Current stream position.
    fn tell(&mut self) -> io::Result<u64> {
        self.seek(SeekFrom::Current(0))
    }

    /// Resize the file to `size` (default: current position).
    ///
    /// The stream position is left unchanged.
    fn truncate(&mut self, size: Option<u64>) -> io::Result<u64>;

    /// Close the resource. Closing twice is a no-op.
    fn close(&mut self) -> io::Result<()>;

    /// Whether the resource has been closed.
    fn is_closed(&self) -> bool;

    /// Release the inner handle.
    ///
    /// Only layered resources support this; the default refuses.
    fn detach(&mut self) -> Result<Self::Detached> {
        Err(ThreadIoError::unsupported(
            "detach",
            "resource has no detachable inner stream",
        ))
    }
}

/// A blocking resource producing bytes.
pub trait BinaryIo: BlockingIo<Buf = Vec<u8>> {
    /// Fill `buf` as far as possible, returning the number of bytes read.
    ///
    /// Returns less than `buf.len()` only at end of file.
    fn readinto(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Read everything up to end of file.
    fn readall(&mut self) -> io::Result<Vec<u8>> {
        let mut data = Vec::new();
        loop {
            let chunk = self.read(Some(DEFAULT_BUFFER_SIZE))?;
            if chunk.is_empty() {
                return Ok(data);
            }
            data.extend_from_slice(&chunk);
        }
    }
}

/// Output of a `readinto` call: the caller's buffer and the filled length.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ReadInto {
    /// The buffer handed to `readinto`.
    pub buffer: Vec<u8>,

    /// The amount of bytes that have been read.
    pub bytes_count: usize,
}

impl ReadInto {
    /// The bytes that were read.
    pub fn bytes(&self) -> &[u8] {
        &self.buffer[..self.bytes_count]
    }
}

/// Error for an operation on a resource that was already closed.
pub fn closed_error() -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, "I/O operation on closed file")
}

/// Error for an operation the open mode does not allow.
pub fn not_permitted(operation: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::Unsupported,
        format!("File not open for {operation}"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read};

    /// Minimal in-memory resource that only reads.
    struct Lines(Cursor<Vec<u8>>);

    impl BlockingIo for Lines {
        type Buf = Vec<u8>;
        type Detached = ();

        fn capabilities(&self) -> Capabilities {
            Capabilities {
                readable: true,
                ..Capabilities::default()
            }
        }

        fn read(&mut self, size: Option<usize>) -> io::Result<Vec<u8>> {
            let mut out = Vec::new();
            match size {
                Some(size) => (&mut self.0).take(size as u64).read_to_end(&mut out)?,
                None => self.0.read_to_end(&mut out)?,
            };
            Ok(out)
        }

        fn readline(&mut self, _limit: Option<usize>) -> io::Result<Vec<u8>> {
            let mut out = Vec::new();
            let mut byte = [0u8; 1];
            while self.0.read(&mut byte)? == 1 {
                out.push(byte[0]);
                if byte[0] == b'\n' {
                    break;
                }
            }
            Ok(out)
        }

        fn write(&mut self, _data: &Vec<u8>) -> io::Result<usize> {
            Err(not_permitted("writing"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }

        fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
            std::io::Seek::seek(&mut self.0, pos)
        }

        fn truncate(&mut self, _size: Option<u64>) -> io::Result<u64> {
            Err(not_permitted("writing"))
        }

        fn close(&mut self) -> io::Result<()> {
            Ok(())
        }

        fn is_closed(&self) -> bool {
            false
        }
    }

    impl BinaryIo for Lines {
        fn readinto(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.0.read(buf)
        }
    }

    fn sample() -> Lines {
        Lines(Cursor::new(b"one\ntwo\nthree\n".to_vec()))
    }

    #[test]
    fn test_readlines_default() {
        let lines = sample().readlines(None).expect("readlines");
        assert_eq!(lines, vec![b"one\n".to_vec(), b"two\n".to_vec(), b"three\n".to_vec()]);
    }

    #[test]
    fn test_readlines_hint_stops_early() {
        let lines = sample().readlines(Some(5)).expect("readlines");
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn test_readall_default() {
        let mut lines = sample();
        lines.seek(SeekFrom::Start(4)).expect("seek");
        assert_eq!(lines.tell().expect("tell"), 4);
        assert_eq!(lines.readall().expect("readall"), b"two\nthree\n");
        assert!(lines.readall().expect("readall").is_empty());
    }

    #[test]
    fn test_default_detach_is_unsupported() {
        let err = sample().detach().unwrap_err();
        assert!(matches!(err, ThreadIoError::Unsupported { operation: "detach", .. }));
    }

    #[test]
    fn test_read_into_bytes() {
        let output = ReadInto {
            buffer: b"abcd".to_vec(),
            bytes_count: 2,
        };
        assert_eq!(output.bytes(), b"ab");
    }
}
