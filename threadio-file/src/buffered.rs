//! Buffered random-access layer over a raw file.

use log::{debug, warn};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use threadio_core::error::Result;
use threadio_core::options::{Access, Mode, OpenOptions};
use threadio_core::traits::{BinaryIo, BlockingIo, Capabilities, closed_error, not_permitted};

/// A plain file with a read-ahead buffer and a write buffer.
///
/// At most one of the two buffers holds data at any time: reading flushes
/// pending writes, and writing rewinds the file over unread read-ahead.
#[derive(Debug)]
pub struct BufferedFile {
    raw: Option<File>,
    path: PathBuf,
    mode: Mode,
    capacity: usize,
    read_buf: Vec<u8>,
    read_pos: usize,
    write_buf: Vec<u8>,
}

impl BufferedFile {
    /// Open `path` as described by `options`.
    pub fn open(path: impl AsRef<Path>, options: &OpenOptions) -> Result<Self> {
        let path = path.as_ref();
        let mut raw = options.mode.to_std().open(path)?;
        if options.mode.access() == Access::Append {
            raw.seek(SeekFrom::End(0))?;
        }
        debug!("opened {} (mode {})", path.display(), options.mode);
        Ok(Self::from_raw(raw, path, options.mode, options.buffer_size))
    }

    /// Wrap an already open file. `mode` must match how `raw` was opened.
    pub fn from_raw(raw: File, path: impl Into<PathBuf>, mode: Mode, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            raw: Some(raw),
            path: path.into(),
            mode,
            capacity,
            read_buf: Vec::with_capacity(capacity),
            read_pos: 0,
            write_buf: Vec::with_capacity(capacity),
        }
    }

    /// Path the file was opened with.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The open mode.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    fn raw(&mut self) -> io::Result<&mut File> {
        self.raw.as_mut().ok_or_else(closed_error)
    }

    fn unread(&self) -> &[u8] {
        &self.read_buf[self.read_pos..]
    }

    fn ensure_readable(&mut self) -> io::Result<()> {
        self.raw()?;
        if self.mode.readable() {
            Ok(())
        } else {
            Err(not_permitted("reading"))
        }
    }

    fn ensure_writable(&mut self) -> io::Result<()> {
        self.raw()?;
        if self.mode.writable() {
            Ok(())
        } else {
            Err(not_permitted("writing"))
        }
    }

    fn flush_writes(&mut self) -> io::Result<()> {
        if self.write_buf.is_empty() {
            return Ok(());
        }
        let raw = self.raw.as_mut().ok_or_else(closed_error)?;
        raw.write_all(&self.write_buf)?;
        self.write_buf.clear();
        Ok(())
    }

    /// Rewind the OS position over unread read-ahead and drop it.
    fn drop_readahead(&mut self) -> io::Result<()> {
        let unread = self.unread().len();
        if unread > 0 {
            self.raw()?.seek(SeekFrom::Current(-(unread as i64)))?;
        }
        self.read_buf.clear();
        self.read_pos = 0;
        Ok(())
    }

    /// Refill the read-ahead buffer. Returns `false` at end of file.
    fn fill(&mut self) -> io::Result<bool> {
        self.flush_writes()?;
        let raw = self.raw.as_mut().ok_or_else(closed_error)?;
        self.read_buf.resize(self.capacity, 0);
        let count = loop {
            match raw.read(&mut self.read_buf) {
                Ok(count) => break count,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    self.read_buf.clear();
                    self.read_pos = 0;
                    return Err(err);
                }
            }
        };
        self.read_buf.truncate(count);
        self.read_pos = 0;
        Ok(count > 0)
    }

    fn consume(&mut self, out: &mut Vec<u8>, max: usize) -> usize {
        let available = self.unread();
        let count = available.len().min(max);
        out.extend_from_slice(&available[..count]);
        self.read_pos += count;
        count
    }
}

impl BlockingIo for BufferedFile {
    type Buf = Vec<u8>;
    type Detached = File;

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            readable: self.mode.readable(),
            writable: self.mode.writable(),
            seekable: true,
        }
    }

    fn read(&mut self, size: Option<usize>) -> io::Result<Vec<u8>> {
        self.ensure_readable()?;
        self.flush_writes()?;
        let mut out = Vec::new();
        match size {
            Some(size) => {
                while out.len() < size {
                    if self.read_pos == self.read_buf.len() && !self.fill()? {
                        break;
                    }
                    let wanted = size - out.len();
                    self.consume(&mut out, wanted);
                }
            }
            None => {
                self.consume(&mut out, usize::MAX);
                self.read_buf.clear();
                self.read_pos = 0;
                self.raw()?.read_to_end(&mut out)?;
            }
        }
        Ok(out)
    }

    fn readline(&mut self, limit: Option<usize>) -> io::Result<Vec<u8>> {
        self.ensure_readable()?;
        self.flush_writes()?;
        let limit = limit.unwrap_or(usize::MAX);
        let mut out = Vec::new();
        while out.len() < limit {
            if self.read_pos == self.read_buf.len() && !self.fill()? {
                break;
            }
            let wanted = limit - out.len();
            let line_end = self
                .unread()
                .iter()
                .position(|&byte| byte == b'\n')
                .map(|index| index + 1);
            match line_end {
                Some(end) if end <= wanted => {
                    self.consume(&mut out, end);
                    break;
                }
                _ => {
                    self.consume(&mut out, wanted);
                }
            }
        }
        Ok(out)
    }

    fn write(&mut self, data: &Vec<u8>) -> io::Result<usize> {
        self.ensure_writable()?;
        self.drop_readahead()?;
        self.write_buf.extend_from_slice(data);
        if self.write_buf.len() >= self.capacity {
            self.flush_writes()?;
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_writes()?;
        self.raw()?.flush()
    }

    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.raw()?;
        self.flush_writes()?;
        self.drop_readahead()?;
        self.raw()?.seek(pos)
    }

    fn tell(&mut self) -> io::Result<u64> {
        let unread = self.unread().len() as u64;
        let pending = self.write_buf.len() as u64;
        let position = self.raw()?.stream_position()?;
        Ok(position - unread + pending)
    }

    fn truncate(&mut self, size: Option<u64>) -> io::Result<u64> {
        self.ensure_writable()?;
        let position = self.tell()?;
        self.flush_writes()?;
        self.drop_readahead()?;
        let size = size.unwrap_or(position);
        self.raw()?.set_len(size)?;
        Ok(size)
    }

    fn close(&mut self) -> io::Result<()> {
        if self.raw.is_none() {
            return Ok(());
        }
        let flushed = self.flush_writes();
        self.raw = None;
        self.read_buf.clear();
        self.read_pos = 0;
        self.write_buf.clear();
        debug!("closed {}", self.path.display());
        flushed
    }

    fn is_closed(&self) -> bool {
        self.raw.is_none()
    }

    fn detach(&mut self) -> Result<File> {
        self.raw()?;
        self.flush_writes()?;
        self.drop_readahead()?;
        let raw = self.raw.take().ok_or_else(closed_error)?;
        debug!("detached {}", self.path.display());
        Ok(raw)
    }
}

impl BinaryIo for BufferedFile {
    fn readinto(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let data = self.read(Some(buf.len()))?;
        buf[..data.len()].copy_from_slice(&data);
        Ok(data.len())
    }

    fn readall(&mut self) -> io::Result<Vec<u8>> {
        self.read(None)
    }
}

impl Drop for BufferedFile {
    fn drop(&mut self) {
        if self.write_buf.is_empty() {
            return;
        }
        if let Err(err) = self.flush_writes() {
            warn!("failed to flush {} on drop: {err}", self.path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn open(dir: &TempDir, name: &str, mode: &str, capacity: usize) -> BufferedFile {
        let options = OpenOptions::for_mode(mode)
            .expect("mode")
            .buffer_size(capacity);
        BufferedFile::open(dir.path().join(name), &options).expect("open")
    }

    #[test]
    fn test_reads_across_buffer_refills() {
        let dir = TempDir::new().expect("tempdir");
        fs::write(dir.path().join("data"), b"0123456789abcdef").expect("write");

        let mut file = open(&dir, "data", "rb", 4);
        assert_eq!(file.read(Some(6)).expect("read"), b"012345");
        assert_eq!(file.tell().expect("tell"), 6);
        assert_eq!(file.read(None).expect("read"), b"6789abcdef");
        assert!(file.read(Some(1)).expect("read").is_empty());
    }

    #[test]
    fn test_readline_with_limit() {
        let dir = TempDir::new().expect("tempdir");
        fs::write(dir.path().join("data"), b"first line\nsecond\n").expect("write");

        let mut file = open(&dir, "data", "rb", 3);
        assert_eq!(file.readline(Some(5)).expect("readline"), b"first");
        assert_eq!(file.readline(None).expect("readline"), b" line\n");
        assert_eq!(file.readline(None).expect("readline"), b"second\n");
        assert!(file.readline(None).expect("readline").is_empty());
    }

    #[test]
    fn test_write_is_buffered_until_flush() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("data");

        let mut file = open(&dir, "data", "wb", 64);
        file.write(&b"abc".to_vec()).expect("write");
        assert_eq!(file.tell().expect("tell"), 3);
        assert!(fs::read(&path).expect("read").is_empty());

        file.flush().expect("flush");
        assert_eq!(fs::read(&path).expect("read"), b"abc");
    }

    #[test]
    fn test_write_after_read_lands_at_logical_position() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("data");
        fs::write(&path, b"0123456789").expect("write");

        let mut file = open(&dir, "data", "r+b", 8);
        assert_eq!(file.read(Some(2)).expect("read"), b"01");
        file.write(&b"ab".to_vec()).expect("write");
        assert_eq!(file.read(Some(2)).expect("read"), b"45");
        file.close().expect("close");

        assert_eq!(fs::read(&path).expect("read"), b"01ab456789");
    }

    #[test]
    fn test_append_opens_at_end() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("data");
        fs::write(&path, b"head").expect("write");

        let mut file = open(&dir, "data", "a+b", 8);
        assert_eq!(file.tell().expect("tell"), 4);
        file.write(&b"-tail".to_vec()).expect("write");
        file.seek(SeekFrom::Start(0)).expect("seek");
        assert_eq!(file.read(None).expect("read"), b"head-tail");
    }

    #[test]
    fn test_truncate_keeps_position() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("data");
        fs::write(&path, b"0123456789").expect("write");

        let mut file = open(&dir, "data", "r+b", 4);
        file.read(Some(3)).expect("read");
        assert_eq!(file.truncate(None).expect("truncate"), 3);
        assert_eq!(file.tell().expect("tell"), 3);
        assert_eq!(fs::read(&path).expect("read"), b"012");

        assert_eq!(file.truncate(Some(1)).expect("truncate"), 1);
        assert_eq!(file.tell().expect("tell"), 3);
    }

    #[test]
    fn test_mode_violations() {
        let dir = TempDir::new().expect("tempdir");
        fs::write(dir.path().join("data"), b"x").expect("write");

        let mut reader = open(&dir, "data", "rb", 4);
        let err = reader.write(&b"y".to_vec()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
        assert!(reader.truncate(None).is_err());

        let mut writer = open(&dir, "other", "wb", 4);
        let err = writer.read(None).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
    }

    #[test]
    fn test_closed_file_rejects_operations() {
        let dir = TempDir::new().expect("tempdir");
        let mut file = open(&dir, "data", "w+b", 4);
        file.close().expect("close");
        file.close().expect("close twice");
        assert!(file.is_closed());

        let err = file.read(None).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert!(file.detach().is_err());
    }

    #[test]
    fn test_detach_flushes_and_realigns() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("data");
        fs::write(&path, b"0123456789").expect("write");

        let mut file = open(&dir, "data", "r+b", 8);
        file.read(Some(2)).expect("read");
        file.write(&b"AB".to_vec()).expect("write");

        let mut raw = file.detach().expect("detach");
        let mut rest = String::new();
        raw.read_to_string(&mut rest).expect("read");
        assert_eq!(rest, "456789");
        assert_eq!(fs::read(&path).expect("read"), b"01AB456789");
    }

    #[test]
    fn test_readinto_fills_buffer() {
        let dir = TempDir::new().expect("tempdir");
        fs::write(dir.path().join("data"), b"0123456789").expect("write");

        let mut file = open(&dir, "data", "rb", 3);
        let mut buf = [0u8; 8];
        assert_eq!(file.readinto(&mut buf).expect("readinto"), 8);
        assert_eq!(&buf, b"01234567");
        assert_eq!(file.readinto(&mut buf).expect("readinto"), 2);
        assert_eq!(&buf[..2], b"89");
    }

    #[test]
    fn test_drop_flushes_pending_writes() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("data");
        {
            let mut file = open(&dir, "data", "wb", 64);
            file.write(&b"kept".to_vec()).expect("write");
        }
        assert_eq!(fs::read(&path).expect("read"), b"kept");
    }
}
