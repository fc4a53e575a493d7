//! Gzip file resource.
//!
//! Reading decodes every concatenated member of the file. Writing and
//! appending start a new member whose header carries the file name (without
//! a trailing `.gz`) and the current modification time.
//!
//! Positions are offsets in the uncompressed stream. Seeking backwards while
//! reading rewinds the file and decodes again from the start, so it costs as
//! much as reading up to the target.

use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::{Compression, GzBuilder};
use log::{debug, warn};
use std::convert::Infallible;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use threadio_core::error::{Result, ThreadIoError};
use threadio_core::options::{Access, CompressionLevel, Mode, OpenOptions};
use threadio_core::traits::{BinaryIo, BlockingIo, Capabilities, closed_error, not_permitted};

type Reader = BufReader<MultiGzDecoder<File>>;
type Writer = GzEncoder<BufWriter<File>>;

enum Stream {
    Read(Reader),
    Write(Writer),
}

/// A gzip-compressed file.
pub struct GzipFile {
    stream: Option<Stream>,
    path: PathBuf,
    mode: Mode,
    level: CompressionLevel,
    buffer_size: usize,
    offset: u64,
}

impl GzipFile {
    /// Open `path` as described by `options`.
    ///
    /// # Errors
    ///
    /// [`ThreadIoError::InvalidMode`] for update (`+`) modes, otherwise any
    /// error from opening the file.
    pub fn open(path: impl AsRef<Path>, options: &OpenOptions) -> Result<Self> {
        let path = path.as_ref();
        let mode = options.mode;
        if mode.is_update() {
            return Err(ThreadIoError::invalid_mode(
                mode.to_string(),
                "gzip files can't be opened for update",
            ));
        }

        let file = mode.to_std().open(path)?;
        let buffer_size = options.buffer_size.max(1);
        let stream = match mode.access() {
            Access::Read => Stream::Read(new_reader(file, buffer_size)),
            Access::Write | Access::Append | Access::CreateNew => {
                let encoder = header_for(path).write(
                    BufWriter::with_capacity(buffer_size, file),
                    Compression::new(u32::from(options.compress_level.level())),
                );
                Stream::Write(encoder)
            }
        };

        debug!(
            "opened gzip {} (mode {mode}, level {})",
            path.display(),
            options.compress_level.level()
        );
        Ok(Self {
            stream: Some(stream),
            path: path.to_path_buf(),
            mode,
            level: options.compress_level,
            buffer_size,
            offset: 0,
        })
    }

    /// Path the file was opened with.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Compression level used for writing.
    pub fn level(&self) -> CompressionLevel {
        self.level
    }

    fn reader(&mut self) -> io::Result<&mut Reader> {
        match self.stream.as_mut() {
            Some(Stream::Read(reader)) => Ok(reader),
            Some(Stream::Write(_)) => Err(not_permitted("reading")),
            None => Err(closed_error()),
        }
    }

    fn writer(&mut self) -> io::Result<&mut Writer> {
        match self.stream.as_mut() {
            Some(Stream::Write(writer)) => Ok(writer),
            Some(Stream::Read(_)) => Err(not_permitted("writing")),
            None => Err(closed_error()),
        }
    }

    /// Restart decoding from the beginning of the file.
    fn rewind(&mut self) -> io::Result<()> {
        let reader = match self.stream.take() {
            Some(Stream::Read(reader)) => reader,
            other => {
                self.stream = other;
                return Err(not_permitted("reading"));
            }
        };
        let mut file = reader.into_inner().into_inner();
        file.rewind()?;
        self.stream = Some(Stream::Read(new_reader(file, self.buffer_size)));
        self.offset = 0;
        Ok(())
    }

    fn target(&self, pos: SeekFrom) -> io::Result<u64> {
        match pos {
            SeekFrom::Start(offset) => Ok(offset),
            SeekFrom::Current(delta) => self.offset.checked_add_signed(delta).ok_or_else(|| {
                io::Error::new(io::ErrorKind::InvalidInput, "seek before start of stream")
            }),
            SeekFrom::End(_) => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "seek from end not supported",
            )),
        }
    }
}

fn new_reader(file: File, buffer_size: usize) -> Reader {
    BufReader::with_capacity(buffer_size, MultiGzDecoder::new(file))
}

fn header_for(path: &Path) -> GzBuilder {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = name.strip_suffix(".gz").unwrap_or(&name);
    let mtime = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as u32)
        .unwrap_or(0);
    GzBuilder::new().filename(name).mtime(mtime)
}

impl BlockingIo for GzipFile {
    type Buf = Vec<u8>;
    type Detached = Infallible;

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            readable: self.mode.access() == Access::Read,
            writable: self.mode.access() != Access::Read,
            seekable: true,
        }
    }

    fn read(&mut self, size: Option<usize>) -> io::Result<Vec<u8>> {
        let reader = self.reader()?;
        let mut out = Vec::new();
        match size {
            Some(size) => reader.take(size as u64).read_to_end(&mut out)?,
            None => reader.read_to_end(&mut out)?,
        };
        self.offset += out.len() as u64;
        Ok(out)
    }

    fn readline(&mut self, limit: Option<usize>) -> io::Result<Vec<u8>> {
        let reader = self.reader()?;
        let mut out = Vec::new();
        match limit {
            Some(limit) => reader.take(limit as u64).read_until(b'\n', &mut out)?,
            None => reader.read_until(b'\n', &mut out)?,
        };
        self.offset += out.len() as u64;
        Ok(out)
    }

    fn write(&mut self, data: &Vec<u8>) -> io::Result<usize> {
        self.writer()?.write_all(data)?;
        self.offset += data.len() as u64;
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.stream.as_mut() {
            // Sync flush: everything written so far becomes decodable.
            Some(Stream::Write(writer)) => writer.flush(),
            Some(Stream::Read(_)) => Ok(()),
            None => Err(closed_error()),
        }
    }

    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        if self.stream.is_none() {
            return Err(closed_error());
        }
        let target = self.target(pos)?;

        if matches!(self.stream, Some(Stream::Write(_))) {
            if target < self.offset {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "negative seek in write mode",
                ));
            }
            let padding = target - self.offset;
            io::copy(&mut io::repeat(0).take(padding), self.writer()?)?;
            self.offset = target;
            return Ok(self.offset);
        }

        if target < self.offset {
            self.rewind()?;
        }
        let skip = target - self.offset;
        let skipped = io::copy(&mut self.reader()?.take(skip), &mut io::sink())?;
        self.offset += skipped;
        Ok(self.offset)
    }

    fn tell(&mut self) -> io::Result<u64> {
        if self.stream.is_none() {
            return Err(closed_error());
        }
        Ok(self.offset)
    }

    fn truncate(&mut self, _size: Option<u64>) -> io::Result<u64> {
        if self.stream.is_none() {
            return Err(closed_error());
        }
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "gzip files can't be truncated",
        ))
    }

    fn close(&mut self) -> io::Result<()> {
        let Some(stream) = self.stream.take() else {
            return Ok(());
        };
        if let Stream::Write(writer) = stream {
            let mut file = writer.finish()?;
            file.flush()?;
        }
        debug!("closed gzip {}", self.path.display());
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.stream.is_none()
    }
}

impl BinaryIo for GzipFile {
    fn readinto(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let reader = self.reader()?;
        let mut filled = 0;
        while filled < buf.len() {
            match reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(count) => filled += count,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return Err(err),
            }
        }
        self.offset += filled as u64;
        Ok(filled)
    }
}

impl Drop for GzipFile {
    fn drop(&mut self) {
        let Some(Stream::Write(writer)) = self.stream.take() else {
            return;
        };
        if let Err(err) = writer.finish().and_then(|mut file| file.flush()) {
            warn!("failed to finish gzip {} on drop: {err}", self.path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::fs;
    use tempfile::TempDir;

    fn options(mode: &str, level: i64) -> OpenOptions {
        OpenOptions::for_mode(mode)
            .expect("mode")
            .compress_level(CompressionLevel::new(level).expect("level"))
    }

    #[test]
    fn test_header_records_stripped_name() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("notes.txt.gz");

        let mut file = GzipFile::open(&path, &options("wb", 6)).expect("open");
        file.write(&b"hello".to_vec()).expect("write");
        file.close().expect("close");

        let data = fs::read(&path).expect("read");
        let mut decoder = GzDecoder::new(&data[..]);
        let mut content = String::new();
        decoder.read_to_string(&mut content).expect("decode");
        assert_eq!(content, "hello");

        let header = decoder.header().expect("header");
        assert_eq!(header.filename(), Some(&b"notes.txt"[..]));
        assert!(header.mtime() > 0);
    }

    #[test]
    fn test_update_mode_is_rejected() {
        let dir = TempDir::new().expect("tempdir");
        let err = GzipFile::open(dir.path().join("x.gz"), &options("w+b", 9))
            .err()
            .expect("rejected");
        assert!(matches!(err, ThreadIoError::InvalidMode { .. }));
    }

    #[test]
    fn test_seek_in_read_mode() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("digits.gz");
        let mut writer = GzipFile::open(&path, &options("wb", 9)).expect("open");
        writer.write(&b"0123456789".to_vec()).expect("write");
        writer.close().expect("close");

        let mut file = GzipFile::open(&path, &options("rb", 9)).expect("open");
        assert_eq!(file.seek(SeekFrom::Start(6)).expect("seek"), 6);
        assert_eq!(file.read(Some(2)).expect("read"), b"67");
        assert_eq!(file.seek(SeekFrom::Current(-6)).expect("seek"), 2);
        assert_eq!(file.read(Some(1)).expect("read"), b"2");
        assert_eq!(file.seek(SeekFrom::Start(100)).expect("seek"), 10);

        let err = file.seek(SeekFrom::End(0)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
        let err = file.seek(SeekFrom::Current(-20)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_seek_in_write_mode_pads_with_zeros() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("padded.gz");

        let mut file = GzipFile::open(&path, &options("wb", 1)).expect("open");
        file.write(&b"ab".to_vec()).expect("write");
        assert_eq!(file.seek(SeekFrom::Current(3)).expect("seek"), 5);
        file.write(&b"c".to_vec()).expect("write");
        let err = file.seek(SeekFrom::Start(0)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        file.close().expect("close");

        let mut content = Vec::new();
        MultiGzDecoder::new(File::open(&path).expect("open"))
            .read_to_end(&mut content)
            .expect("decode");
        assert_eq!(content, b"ab\0\0\0c");
    }

    #[test]
    fn test_mode_violations_and_close() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("empty.gz");

        let mut file = GzipFile::open(&path, &options("wb", 9)).expect("open");
        assert_eq!(file.read(None).unwrap_err().kind(), io::ErrorKind::Unsupported);
        assert_eq!(
            file.truncate(None).unwrap_err().kind(),
            io::ErrorKind::Unsupported
        );
        file.close().expect("close");
        file.close().expect("second close");
        assert!(file.is_closed());
        assert_eq!(file.tell().unwrap_err().kind(), io::ErrorKind::InvalidInput);

        let mut file = GzipFile::open(&path, &options("rb", 9)).expect("open");
        assert!(file.read(None).expect("read").is_empty());
        let err = file.write(&b"x".to_vec()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
        assert!(matches!(
            file.detach(),
            Err(ThreadIoError::Unsupported { .. })
        ));
    }

    #[test]
    fn test_drop_finishes_member() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("dropped.gz");
        {
            let mut file = GzipFile::open(&path, &options("wb", 9)).expect("open");
            file.write(&b"unclosed".to_vec()).expect("write");
        }

        let mut content = String::new();
        GzDecoder::new(File::open(&path).expect("open"))
            .read_to_string(&mut content)
            .expect("decode");
        assert_eq!(content, "unclosed");
    }
}
