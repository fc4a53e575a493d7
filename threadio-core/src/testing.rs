//! In-memory resource shared by the unit tests.

use crate::error::{Result, ThreadIoError};
use crate::traits::{BinaryIo, BlockingIo, Capabilities, closed_error, not_permitted};
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};
use std::time::Duration;

/// Cursor-backed resource counting how often it is called.
pub(crate) struct MemoryFile {
    pub data: Cursor<Vec<u8>>,
    pub closed: bool,
    pub detachable: bool,
    pub writable: bool,
    pub write_delay: Duration,
    pub close_delay: Duration,
    pub calls: Arc<AtomicUsize>,
    /// Thread the resource was dropped on.
    pub dropped_on: Arc<Mutex<Option<ThreadId>>>,
}

impl MemoryFile {
    pub fn new(content: &[u8]) -> Self {
        Self {
            data: Cursor::new(content.to_vec()),
            closed: false,
            detachable: true,
            writable: true,
            write_delay: Duration::ZERO,
            close_delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
            dropped_on: Arc::new(Mutex::new(None)),
        }
    }

    pub fn contents(&self) -> &[u8] {
        self.data.get_ref()
    }

    fn touch(&mut self) -> io::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.closed {
            return Err(closed_error());
        }
        Ok(())
    }
}

impl BlockingIo for MemoryFile {
    type Buf = Vec<u8>;
    type Detached = Vec<u8>;

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            readable: true,
            writable: self.writable,
            seekable: true,
        }
    }

    fn read(&mut self, size: Option<usize>) -> io::Result<Vec<u8>> {
        self.touch()?;
        let mut out = Vec::new();
        match size {
            Some(size) => (&mut self.data).take(size as u64).read_to_end(&mut out)?,
            None => self.data.read_to_end(&mut out)?,
        };
        Ok(out)
    }

    fn readline(&mut self, limit: Option<usize>) -> io::Result<Vec<u8>> {
        self.touch()?;
        let mut out = Vec::new();
        let mut byte = [0u8; 1];
        while limit.is_none_or(|limit| out.len() < limit) && self.data.read(&mut byte)? == 1 {
            out.push(byte[0]);
            if byte[0] == b'\n' {
                break;
            }
        }
        Ok(out)
    }

    fn write(&mut self, data: &Vec<u8>) -> io::Result<usize> {
        self.touch()?;
        if !self.writable {
            return Err(not_permitted("writing"));
        }
        thread::sleep(self.write_delay);
        self.data.write_all(data)?;
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.touch()
    }

    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.touch()?;
        self.data.seek(pos)
    }

    fn truncate(&mut self, size: Option<u64>) -> io::Result<u64> {
        self.touch()?;
        let size = size.unwrap_or(self.data.position());
        self.data.get_mut().truncate(size as usize);
        Ok(size)
    }

    fn close(&mut self) -> io::Result<()> {
        thread::sleep(self.close_delay);
        self.closed = true;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn detach(&mut self) -> Result<Vec<u8>> {
        if !self.detachable {
            return Err(ThreadIoError::unsupported(
                "detach",
                "memory file is not layered",
            ));
        }
        let position = self.data.position() as usize;
        Ok(self.data.get_ref()[position..].to_vec())
    }
}

impl BinaryIo for MemoryFile {
    fn readinto(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.touch()?;
        self.data.read(buf)
    }
}

impl Drop for MemoryFile {
    fn drop(&mut self) {
        if let Ok(mut dropped_on) = self.dropped_on.lock() {
            *dropped_on = Some(thread::current().id());
        }
    }
}
