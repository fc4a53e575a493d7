//! Text layer over a binary resource.
//!
//! [`TextFile`] decodes bytes from any [`BinaryIo`] resource into characters
//! and encodes written strings back to bytes. Encodings are resolved from
//! WHATWG labels (`"utf-8"`, `"latin1"`, `"shift_jis"`, ...) with
//! `encoding_rs`.
//!
//! Decoding and encoding are strict: malformed input and characters the
//! encoding cannot represent are reported as [`io::ErrorKind::InvalidData`].
//! Line endings are passed through untouched.
//!
//! Positions reported by [`tell`](BlockingIo::tell) are byte offsets in the
//! binary layer, which makes them valid targets for `SeekFrom::Start`.

use crate::error::{Result, ThreadIoError};
use crate::options::OpenOptions;
use crate::traits::{BinaryIo, BlockingIo, Capabilities, closed_error, not_permitted};
use encoding_rs::{Decoder, DecoderResult, Encoding, UTF_8, UTF_16BE, UTF_16LE};
use std::collections::VecDeque;
use std::io::{self, SeekFrom};

/// Resolve an encoding label.
///
/// Encodings that `encoding_rs` can only decode (UTF-16, replacement) are
/// rejected when `writable` is set.
pub fn lookup_encoding(label: &str, writable: bool) -> Result<&'static Encoding> {
    let encoding = Encoding::for_label(label.as_bytes())
        .ok_or_else(|| ThreadIoError::invalid_encoding(label, "unknown encoding label"))?;
    if encoding == encoding_rs::REPLACEMENT {
        return Err(ThreadIoError::invalid_encoding(
            label,
            "label maps to the replacement encoding",
        ));
    }
    if writable && encoding.output_encoding() != encoding {
        return Err(ThreadIoError::invalid_encoding(
            label,
            format!("{} can only be decoded", encoding.name()),
        ));
    }
    Ok(encoding)
}

/// Byte cost of one character, for encodings where it follows from the
/// character alone.
fn cost_rule(encoding: &'static Encoding) -> Option<fn(char) -> usize> {
    let rule: fn(char) -> usize = if encoding == UTF_8 {
        char::len_utf8
    } else if encoding == UTF_16LE || encoding == UTF_16BE {
        |ch: char| ch.len_utf16() * 2
    } else if encoding.is_single_byte() {
        |_: char| 1
    } else {
        return None;
    };
    Some(rule)
}

/// A character stream over a binary resource `B`.
///
/// UTF-8, UTF-16 and single-byte encodings are decoded a chunk at a time.
/// Other multi-byte encodings are fed to the decoder byte by byte so each
/// character knows how many bytes it took.
pub struct TextFile<B> {
    inner: Option<B>,
    encoding: &'static Encoding,
    decoder: Decoder,
    cost: Option<fn(char) -> usize>,
    /// Decoded read-ahead; `pending[cursor..]` has not been returned yet.
    pending: String,
    cursor: usize,
    pending_chars: usize,
    /// Bytes behind each unread character when there is no cost rule.
    costs: VecDeque<usize>,
    /// Bytes handed to the decoder that have not produced a character yet.
    stalled: usize,
    /// Byte order mark bytes, charged to the first character read.
    lead: usize,
    at_start: bool,
    decoded: String,
    chunk_size: usize,
}

impl<B: BinaryIo> TextFile<B> {
    /// Layer text decoding with `encoding` over `inner`.
    pub fn new(inner: B, encoding: &'static Encoding, chunk_size: usize) -> Self {
        Self {
            inner: Some(inner),
            encoding,
            decoder: encoding.new_decoder_with_bom_removal(),
            cost: cost_rule(encoding),
            pending: String::new(),
            cursor: 0,
            pending_chars: 0,
            costs: VecDeque::new(),
            stalled: 0,
            lead: 0,
            at_start: true,
            decoded: String::new(),
            // Room for a whole byte order mark in the first chunk.
            chunk_size: chunk_size.max(4),
        }
    }

    /// Layer text decoding over `inner` as configured by `options`.
    pub fn with_options(inner: B, options: &OpenOptions) -> Result<Self> {
        let writable = inner.capabilities().writable;
        let encoding = match &options.encoding {
            Some(label) => lookup_encoding(label, writable)?,
            None => UTF_8,
        };
        Ok(Self::new(inner, encoding, options.buffer_size))
    }

    /// The encoding in use.
    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    fn inner(&mut self) -> io::Result<&mut B> {
        self.inner.as_mut().ok_or_else(closed_error)
    }

    fn restart_decoder(&mut self, position: u64) {
        self.at_start = position == 0;
        self.decoder = if self.at_start {
            self.encoding.new_decoder_with_bom_removal()
        } else {
            self.encoding.new_decoder_without_bom_handling()
        };
    }

    fn reset(&mut self, position: u64) {
        self.pending.clear();
        self.cursor = 0;
        self.pending_chars = 0;
        self.costs.clear();
        self.stalled = 0;
        self.lead = 0;
        self.restart_decoder(position);
    }

    /// Pull one chunk from the binary layer through the decoder.
    ///
    /// Returns `false` at end of file.
    fn fill(&mut self) -> io::Result<bool> {
        let chunk_size = self.chunk_size;
        let chunk = self.inner()?.read(Some(chunk_size))?;
        self.pending.replace_range(..self.cursor, "");
        self.cursor = 0;

        if chunk.is_empty() {
            self.feed(&[], true)?;
            self.absorb(0, 0);
            if self.pending_chars == 0 {
                self.stalled = 0;
                self.lead = 0;
            }
            // A finished decoder can't be fed again; the file may still grow.
            let position = self.inner()?.tell()?;
            self.restart_decoder(position);
            return Ok(false);
        }

        if self.cost.is_some() {
            let bom = match Encoding::for_bom(&chunk) {
                Some((encoding, length)) if self.at_start && encoding == self.encoding => length,
                _ => 0,
            };
            self.lead += bom;
            self.feed(&chunk, false)?;
            self.absorb(chunk.len(), bom);
        } else {
            for index in 0..chunk.len() {
                self.feed(&chunk[index..=index], false)?;
                self.absorb(1, 0);
            }
        }
        self.at_start = false;
        Ok(true)
    }

    /// Decode `src` into `self.decoded`.
    fn feed(&mut self, src: &[u8], last: bool) -> io::Result<()> {
        self.decoded.clear();

        let mut input = src;
        loop {
            let needed = self
                .decoder
                .max_utf8_buffer_length(input.len())
                .unwrap_or(16);
            self.decoded.reserve(needed);
            let (result, read) =
                self.decoder
                    .decode_to_string_without_replacement(input, &mut self.decoded, last);
            input = &input[read..];
            match result {
                DecoderResult::InputEmpty => return Ok(()),
                DecoderResult::OutputFull => continue,
                DecoderResult::Malformed(_, _) => {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("stream is not valid {}", self.encoding.name()),
                    ));
                }
            }
        }
    }

    /// Append `self.decoded` to the read-ahead. `fed` input bytes produced
    /// it, `bom` of them were a byte order mark.
    fn absorb(&mut self, fed: usize, bom: usize) {
        let chars = self.decoded.chars().count();
        match self.cost {
            Some(cost) => {
                let produced: usize = self.decoded.chars().map(cost).sum();
                self.stalled = (self.stalled + fed).saturating_sub(produced + bom);
            }
            None => {
                self.stalled += fed;
                if chars > 0 {
                    self.costs.push_back(self.stalled);
                    self.costs.resize(self.costs.len() + chars - 1, 0);
                    self.stalled = 0;
                }
            }
        }
        self.pending.push_str(&self.decoded);
        self.pending_chars += chars;
    }

    fn take(&mut self, count: usize) -> String {
        let count = count.min(self.pending_chars);
        if count == 0 {
            return String::new();
        }
        let unread = &self.pending[self.cursor..];
        let end = unread
            .char_indices()
            .nth(count)
            .map_or(unread.len(), |(index, _)| index);
        let taken = unread[..end].to_owned();
        self.cursor += end;
        self.consumed(count);
        taken
    }

    /// Move all read-ahead into `out`.
    fn take_all_into(&mut self, out: &mut String) {
        if self.pending_chars == 0 {
            return;
        }
        out.push_str(&self.pending[self.cursor..]);
        self.pending.clear();
        self.cursor = 0;
        self.consumed(self.pending_chars);
    }

    fn consumed(&mut self, chars: usize) {
        self.pending_chars -= chars;
        let costs = chars.min(self.costs.len());
        self.costs.drain(..costs);
        self.lead = 0;
    }

    fn unread_bytes(&self) -> u64 {
        let tail: usize = match self.cost {
            Some(cost) => self.pending[self.cursor..].chars().map(cost).sum(),
            None => self.costs.iter().sum(),
        };
        (tail + self.stalled + self.lead) as u64
    }

    /// Move the binary layer back to the logical position, dropping read-ahead.
    fn discard_readahead(&mut self) -> io::Result<()> {
        if self.pending_chars == 0 && self.stalled == 0 && self.lead == 0 {
            return Ok(());
        }
        let position = self.tell()?;
        self.inner()?.seek(SeekFrom::Start(position))?;
        self.reset(position);
        Ok(())
    }

    fn ensure_readable(&self) -> io::Result<()> {
        if self.capabilities().readable {
            Ok(())
        } else {
            Err(not_permitted("reading"))
        }
    }

    fn ensure_writable(&self) -> io::Result<()> {
        if self.capabilities().writable {
            Ok(())
        } else {
            Err(not_permitted("writing"))
        }
    }
}

impl<B: BinaryIo> BlockingIo for TextFile<B> {
    type Buf = String;
    type Detached = B;

    fn capabilities(&self) -> Capabilities {
        self.inner
            .as_ref()
            .map(BlockingIo::capabilities)
            .unwrap_or_default()
    }

    fn read(&mut self, size: Option<usize>) -> io::Result<String> {
        self.inner()?;
        self.ensure_readable()?;
        match size {
            Some(size) => {
                while self.pending_chars < size && self.fill()? {}
                Ok(self.take(size))
            }
            None => {
                let mut text = String::new();
                self.take_all_into(&mut text);
                while self.fill()? {
                    self.take_all_into(&mut text);
                }
                self.take_all_into(&mut text);
                Ok(text)
            }
        }
    }

    fn readline(&mut self, limit: Option<usize>) -> io::Result<String> {
        self.inner()?;
        self.ensure_readable()?;
        // Bytes of unread text already searched for a newline.
        let mut scanned = 0;
        loop {
            let unread = &self.pending[self.cursor..];
            if let Some(index) = unread[scanned..].find('\n') {
                let end = unread[..scanned + index + 1].chars().count();
                return Ok(self.take(limit.map_or(end, |limit| end.min(limit))));
            }
            scanned = unread.len();
            if let Some(limit) = limit.filter(|limit| self.pending_chars >= *limit) {
                return Ok(self.take(limit));
            }
            if !self.fill()? {
                return Ok(self.take(self.pending_chars));
            }
        }
    }

    fn write(&mut self, data: &String) -> io::Result<usize> {
        self.inner()?;
        self.ensure_writable()?;
        self.discard_readahead()?;

        let (bytes, _, unmappable) = self.encoding.encode(data);
        if unmappable {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("text is not representable in {}", self.encoding.name()),
            ));
        }
        self.inner()?.write(&bytes.into_owned())?;
        Ok(data.chars().count())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner()?.flush()
    }

    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => SeekFrom::Start(offset),
            SeekFrom::Current(0) => return self.tell(),
            SeekFrom::End(0) => SeekFrom::End(0),
            SeekFrom::Current(_) => {
                return Err(io::Error::new(
                    io::ErrorKind::Unsupported,
                    "can't do nonzero cur-relative seeks on a text stream",
                ));
            }
            SeekFrom::End(_) => {
                return Err(io::Error::new(
                    io::ErrorKind::Unsupported,
                    "can't do nonzero end-relative seeks on a text stream",
                ));
            }
        };
        let inner = self.inner()?;
        inner.flush()?;
        let position = inner.seek(target)?;
        self.reset(position);
        Ok(position)
    }

    fn tell(&mut self) -> io::Result<u64> {
        let unread = self.unread_bytes();
        let position = self.inner()?.tell()?;
        Ok(position.saturating_sub(unread))
    }

    fn truncate(&mut self, size: Option<u64>) -> io::Result<u64> {
        self.inner()?;
        self.ensure_writable()?;
        let position = self.tell()?;
        self.discard_readahead()?;
        self.inner()?.truncate(Some(size.unwrap_or(position)))
    }

    fn close(&mut self) -> io::Result<()> {
        match self.inner.as_mut() {
            Some(inner) => inner.close(),
            None => Ok(()),
        }
    }

    fn is_closed(&self) -> bool {
        self.inner.as_ref().is_none_or(BlockingIo::is_closed)
    }

    fn detach(&mut self) -> Result<B> {
        self.inner()?.flush()?;
        self.discard_readahead()?;
        self.inner
            .take()
            .ok_or_else(|| ThreadIoError::detached("detach"))
    }
}
