//! Incremental delta decoding against a base blob.
//!
//! A delta stream is a sequence of ops (all integers little-endian):
//!
//! ```text
//! +------+---------------------+-----------------------------------+
//! | 0x01 | COPY                | u32 base offset, u32 length       |
//! +------+---------------------+-----------------------------------+
//! | 0x02 | INSERT              | u32 length, `length` raw bytes    |
//! +------+---------------------+-----------------------------------+
//! ```
//!
//! Ops repeat until end of stream. The decoder accepts input in arbitrary
//! chunk boundaries (an op header may straddle chunks) and forwards decoded
//! output to its sink as soon as it is available, so the target never needs
//! to be buffered whole. A stream is malformed if a copy range falls
//! outside the base or the stream ends mid-op; the latter is only
//! detectable at `finish`.

use std::io::{self, Write};

const OP_COPY: u8 = 0x01;
const OP_INSERT: u8 = 0x02;

const COPY_HEADER_LEN: usize = 8;
const INSERT_HEADER_LEN: usize = 4;

enum State {
    /// Expecting the next opcode byte.
    Opcode,
    /// Accumulating a copy op's offset + length.
    CopyHeader,
    /// Accumulating an insert op's length.
    InsertHeader,
    /// Passing an insert op's raw bytes through to the sink.
    InsertBody { remaining: usize },
}

/// Streaming decoder applying a delta to an in-memory base blob.
///
/// Implements `Write` over the *encoded* delta bytes; the sink receives the
/// *decoded* target bytes.
pub struct DeltaDecoder<W: Write> {
    base: Vec<u8>,
    sink: W,
    state: State,
    header: [u8; COPY_HEADER_LEN],
    header_len: usize,
}

impl<W: Write> DeltaDecoder<W> {
    pub fn new(base: Vec<u8>, sink: W) -> Self {
        Self {
            base,
            sink,
            state: State::Opcode,
            header: [0; COPY_HEADER_LEN],
            header_len: 0,
        }
    }

    /// The decoded-output sink.
    pub fn get_ref(&self) -> &W {
        &self.sink
    }

    /// Verifies the stream ended on an op boundary and returns the sink.
    pub fn finish(mut self) -> io::Result<W> {
        match self.state {
            State::Opcode => {
                self.sink.flush()?;
                Ok(self.sink)
            }
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "delta stream truncated mid-op",
            )),
        }
    }

    fn apply_copy(&mut self) -> io::Result<()> {
        let offset = u32::from_le_bytes([
            self.header[0],
            self.header[1],
            self.header[2],
            self.header[3],
        ]) as usize;
        let length = u32::from_le_bytes([
            self.header[4],
            self.header[5],
            self.header[6],
            self.header[7],
        ]) as usize;
        let end = offset.checked_add(length).filter(|&end| end <= self.base.len());
        match end {
            Some(end) => self.sink.write_all(&self.base[offset..end]),
            None => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "delta copy range {}..{} outside base of {} bytes",
                    offset,
                    offset.saturating_add(length),
                    self.base.len()
                ),
            )),
        }
    }
}

impl<W: Write> Write for DeltaDecoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut pos = 0;
        while pos < buf.len() {
            match self.state {
                State::Opcode => {
                    self.header_len = 0;
                    match buf[pos] {
                        OP_COPY => self.state = State::CopyHeader,
                        OP_INSERT => self.state = State::InsertHeader,
                        other => {
                            return Err(io::Error::new(
                                io::ErrorKind::InvalidData,
                                format!("unknown delta opcode 0x{other:02X}"),
                            ))
                        }
                    }
                    pos += 1;
                }
                State::CopyHeader => {
                    let take = (COPY_HEADER_LEN - self.header_len).min(buf.len() - pos);
                    self.header[self.header_len..self.header_len + take]
                        .copy_from_slice(&buf[pos..pos + take]);
                    self.header_len += take;
                    pos += take;
                    if self.header_len == COPY_HEADER_LEN {
                        self.apply_copy()?;
                        self.state = State::Opcode;
                    }
                }
                State::InsertHeader => {
                    let take = (INSERT_HEADER_LEN - self.header_len).min(buf.len() - pos);
                    self.header[self.header_len..self.header_len + take]
                        .copy_from_slice(&buf[pos..pos + take]);
                    self.header_len += take;
                    pos += take;
                    if self.header_len == INSERT_HEADER_LEN {
                        let remaining = u32::from_le_bytes([
                            self.header[0],
                            self.header[1],
                            self.header[2],
                            self.header[3],
                        ]) as usize;
                        self.state = if remaining == 0 {
                            State::Opcode
                        } else {
                            State::InsertBody { remaining }
                        };
                    }
                }
                State::InsertBody { remaining } => {
                    let take = remaining.min(buf.len() - pos);
                    self.sink.write_all(&buf[pos..pos + take])?;
                    pos += take;
                    let left = remaining - take;
                    self.state = if left == 0 {
                        State::Opcode
                    } else {
                        State::InsertBody { remaining: left }
                    };
                }
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.sink.flush()
    }
}
