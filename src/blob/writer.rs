//! Streaming blob write sessions.
//!
//! A `BlobWriter` streams attachment content of any size to a temporary
//! file while computing both content digests incrementally, so nothing is
//! ever buffered whole in memory. Session lifecycle:
//!
//! ```text
//! open --append*--> open --finish--> finished --install--> installed
//!   \------------------------cancel------------------------/   (except
//!                                                               installed)
//! ```
//!
//! An input transform may be selected before the first `append`: the
//! incoming bytes are then decompressed (zstd) or delta-decoded against an
//! existing blob on the fly. Digests, the byte count, and the resulting
//! `BlobKey` always describe the decoded output, never the bytes as they
//! arrived.
//!
//! Sessions are single-writer: `append` calls are sequential, never
//! concurrent. Once installed, the stored blob is immutable and safe for
//! unsynchronized reads.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use md5::Md5;
use sha1::{Digest, Sha1};
use tracing::debug;

use super::delta::DeltaDecoder;
use super::errors::{BlobError, BlobResult};
use super::key::{BlobKey, Md5Digest};
use super::store::BlobStore;

/// Write sink that digests everything it writes.
struct DigestSink {
    file: BufWriter<File>,
    sha1: Sha1,
    md5: Md5,
    length: u64,
}

impl DigestSink {
    fn new(file: File) -> Self {
        Self {
            file: BufWriter::new(file),
            sha1: Sha1::new(),
            md5: Md5::new(),
            length: 0,
        }
    }
}

impl Write for DigestSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.file.write(buf)?;
        self.sha1.update(&buf[..written]);
        self.md5.update(&buf[..written]);
        self.length += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// The selected input transform, wrapping the digest sink.
///
/// Decompression runs on a raw zstd decoder so that `finish` can tell a
/// completed frame from input that stopped mid-frame.
enum Pipeline {
    Passthrough(DigestSink),
    Decompress(zstd::stream::zio::Writer<DigestSink, zstd::stream::raw::Decoder<'static>>),
    Delta(DeltaDecoder<DigestSink>),
}

impl Pipeline {
    fn decoded_length(&self) -> u64 {
        match self {
            Pipeline::Passthrough(sink) => sink.length,
            Pipeline::Decompress(decoder) => decoder.writer().length,
            Pipeline::Delta(decoder) => decoder.get_ref().length,
        }
    }

    fn is_transforming(&self) -> bool {
        !matches!(self, Pipeline::Passthrough(_))
    }

    /// Finalizes the transform, surfacing end-of-stream validation.
    /// Input that ends mid-frame or mid-op fails here.
    fn finish(self) -> io::Result<DigestSink> {
        match self {
            Pipeline::Passthrough(sink) => Ok(sink),
            Pipeline::Decompress(mut decoder) => {
                decoder.finish()?;
                Ok(decoder.into_inner().0)
            }
            Pipeline::Delta(decoder) => decoder.finish(),
        }
    }
}

impl Write for Pipeline {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Pipeline::Passthrough(sink) => sink.write(buf),
            Pipeline::Decompress(decoder) => decoder.write(buf),
            Pipeline::Delta(decoder) => decoder.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Pipeline::Passthrough(sink) => sink.flush(),
            Pipeline::Decompress(decoder) => decoder.flush(),
            Pipeline::Delta(decoder) => decoder.flush(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SessionState {
    Open,
    Finished,
    Installed,
    Cancelled,
}

/// One in-progress attachment write. Transient; never persisted or reused.
pub struct BlobWriter<'a> {
    store: &'a BlobStore,
    /// Temporary destination; gone after install or cancel.
    tmp_path: Option<PathBuf>,
    /// Present while the session is open.
    pipeline: Option<Pipeline>,
    state: SessionState,
    length: u64,
    key: Option<BlobKey>,
    md5: Option<Md5Digest>,
}

impl<'a> BlobWriter<'a> {
    /// Opens a session writing to a fresh temporary destination in `store`.
    pub fn open(store: &'a BlobStore) -> BlobResult<Self> {
        let (tmp_path, file) = store.open_temp()?;
        Ok(Self {
            store,
            tmp_path: Some(tmp_path),
            pipeline: Some(Pipeline::Passthrough(DigestSink::new(file))),
            state: SessionState::Open,
            length: 0,
            key: None,
            md5: None,
        })
    }

    /// Declares the incoming stream zstd-compressed; it will be
    /// decompressed incrementally. Must precede the first `append`.
    pub fn decompress_input(&mut self) -> BlobResult<()> {
        let sink = self.take_fresh_sink()?;
        match zstd::stream::raw::Decoder::new() {
            Ok(raw) => {
                self.pipeline = Some(Pipeline::Decompress(zstd::stream::zio::Writer::new(
                    sink, raw,
                )));
                Ok(())
            }
            Err(e) => {
                self.pipeline = Some(Pipeline::Passthrough(sink));
                Err(BlobError::Io {
                    path: self.tmp_display(),
                    source: e,
                })
            }
        }
    }

    /// Declares the incoming stream a delta whose base is the blob stored
    /// under `base`; it will be decoded incrementally. Must precede the
    /// first `append`, and the base blob must already exist in the store.
    pub fn delta_against(&mut self, base: &BlobKey) -> BlobResult<()> {
        if !self.store.exists(base) {
            return Err(BlobError::UnknownBaseBlob(*base));
        }
        let base_bytes = self.store.get(base)?;
        let sink = self.take_fresh_sink()?;
        self.pipeline = Some(Pipeline::Delta(DeltaDecoder::new(base_bytes, sink)));
        Ok(())
    }

    /// Feeds a chunk of (possibly encoded) input to the session.
    ///
    /// On failure the session stays open: the caller may retry the append
    /// or cancel. Transform failures mean the input itself is malformed.
    pub fn append(&mut self, chunk: &[u8]) -> BlobResult<()> {
        if self.state != SessionState::Open {
            return Err(BlobError::InvalidState {
                expected: "open",
                actual: self.state_name(),
            });
        }
        let path = self.tmp_display();
        let pipeline = self.pipeline.as_mut().ok_or(BlobError::InvalidState {
            expected: "open",
            actual: "finishing",
        })?;
        let transforming = pipeline.is_transforming();
        if let Err(e) = pipeline.write_all(chunk) {
            return Err(classify_stream_error(e, transforming, path));
        }
        self.length = pipeline.decoded_length();
        Ok(())
    }

    /// Flushes everything to the temporary destination and finalizes both
    /// digests. No further `append` is permitted afterwards.
    pub fn finish(&mut self) -> BlobResult<BlobKey> {
        if self.state != SessionState::Open {
            return Err(BlobError::InvalidState {
                expected: "open",
                actual: self.state_name(),
            });
        }
        let path = self.tmp_display();
        let pipeline = self.pipeline.take().ok_or(BlobError::InvalidState {
            expected: "open",
            actual: "finishing",
        })?;
        let transforming = pipeline.is_transforming();
        let sink = pipeline
            .finish()
            .map_err(|e| classify_stream_error(e, transforming, path.clone()))?;

        let DigestSink {
            file,
            sha1,
            md5,
            length,
        } = sink;
        let file = file.into_inner().map_err(|e| BlobError::Io {
            path: path.clone(),
            source: e.into_error(),
        })?;
        file.sync_all().map_err(|e| BlobError::Io {
            path,
            source: e,
        })?;

        let key = BlobKey::from_bytes(sha1.finalize().into());
        self.md5 = Some(Md5Digest::from_bytes(md5.finalize().into()));
        self.key = Some(key);
        self.length = length;
        self.state = SessionState::Finished;
        debug!(key = %key, length, "blob write finished");
        Ok(key)
    }

    /// Moves the finished content into the store under its key.
    ///
    /// Content already stored under the same key is reused and the
    /// temporary copy discarded. Idempotent: a second call on the same
    /// session is a no-op returning the same key.
    pub fn install(&mut self) -> BlobResult<BlobKey> {
        match self.state {
            SessionState::Installed => self.key.ok_or(BlobError::InvalidState {
                expected: "finished",
                actual: "installed",
            }),
            SessionState::Finished => {
                let key = self.key.ok_or(BlobError::InvalidState {
                    expected: "finished",
                    actual: "open",
                })?;
                let tmp = self.tmp_path.take().ok_or(BlobError::InvalidState {
                    expected: "finished",
                    actual: "cancelled",
                })?;
                if let Err(e) = self.store.install_temp(&tmp, &key) {
                    self.tmp_path = Some(tmp);
                    return Err(e);
                }
                self.state = SessionState::Installed;
                Ok(key)
            }
            _ => Err(BlobError::InvalidState {
                expected: "finished",
                actual: self.state_name(),
            }),
        }
    }

    /// Discards the temporary destination and invalidates the session.
    /// A no-op on an installed session.
    pub fn cancel(&mut self) {
        if self.state == SessionState::Installed {
            return;
        }
        if let Some(tmp) = self.tmp_path.take() {
            // Best effort; tmp/ is scratch space.
            let _ = fs::remove_file(tmp);
        }
        self.pipeline = None;
        self.key = None;
        self.md5 = None;
        self.state = SessionState::Cancelled;
    }

    /// Decoded bytes written so far (final once finished).
    pub fn length(&self) -> u64 {
        self.length
    }

    /// The content key; available once finished.
    pub fn blob_key(&self) -> Option<BlobKey> {
        self.key
    }

    /// `sha1-<base64>` form of the key; available once finished.
    pub fn sha1_digest_string(&self) -> Option<String> {
        self.key.map(|k| k.digest_string())
    }

    /// `md5-<base64>` legacy digest; available once finished.
    pub fn md5_digest_string(&self) -> Option<String> {
        self.md5.map(|d| d.digest_string())
    }

    /// The temporary file location; `None` once installed or cancelled.
    pub fn temp_path(&self) -> Option<&Path> {
        self.tmp_path.as_deref()
    }

    fn take_fresh_sink(&mut self) -> BlobResult<DigestSink> {
        if self.state != SessionState::Open {
            return Err(BlobError::InvalidState {
                expected: "open",
                actual: self.state_name(),
            });
        }
        match self.pipeline.take() {
            Some(Pipeline::Passthrough(sink)) if sink.length == 0 => Ok(sink),
            Some(other) => {
                self.pipeline = Some(other);
                Err(BlobError::InvalidState {
                    expected: "open, before any append, no transform selected",
                    actual: "transform selected or data already appended",
                })
            }
            None => Err(BlobError::InvalidState {
                expected: "open",
                actual: "finishing",
            }),
        }
    }

    fn state_name(&self) -> &'static str {
        match self.state {
            SessionState::Open => "open",
            SessionState::Finished => "finished",
            SessionState::Installed => "installed",
            SessionState::Cancelled => "cancelled",
        }
    }

    fn tmp_display(&self) -> String {
        self.tmp_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default()
    }
}

impl Drop for BlobWriter<'_> {
    fn drop(&mut self) {
        if self.state != SessionState::Installed {
            if let Some(tmp) = self.tmp_path.take() {
                let _ = fs::remove_file(tmp);
            }
        }
    }
}

/// Splits stream failures into transform errors (malformed input) and
/// plain I/O errors (retryable by the caller).
fn classify_stream_error(e: io::Error, transforming: bool, path: String) -> BlobError {
    // UnexpectedEof comes from a decoder whose input stopped mid-frame.
    let decode_failure = transforming
        && matches!(
            e.kind(),
            io::ErrorKind::InvalidData
                | io::ErrorKind::InvalidInput
                | io::ErrorKind::UnexpectedEof
                | io::ErrorKind::Other
        );
    if decode_failure {
        BlobError::Transform {
            path,
            reason: e.to_string(),
        }
    } else {
        BlobError::Io { path, source: e }
    }
}
