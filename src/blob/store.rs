//! Content-addressed filesystem blob store.
//!
//! Layout under the store root:
//!
//! ```text
//! <root>/<HEX-OF-KEY>.blob   committed blobs
//! <root>/tmp/<uuid>.blobtmp  in-flight write sessions
//! ```
//!
//! Committed blobs are immutable; concurrent readers need no
//! synchronization. In-flight sessions write only under `tmp/` and reach
//! the committed namespace via an atomic rename at install.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;
use uuid::Uuid;

use super::errors::{BlobError, BlobResult};
use super::key::BlobKey;
use super::writer::BlobWriter;

const BLOB_EXTENSION: &str = "blob";
const TMP_EXTENSION: &str = "blobtmp";

/// Filesystem store of attachment blobs keyed by content digest.
#[derive(Debug)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    /// Opens (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> BlobResult<Self> {
        let root = root.into();
        let tmp = root.join("tmp");
        fs::create_dir_all(&tmp).map_err(|e| BlobError::Io {
            path: tmp.display().to_string(),
            source: e,
        })?;
        Ok(Self { root })
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path a blob with this key lives at (whether or not it exists).
    pub fn path_for_key(&self, key: &BlobKey) -> PathBuf {
        self.root.join(format!("{}.{}", key.hex(), BLOB_EXTENSION))
    }

    /// True if content with this key is stored.
    pub fn exists(&self, key: &BlobKey) -> bool {
        self.path_for_key(key).exists()
    }

    /// Reads a blob's full content.
    pub fn get(&self, key: &BlobKey) -> BlobResult<Vec<u8>> {
        let path = self.path_for_key(key);
        fs::read(&path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                BlobError::NotFound(*key)
            } else {
                BlobError::Io {
                    path: path.display().to_string(),
                    source: e,
                }
            }
        })
    }

    /// Opens a read handle on a blob, for callers streaming large content.
    pub fn open_blob(&self, key: &BlobKey) -> BlobResult<File> {
        let path = self.path_for_key(key);
        File::open(&path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                BlobError::NotFound(*key)
            } else {
                BlobError::Io {
                    path: path.display().to_string(),
                    source: e,
                }
            }
        })
    }

    /// Stores a complete in-memory buffer, returning its key.
    ///
    /// Convenience over a full writer session; identical content dedups
    /// the same way streamed content does.
    pub fn put(&self, data: &[u8]) -> BlobResult<BlobKey> {
        let mut writer = BlobWriter::open(self)?;
        writer.append(data)?;
        writer.finish()?;
        writer.install()
    }

    /// Removes a blob. Callers own the decision that nothing references it.
    pub fn delete(&self, key: &BlobKey) -> BlobResult<()> {
        let path = self.path_for_key(key);
        fs::remove_file(&path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                BlobError::NotFound(*key)
            } else {
                BlobError::Io {
                    path: path.display().to_string(),
                    source: e,
                }
            }
        })
    }

    /// Number of committed blobs in the store.
    pub fn count(&self) -> BlobResult<usize> {
        let entries = fs::read_dir(&self.root).map_err(|e| BlobError::Io {
            path: self.root.display().to_string(),
            source: e,
        })?;
        let mut count = 0;
        for entry in entries {
            let entry = entry.map_err(|e| BlobError::Io {
                path: self.root.display().to_string(),
                source: e,
            })?;
            if entry.path().extension().is_some_and(|ext| ext == BLOB_EXTENSION) {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Allocates a uuid-named temporary destination for one write session.
    pub(crate) fn open_temp(&self) -> BlobResult<(PathBuf, File)> {
        let path = self
            .root
            .join("tmp")
            .join(format!("{}.{}", Uuid::new_v4(), TMP_EXTENSION));
        let file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&path)
            .map_err(|e| BlobError::Io {
                path: path.display().to_string(),
                source: e,
            })?;
        Ok((path, file))
    }

    /// Moves finished temporary content into the committed namespace.
    ///
    /// If the key is already stored the temporary file is discarded and the
    /// existing blob is reused: identical content never occupies two slots.
    pub(crate) fn install_temp(&self, tmp_path: &Path, key: &BlobKey) -> BlobResult<()> {
        let dest = self.path_for_key(key);
        if dest.exists() {
            debug!(key = %key, "blob already stored; discarding duplicate content");
            fs::remove_file(tmp_path).map_err(|e| BlobError::Io {
                path: tmp_path.display().to_string(),
                source: e,
            })?;
            return Ok(());
        }
        fs::rename(tmp_path, &dest).map_err(|e| BlobError::Io {
            path: dest.display().to_string(),
            source: e,
        })?;
        debug!(key = %key, path = %dest.display(), "blob installed");
        Ok(())
    }
}
