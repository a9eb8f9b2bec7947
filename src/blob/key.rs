//! Blob content digests.
//!
//! A blob's key is the 20-byte SHA-1 digest of its plaintext; the store
//! uses it as the primary key, which makes storage content-addressed. A
//! 16-byte MD5 digest is computed alongside for interoperability with
//! stores that record MD5 attachment digests, but it is never used for
//! lookup.
//!
//! Display forms are base64 with an algorithm prefix: `sha1-<base64>` and
//! `md5-<base64>`. On-disk blob file names use the uppercase hex form of
//! the key instead.

use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use sha1::{Digest, Sha1};

use super::errors::BlobError;

/// Byte length of a primary (SHA-1) blob key.
pub const BLOB_KEY_LEN: usize = 20;

/// Byte length of the legacy MD5 digest.
pub const MD5_DIGEST_LEN: usize = 16;

const SHA1_PREFIX: &str = "sha1-";
const MD5_PREFIX: &str = "md5-";

/// Content digest identifying one blob's plaintext; the store's primary key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlobKey([u8; BLOB_KEY_LEN]);

impl BlobKey {
    pub fn from_bytes(bytes: [u8; BLOB_KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Digests a complete in-memory buffer. Streaming writes hash
    /// incrementally instead; see `BlobWriter`.
    pub fn compute(data: &[u8]) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(data);
        Self(hasher.finalize().into())
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8; BLOB_KEY_LEN] {
        &self.0
    }

    /// Uppercase hex form, used for blob file names.
    pub fn hex(&self) -> String {
        hex::encode_upper(self.0)
    }

    /// The `sha1-<base64>` interchange form.
    pub fn digest_string(&self) -> String {
        format!("{}{}", SHA1_PREFIX, STANDARD.encode(self.0))
    }
}

impl fmt::Display for BlobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.digest_string())
    }
}

impl fmt::Debug for BlobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlobKey({})", self.digest_string())
    }
}

impl FromStr for BlobKey {
    type Err = BlobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let encoded = s
            .strip_prefix(SHA1_PREFIX)
            .ok_or_else(|| BlobError::InvalidKey(s.to_string()))?;
        let bytes = STANDARD
            .decode(encoded)
            .map_err(|_| BlobError::InvalidKey(s.to_string()))?;
        let bytes: [u8; BLOB_KEY_LEN] = bytes
            .try_into()
            .map_err(|_| BlobError::InvalidKey(s.to_string()))?;
        Ok(Self(bytes))
    }
}

/// Legacy MD5 digest, retained alongside the key for interop only.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Md5Digest([u8; MD5_DIGEST_LEN]);

impl Md5Digest {
    pub fn from_bytes(bytes: [u8; MD5_DIGEST_LEN]) -> Self {
        Self(bytes)
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8; MD5_DIGEST_LEN] {
        &self.0
    }

    /// The `md5-<base64>` interchange form.
    pub fn digest_string(&self) -> String {
        format!("{}{}", MD5_PREFIX, STANDARD.encode(self.0))
    }
}

impl fmt::Display for Md5Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.digest_string())
    }
}

impl fmt::Debug for Md5Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Md5Digest({})", self.digest_string())
    }
}
