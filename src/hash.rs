//! Content hashing for check-script sources.
//!
//! A [`ContentHash`] is the SHA-256 digest of a unit's full source bytes,
//! taken at registration time. Comparing a stored digest against a fresh
//! read of the file detects any drift between what was reviewed and what is
//! on disk now; a single changed byte breaks the match.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::Path;

/// SHA-256 digest of a script's source.
///
/// Serialized as a lowercase hex string so it reads cleanly in JSON and logs.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Digest of an in-memory byte slice.
    pub fn of_bytes(bytes: &[u8]) -> Self {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self(hasher.finalize().into())
    }

    /// Digest of a file's full contents.
    pub fn of_file(path: impl AsRef<Path>) -> io::Result<Self> {
        let bytes = std::fs::read(path)?;
        Ok(Self::of_bytes(&bytes))
    }

    /// Lowercase hex rendering of the digest.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a 64-character hex string back into a digest.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        let digest: [u8; 32] = bytes
            .try_into()
            .map_err(|_| hex::FromHexError::InvalidStringLength)?;
        Ok(Self(digest))
    }

    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self.to_hex())
    }
}

impl TryFrom<String> for ContentHash {
    type Error = hex::FromHexError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<ContentHash> for String {
    fn from(value: ContentHash) -> Self {
        value.to_hex()
    }
}

/// Recompute a file's digest and compare it with the expected one.
///
/// Returns `Ok(false)` on mismatch; I/O failures (including a missing file)
/// surface as errors so callers can distinguish "changed" from "gone".
pub fn verify_file(path: impl AsRef<Path>, expected: &ContentHash) -> io::Result<bool> {
    Ok(ContentHash::of_file(path)? == *expected)
}
