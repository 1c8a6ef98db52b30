//! Content fingerprinting.
//!
//! Computes a deterministic SHA-256 digest of raw byte content. The digest is
//! the identity key for exact-duplicate detection: identical bytes always
//! yield the identical digest, across calls and processes.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::io::Read;

use crate::{Error, Result};

/// Length of a hex-encoded SHA-256 digest.
const DIGEST_HEX_LEN: usize = 64;

/// Read buffer size for the streaming fingerprint variant.
const READ_CHUNK_BYTES: usize = 64 * 1024;

/// A content digest: the lowercase hex encoding of a SHA-256 hash.
///
/// A digest is a pure function of byte content and nothing else. Two
/// artifacts with equal digests hold byte-identical content (up to hash
/// collision, which is negligible for SHA-256).
///
/// # Example
///
/// ```rust
/// use doppel::fingerprint;
///
/// let digest = fingerprint(b"hello world");
/// assert_eq!(digest.as_str().len(), 64);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentDigest(String);

impl ContentDigest {
    /// Parses a digest from its hex representation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] unless the input is exactly 64
    /// lowercase hex characters.
    pub fn parse(hex_str: &str) -> Result<Self> {
        if hex_str.len() == DIGEST_HEX_LEN
            && hex_str
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
        {
            Ok(Self(hex_str.to_string()))
        } else {
            Err(Error::InvalidInput(format!(
                "digest must be {DIGEST_HEX_LEN} lowercase hex characters, got {hex_str:?}"
            )))
        }
    }

    /// Returns the digest as a hex string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Computes the SHA-256 digest of raw byte content.
///
/// Deterministic and side-effect free: the same bytes produce the same
/// digest on every call. Cannot fail given the bytes are already in memory.
///
/// # Example
///
/// ```rust
/// use doppel::fingerprint;
///
/// let a = fingerprint(b"report-2024.csv contents");
/// let b = fingerprint(b"report-2024.csv contents");
/// assert_eq!(a, b);
///
/// let c = fingerprint(b"report-2024.csv content!");
/// assert_ne!(a, c);
/// ```
#[must_use]
pub fn fingerprint(content: &[u8]) -> ContentDigest {
    let mut hasher = Sha256::new();
    hasher.update(content);
    ContentDigest(hex::encode(hasher.finalize()))
}

/// Computes the SHA-256 digest of a byte stream.
///
/// Reads the source in 64 KiB chunks so arbitrarily large uploads can be
/// fingerprinted without buffering them whole.
///
/// # Errors
///
/// Propagates any [`std::io::Error`] from the underlying reader as
/// [`Error::Io`]. The hash itself cannot fail.
pub fn fingerprint_reader<R: Read>(mut reader: R) -> Result<ContentDigest> {
    let mut hasher = Sha256::new();
    let mut buf = [0u8; READ_CHUNK_BYTES];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(ContentDigest(hex::encode(hasher.finalize())))
}
