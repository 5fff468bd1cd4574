//! # Embedding
//!
//! Prefix obfuscation for resources embedded in book files.
//!
//! The first [`EMBEDDED_PREFIX_LEN`] bytes of a stream are XORed with a key
//! derived from the resource uid; the rest passes through. Encoding and
//! decoding are the same operation.

use std::io::{self, Read};

use sha1::{Digest, Sha1};
use tracing::trace;

/// Bytes covered by the transform
pub const EMBEDDED_PREFIX_LEN: u64 = 1040;

/// Key derived from a resource uid
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddingKey([u8; 20]);

impl EmbeddingKey {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// SHA-1 digest of the uid's UTF-8 bytes
pub fn derive_key(uid: &str) -> EmbeddingKey {
    EmbeddingKey(Sha1::digest(uid.as_bytes()).into())
}

/// Transform `buf` in place, where `buf[0]` sits at stream offset `offset`
pub fn apply_prefix(key: &EmbeddingKey, offset: u64, buf: &mut [u8]) {
    if offset >= EMBEDDED_PREFIX_LEN {
        return;
    }

    let key = key.as_bytes();
    let covered = (EMBEDDED_PREFIX_LEN - offset).min(buf.len() as u64) as usize;
    for (i, byte) in buf[..covered].iter_mut().enumerate() {
        let position = offset as usize + i;
        *byte ^= key[position % key.len()];
    }
}

/// Reader that undoes (or applies) the prefix transform on the fly
#[derive(Debug)]
pub struct EmbeddingReader<R> {
    inner: R,
    key: EmbeddingKey,
    offset: u64,
}

impl<R: Read> EmbeddingReader<R> {
    pub fn new(inner: R, uid: &str) -> Self {
        Self::with_key(inner, derive_key(uid))
    }

    pub fn with_key(inner: R, key: EmbeddingKey) -> Self {
        Self {
            inner,
            key,
            offset: 0,
        }
    }

    /// Current stream offset
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for EmbeddingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        apply_prefix(&self.key, self.offset, &mut buf[..n]);
        if self.offset < EMBEDDED_PREFIX_LEN && self.offset + n as u64 >= EMBEDDED_PREFIX_LEN {
            trace!(offset = self.offset, "Embedded prefix consumed");
        }
        self.offset += n as u64;
        Ok(n)
    }
}
