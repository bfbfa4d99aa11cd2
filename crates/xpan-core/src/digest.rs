//! # Content Digests
//!
//! The remote deduplicates by MD5: the precreate call declares the
//! whole-content hash, the hash of the leading slice, and one hash per
//! fixed-size block. [`DigestEngine`] computes all of them in a single pass
//! over a non-seekable source.
//!
//! ## Invariants
//!
//! - `block_md5s.len() == ceil(size / block_size)`; empty content has no blocks.
//! - Every hash is 32 lowercase hex characters ([`Md5Hex`]).
//! - The source is read exactly once; its bytes end up in the returned
//!   [`ContentBuffer`].

use std::io::{ErrorKind, Read};

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};

use crate::buffer::ContentBuffer;
use crate::error::{CoreError, SizeError};
use crate::target::UploadTarget;

/// Length of the leading slice hashed for `slice-md5`: 256 KiB.
pub const SLICE_LEN: u64 = 256 * 1024;

const READ_CHUNK: usize = 64 * 1024;

const MAX_PREALLOCATED_BLOCKS: usize = 1024;

/// A 128-bit MD5 hash as 32 lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Md5Hex(String);

impl Md5Hex {
    /// Hash `data` in one call.
    pub fn of(data: &[u8]) -> Self {
        Self(hex::encode(Md5::digest(data)))
    }

    /// Parse a hex string, accepting either case. Returns `None` unless the
    /// input is exactly 32 hex digits.
    pub fn parse(s: &str) -> Option<Self> {
        if s.len() == 32 && s.bytes().all(|b| b.is_ascii_hexdigit()) {
            Some(Self(s.to_ascii_lowercase()))
        } else {
            None
        }
    }

    /// The hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn finish(hasher: &mut Md5) -> Self {
        Self(hex::encode(hasher.finalize_reset()))
    }
}

impl std::fmt::Display for Md5Hex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The complete digest set for one piece of content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentDigest {
    /// Content length in bytes.
    pub size: u64,
    /// MD5 of the whole content.
    pub content_md5: Md5Hex,
    /// MD5 of the first [`SLICE_LEN`] bytes (or everything, if shorter).
    pub slice_md5: Md5Hex,
    /// MD5 of each block, in block order.
    pub block_md5s: Vec<Md5Hex>,
}

impl ContentDigest {
    /// Number of blocks.
    pub fn block_count(&self) -> usize {
        self.block_md5s.len()
    }

    /// The block list as the JSON array of hex strings the remote expects.
    pub fn block_list_json(&self) -> String {
        // Serializing a Vec of plain strings cannot fail.
        serde_json::to_string(&self.block_md5s).unwrap_or_else(|_| "[]".to_string())
    }
}

/// Single-pass hasher that also buffers the content for random access.
#[derive(Debug, Clone)]
pub struct DigestEngine {
    memory_limit: u64,
}

impl DigestEngine {
    /// Create an engine whose buffers keep at most `memory_limit` bytes in memory.
    pub fn new(memory_limit: u64) -> Self {
        Self { memory_limit }
    }

    /// Consume `source` and produce its digest plus a buffer of its bytes.
    ///
    /// Fails with [`SizeError::ShortRead`] if the source ends before
    /// `target.size()` bytes, or [`SizeError::Overrun`] if it yields more.
    pub fn digest<R: Read>(
        &self,
        target: &UploadTarget,
        source: R,
    ) -> Result<(ContentDigest, ContentBuffer), CoreError> {
        let mut buffer = ContentBuffer::new(self.memory_limit);
        let digest = self.hash(target, source, Some(&mut buffer))?;
        tracing::debug!(spilled = buffer.is_spilled(), "content buffered");
        Ok((digest, buffer))
    }

    /// Like [`digest`](Self::digest), but retains nothing: the bytes are
    /// hashed and dropped.
    pub fn digest_only<R: Read>(
        &self,
        target: &UploadTarget,
        source: R,
    ) -> Result<ContentDigest, CoreError> {
        self.hash(target, source, None)
    }

    fn hash<R: Read>(
        &self,
        target: &UploadTarget,
        mut source: R,
        mut sink: Option<&mut ContentBuffer>,
    ) -> Result<ContentDigest, CoreError> {
        let declared = target.size();
        let block_size = target.block_size();

        let mut whole = Md5::new();
        let mut slice = Md5::new();
        let mut block = Md5::new();
        let mut block_fill: u64 = 0;
        // The declared size is untrusted until the source has been read.
        let mut block_md5s = Vec::with_capacity(target.block_count().min(MAX_PREALLOCATED_BLOCKS));
        let mut read: u64 = 0;
        let mut chunk = vec![0u8; READ_CHUNK];

        loop {
            let n = match source.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            if read + n as u64 > declared {
                return Err(SizeError::Overrun { declared }.into());
            }
            let data = &chunk[..n];

            whole.update(data);
            if read < SLICE_LEN {
                let take = (SLICE_LEN - read).min(n as u64) as usize;
                slice.update(&data[..take]);
            }

            let mut rest = data;
            while !rest.is_empty() {
                let take = (block_size - block_fill).min(rest.len() as u64) as usize;
                block.update(&rest[..take]);
                block_fill += take as u64;
                rest = &rest[take..];
                if block_fill == block_size {
                    block_md5s.push(Md5Hex::finish(&mut block));
                    block_fill = 0;
                }
            }

            if let Some(buffer) = sink.as_deref_mut() {
                buffer.append(data)?;
            }
            read += n as u64;
        }

        if read < declared {
            return Err(SizeError::ShortRead { declared, read }.into());
        }
        if block_fill > 0 {
            block_md5s.push(Md5Hex::finish(&mut block));
        }

        let digest = ContentDigest {
            size: read,
            content_md5: Md5Hex::finish(&mut whole),
            slice_md5: Md5Hex::finish(&mut slice),
            block_md5s,
        };
        tracing::debug!(
            size = digest.size,
            blocks = digest.block_count(),
            content_md5 = %digest.content_md5,
            "content digested"
        );
        Ok(digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EMPTY_MD5: &str = "d41d8cd98f00b204e9800998ecf8427e";

    fn target(size: usize, block: u64) -> UploadTarget {
        UploadTarget::new("/t", size as i64).unwrap().with_block_size(block)
    }

    /// Reader that hands out at most three bytes per call.
    struct Trickle<'a>(&'a [u8]);

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let n = self.0.len().min(buf.len()).min(3);
            buf[..n].copy_from_slice(&self.0[..n]);
            self.0 = &self.0[n..];
            Ok(n)
        }
    }

    #[test]
    fn empty_content_has_no_blocks() {
        let (digest, buffer) = DigestEngine::new(1024)
            .digest(&target(0, 4), &b""[..])
            .unwrap();
        assert!(digest.block_md5s.is_empty());
        assert_eq!(digest.content_md5.as_str(), EMPTY_MD5);
        assert_eq!(digest.slice_md5.as_str(), EMPTY_MD5);
        assert_eq!(digest.block_list_json(), "[]");
        assert!(buffer.is_empty());
    }

    #[test]
    fn block_hashes_match_independent_slices() {
        let data: Vec<u8> = (0..23u8).collect();
        let (digest, buffer) = DigestEngine::new(8)
            .digest(&target(data.len(), 10), Trickle(&data))
            .unwrap();

        assert_eq!(digest.block_count(), 3);
        assert_eq!(digest.block_md5s[0], Md5Hex::of(&data[0..10]));
        assert_eq!(digest.block_md5s[1], Md5Hex::of(&data[10..20]));
        assert_eq!(digest.block_md5s[2], Md5Hex::of(&data[20..23]));
        assert_eq!(digest.content_md5, Md5Hex::of(&data));
        assert_eq!(buffer.read_range(0, 23).unwrap(), data);
    }

    #[test]
    fn slice_md5_covers_leading_256_kib() {
        let data = vec![7u8; (SLICE_LEN + 100) as usize];
        let (digest, _) = DigestEngine::new(u64::MAX)
            .digest(&target(data.len(), 1024 * 1024), &data[..])
            .unwrap();
        assert_eq!(digest.slice_md5, Md5Hex::of(&data[..SLICE_LEN as usize]));
        assert_ne!(digest.slice_md5, digest.content_md5);
    }

    #[test]
    fn short_read_is_a_size_error() {
        let err = DigestEngine::new(64)
            .digest(&target(10, 4), &b"abc"[..])
            .unwrap_err();
        match err {
            CoreError::Size(SizeError::ShortRead { declared, read }) => {
                assert_eq!(declared, 10);
                assert_eq!(read, 3);
            }
            other => panic!("expected ShortRead, got: {other:?}"),
        }
    }

    #[test]
    fn overrun_is_a_size_error() {
        let err = DigestEngine::new(64)
            .digest(&target(2, 4), &b"abc"[..])
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::Size(SizeError::Overrun { declared: 2 })
        ));
    }

    #[test]
    fn block_list_json_is_array_of_hex_strings() {
        let (digest, _) = DigestEngine::new(64)
            .digest(&target(3, 2), &b"abc"[..])
            .unwrap();
        let parsed: Vec<String> = serde_json::from_str(&digest.block_list_json()).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0], Md5Hex::of(b"ab").as_str());
    }

    #[test]
    fn huge_declared_size_with_short_source_is_a_size_error() {
        let target = UploadTarget::new("/x", i64::MAX).unwrap();
        let err = DigestEngine::new(1024).digest(&target, &b"abc"[..]).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Size(SizeError::ShortRead { read: 3, .. })
        ));
    }

    #[test]
    fn digest_only_matches_buffered_digest() {
        let data: Vec<u8> = (0..50u8).collect();
        let engine = DigestEngine::new(8);
        let (buffered, _) = engine.digest(&target(data.len(), 16), &data[..]).unwrap();
        let hashed = engine.digest_only(&target(data.len(), 16), Trickle(&data)).unwrap();
        assert_eq!(hashed, buffered);
        assert!(matches!(
            engine.digest_only(&target(60, 16), &data[..]),
            Err(CoreError::Size(SizeError::ShortRead { .. }))
        ));
    }

    #[test]
    fn md5_hex_parse_normalizes_case() {
        let parsed = Md5Hex::parse("D41D8CD98F00B204E9800998ECF8427E").unwrap();
        assert_eq!(parsed.as_str(), EMPTY_MD5);
        assert!(Md5Hex::parse("xyz").is_none());
        assert!(Md5Hex::parse(&"g".repeat(32)).is_none());
    }
}
