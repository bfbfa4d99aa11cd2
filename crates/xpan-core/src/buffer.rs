//! # Random-Access Content Buffer
//!
//! The upload source is read once and is not assumed seekable, yet the block
//! transmitter needs to slice arbitrary blocks after negotiation. The
//! [`ContentBuffer`] retains everything the digest pass reads.
//!
//! Content stays in memory up to a configured limit; beyond it the buffer
//! spills to an anonymous temporary file that the OS removes when the buffer
//! is dropped.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use parking_lot::Mutex;

use crate::error::CoreError;
use crate::target::UploadTarget;

enum Storage {
    Memory(Vec<u8>),
    Spilled(Mutex<File>),
}

/// Append-then-read buffer holding the full content of one upload.
pub struct ContentBuffer {
    storage: Storage,
    len: u64,
    memory_limit: u64,
}

impl std::fmt::Debug for ContentBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentBuffer")
            .field("len", &self.len)
            .field("spilled", &self.is_spilled())
            .field("memory_limit", &self.memory_limit)
            .finish()
    }
}

impl ContentBuffer {
    /// Create an empty buffer that keeps at most `memory_limit` bytes in memory.
    pub fn new(memory_limit: u64) -> Self {
        Self {
            storage: Storage::Memory(Vec::new()),
            len: 0,
            memory_limit,
        }
    }

    /// Append bytes, spilling to a temporary file once the memory limit is crossed.
    pub fn append(&mut self, data: &[u8]) -> Result<(), CoreError> {
        let new_len = self.len + data.len() as u64;
        match &mut self.storage {
            Storage::Memory(buf) if new_len <= self.memory_limit => {
                buf.extend_from_slice(data);
            }
            Storage::Memory(buf) => {
                let mut file = tempfile::tempfile()?;
                file.write_all(buf)?;
                file.write_all(data)?;
                tracing::debug!(
                    bytes = new_len,
                    limit = self.memory_limit,
                    "content buffer spilled to temporary file"
                );
                self.storage = Storage::Spilled(Mutex::new(file));
            }
            Storage::Spilled(file) => {
                file.get_mut().write_all(data)?;
            }
        }
        self.len = new_len;
        Ok(())
    }

    /// Number of bytes buffered.
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Whether no bytes have been buffered.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether the content overflowed to temporary storage.
    pub fn is_spilled(&self) -> bool {
        matches!(self.storage, Storage::Spilled(_))
    }

    /// Read `len` bytes starting at `offset`.
    ///
    /// The range must lie inside the buffered content.
    pub fn read_range(&self, offset: u64, len: u64) -> Result<Vec<u8>, CoreError> {
        let end = offset.checked_add(len).filter(|end| *end <= self.len).ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("range {offset}+{len} exceeds buffered length {}", self.len),
            )
        })?;
        match &self.storage {
            Storage::Memory(buf) => Ok(buf[offset as usize..end as usize].to_vec()),
            Storage::Spilled(file) => {
                let mut file = file.lock();
                file.seek(SeekFrom::Start(offset))?;
                let mut out = vec![0u8; len as usize];
                file.read_exact(&mut out)?;
                Ok(out)
            }
        }
    }

    /// Slice block `index` according to the target's block layout.
    pub fn block(&self, target: &UploadTarget, index: usize) -> Result<Vec<u8>, CoreError> {
        let len = target.block_len(index).ok_or(CoreError::BlockOutOfRange {
            index,
            block_count: target.block_count(),
        })?;
        self.read_range(target.block_offset(index), len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_content_stays_in_memory() {
        let mut buf = ContentBuffer::new(16);
        buf.append(b"hello").unwrap();
        buf.append(b" world").unwrap();
        assert!(!buf.is_spilled());
        assert_eq!(buf.len(), 11);
        assert_eq!(buf.read_range(6, 5).unwrap(), b"world");
    }

    #[test]
    fn crossing_the_limit_spills_and_keeps_contents() {
        let mut buf = ContentBuffer::new(4);
        buf.append(b"abc").unwrap();
        assert!(!buf.is_spilled());
        buf.append(b"defgh").unwrap();
        assert!(buf.is_spilled());
        buf.append(b"ij").unwrap();
        assert_eq!(buf.len(), 10);
        assert_eq!(buf.read_range(0, 10).unwrap(), b"abcdefghij");
        assert_eq!(buf.read_range(2, 3).unwrap(), b"cde");
    }

    #[test]
    fn spilled_buffer_serves_concurrent_readers() {
        let data: Vec<u8> = (0..=255u8).cycle().take(4096).collect();
        let mut buf = ContentBuffer::new(16);
        buf.append(&data).unwrap();
        assert!(buf.is_spilled());

        std::thread::scope(|scope| {
            for i in 0..8u64 {
                let buf = &buf;
                let data = &data;
                scope.spawn(move || {
                    let offset = i * 512;
                    let got = buf.read_range(offset, 512).unwrap();
                    assert_eq!(got, &data[offset as usize..offset as usize + 512]);
                });
            }
        });
    }

    #[test]
    fn range_past_end_is_rejected() {
        let mut buf = ContentBuffer::new(64);
        buf.append(b"abc").unwrap();
        assert!(buf.read_range(2, 2).is_err());
        assert!(buf.read_range(u64::MAX, 2).is_err());
    }

    #[test]
    fn block_slices_follow_target_layout() {
        let target = UploadTarget::new("/x", 10).unwrap().with_block_size(4);
        let mut buf = ContentBuffer::new(3);
        buf.append(b"0123456789").unwrap();
        assert_eq!(buf.block(&target, 0).unwrap(), b"0123");
        assert_eq!(buf.block(&target, 2).unwrap(), b"89");
        match buf.block(&target, 3).unwrap_err() {
            CoreError::BlockOutOfRange { index, block_count } => {
                assert_eq!(index, 3);
                assert_eq!(block_count, 3);
            }
            other => panic!("expected BlockOutOfRange, got: {other:?}"),
        }
    }
}
