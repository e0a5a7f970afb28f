//! Content hashing over byte ranges
//!
//! Reads a range through a fixed-size buffer so memory use does not depend on
//! the part size.

use sha2::{Digest as _, Sha256};
use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;

use crate::{ChunkupError, DigestAlgorithm, PartDigest, Result, DEFAULT_HASH_BUFFER_SIZE};

/// Running hash state for one range
enum HashState {
    Md5(md5::Context),
    Sha256(Sha256),
}

impl HashState {
    fn new(algorithm: DigestAlgorithm) -> Self {
        match algorithm {
            DigestAlgorithm::Md5 => HashState::Md5(md5::Context::new()),
            DigestAlgorithm::Sha256 => HashState::Sha256(Sha256::new()),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            HashState::Md5(ctx) => ctx.consume(data),
            HashState::Sha256(hasher) => hasher.update(data),
        }
    }

    fn finish(self) -> Vec<u8> {
        match self {
            HashState::Md5(ctx) => ctx.compute().0.to_vec(),
            HashState::Sha256(hasher) => hasher.finalize().to_vec(),
        }
    }
}

/// Computes part digests from a readable source
#[derive(Debug, Clone, Copy)]
pub struct ContentHasher {
    algorithm: DigestAlgorithm,
    buffer_size: usize,
}

impl ContentHasher {
    pub fn new(algorithm: DigestAlgorithm) -> Self {
        ContentHasher {
            algorithm,
            buffer_size: DEFAULT_HASH_BUFFER_SIZE,
        }
    }

    /// Use a different read buffer size
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Result<Self> {
        if buffer_size == 0 {
            return Err(ChunkupError::InvalidBufferSize(buffer_size));
        }
        self.buffer_size = buffer_size;
        Ok(self)
    }

    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Hash the next `count` bytes of an already positioned reader.
    ///
    /// Stops early if the reader hits end of input; `bytes_read` on the
    /// returned digest says how much was actually hashed.
    pub fn digest_reader<R: Read>(
        &self,
        reader: &mut R,
        count: u64,
    ) -> std::io::Result<PartDigest> {
        let mut state = HashState::new(self.algorithm);
        let capacity = usize::try_from(count).map_or(self.buffer_size, |n| n.min(self.buffer_size));
        let mut buffer = vec![0u8; capacity];
        let mut consumed = 0u64;

        while consumed < count {
            let chunk = usize::try_from(count - consumed).map_or(capacity, |n| n.min(capacity));
            let read = match reader.read(&mut buffer[..chunk]) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };

            // Only the bytes filled by this read go into the hash
            state.update(&buffer[..read]);
            consumed += read as u64;
        }

        Ok(PartDigest::new(self.algorithm, state.finish(), consumed))
    }

    /// Seek to `offset` and hash `count` bytes
    pub fn digest_range<R: Read + Seek>(
        &self,
        source: &mut R,
        offset: u64,
        count: u64,
    ) -> std::io::Result<PartDigest> {
        source.seek(SeekFrom::Start(offset))?;
        self.digest_reader(source, count)
    }

    /// Open `path` and hash `[offset, offset + count)`
    pub fn digest_file_range(
        &self,
        path: impl AsRef<Path>,
        offset: u64,
        count: u64,
    ) -> std::io::Result<PartDigest> {
        let mut file = File::open(path)?;
        self.digest_range(&mut file, offset, count)
    }
}

/// One-shot digest of an in-memory slice
pub fn digest_bytes(algorithm: DigestAlgorithm, data: &[u8]) -> PartDigest {
    let mut state = HashState::new(algorithm);
    state.update(data);
    PartDigest::new(algorithm, state.finish(), data.len() as u64)
}
