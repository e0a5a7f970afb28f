//! Upload configuration

use chunkup_core::{
    ChunkupError, ContentHasher, DigestAlgorithm, DEFAULT_HASH_BUFFER_SIZE, DEFAULT_PART_SIZE,
};
use serde::{Deserialize, Serialize};

/// Smallest part size S3 accepts for any part but the last
pub const S3_MIN_PART_SIZE: u64 = 5 << 20;

/// Tunables for one multipart upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Bytes per part; the final part may be shorter
    pub part_size: u64,
    /// Per-part integrity digest
    pub digest: DigestAlgorithm,
    /// Read buffer used while hashing
    pub hash_buffer_size: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        UploadConfig {
            part_size: DEFAULT_PART_SIZE,
            digest: DigestAlgorithm::default(),
            hash_buffer_size: DEFAULT_HASH_BUFFER_SIZE,
        }
    }
}

impl UploadConfig {
    pub fn with_part_size(mut self, part_size: u64) -> Self {
        self.part_size = part_size;
        self
    }

    pub fn with_digest(mut self, digest: DigestAlgorithm) -> Self {
        self.digest = digest;
        self
    }

    pub fn with_hash_buffer_size(mut self, hash_buffer_size: usize) -> Self {
        self.hash_buffer_size = hash_buffer_size;
        self
    }

    pub fn validate(&self) -> Result<(), ChunkupError> {
        if self.part_size == 0 {
            return Err(ChunkupError::InvalidPartSize(self.part_size));
        }
        if self.hash_buffer_size == 0 {
            return Err(ChunkupError::InvalidBufferSize(self.hash_buffer_size));
        }
        Ok(())
    }

    /// Hasher configured for this upload
    pub fn hasher(&self) -> Result<ContentHasher, ChunkupError> {
        ContentHasher::new(self.digest).with_buffer_size(self.hash_buffer_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = UploadConfig::default();
        assert_eq!(config.part_size, 5 * 1024 * 1024);
        assert_eq!(config.digest, DigestAlgorithm::Md5);
        assert_eq!(config.hash_buffer_size, 4096);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_sizes() {
        assert!(matches!(
            UploadConfig::default().with_part_size(0).validate(),
            Err(ChunkupError::InvalidPartSize(0))
        ));
        assert!(matches!(
            UploadConfig::default().with_hash_buffer_size(0).validate(),
            Err(ChunkupError::InvalidBufferSize(0))
        ));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: UploadConfig =
            serde_json::from_str(r#"{ "part_size": 8388608, "digest": "sha256" }"#).unwrap();
        assert_eq!(config.part_size, 8 << 20);
        assert_eq!(config.digest, DigestAlgorithm::Sha256);
        assert_eq!(config.hash_buffer_size, DEFAULT_HASH_BUFFER_SIZE);
    }
}
