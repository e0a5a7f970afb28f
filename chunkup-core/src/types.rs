//! Core data types for chunkup

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Destination bucket name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BucketName(String);

impl BucketName {
    /// Create a new bucket name with validation
    pub fn new(name: &str) -> crate::Result<Self> {
        if name.len() < 3 || name.len() > 63 {
            return Err(crate::ChunkupError::InvalidBucketName(format!(
                "'{}' must be between 3 and 63 characters",
                name
            )));
        }

        // Lowercase letters, digits, hyphens and dots only
        if !name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
        {
            return Err(crate::ChunkupError::InvalidBucketName(format!(
                "invalid characters in '{}'",
                name
            )));
        }

        let edge_ok = |c: Option<char>| c.is_some_and(|c| c.is_ascii_alphanumeric());
        if !edge_ok(name.chars().next()) || !edge_ok(name.chars().last()) {
            return Err(crate::ChunkupError::InvalidBucketName(format!(
                "'{}' must start and end with a letter or digit",
                name
            )));
        }

        Ok(BucketName(name.to_string()))
    }

    /// Get the bucket name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BucketName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Object key within a bucket
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectKey(String);

impl ObjectKey {
    /// Maximum key length in bytes
    pub const MAX_LEN: usize = 1024;

    /// Create a new key with validation
    pub fn new(key: &str) -> crate::Result<Self> {
        if key.is_empty() {
            return Err(crate::ChunkupError::InvalidKey("empty key".to_string()));
        }

        if key.len() > Self::MAX_LEN {
            return Err(crate::ChunkupError::InvalidKey(format!(
                "key is {} bytes, limit is {}",
                key.len(),
                Self::MAX_LEN
            )));
        }

        if key.chars().any(|c| c.is_control()) {
            return Err(crate::ChunkupError::InvalidKey(
                "control characters not allowed".to_string(),
            ));
        }

        Ok(ObjectKey(key.to_string()))
    }

    /// Get the key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where an upload lands in the remote store
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Destination {
    pub bucket: BucketName,
    pub key: ObjectKey,
}

impl Destination {
    pub fn new(bucket: BucketName, key: ObjectKey) -> Self {
        Destination { bucket, key }
    }

    /// Validate and pair a bucket name and key
    pub fn parse(bucket: &str, key: &str) -> crate::Result<Self> {
        Ok(Destination {
            bucket: BucketName::new(bucket)?,
            key: ObjectKey::new(key)?,
        })
    }
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

/// A local source file bound to its destination for one upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTarget {
    pub destination: Destination,
    pub source: PathBuf,
    pub length: u64,
}

impl UploadTarget {
    /// Stat the source file and capture its length
    pub fn from_path(source: impl AsRef<Path>, destination: Destination) -> std::io::Result<Self> {
        let source = source.as_ref().to_path_buf();
        let metadata = std::fs::metadata(&source)?;
        if !metadata.is_file() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} is not a regular file", source.display()),
            ));
        }

        Ok(UploadTarget {
            destination,
            source,
            length: metadata.len(),
        })
    }
}

/// Server-side multipart upload identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        SessionId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle for an initiated multipart upload.
///
/// Created once per upload attempt and terminated by exactly one complete or
/// abort call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadSession {
    pub id: SessionId,
    pub destination: Destination,
    pub digest: DigestAlgorithm,
}

/// Hash algorithm used for per-part integrity checks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    /// MD5, sent as the Content-MD5 header
    #[default]
    Md5,
    /// SHA-256, sent as an additional checksum
    Sha256,
}

impl DigestAlgorithm {
    /// Digest length in bytes
    pub fn output_len(&self) -> usize {
        match self {
            DigestAlgorithm::Md5 => 16,
            DigestAlgorithm::Sha256 => 32,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DigestAlgorithm::Md5 => "md5",
            DigestAlgorithm::Sha256 => "sha256",
        }
    }
}

impl FromStr for DigestAlgorithm {
    type Err = crate::ChunkupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "md5" => Ok(DigestAlgorithm::Md5),
            "sha256" | "sha-256" => Ok(DigestAlgorithm::Sha256),
            other => Err(crate::ChunkupError::UnknownDigest(other.to_string())),
        }
    }
}

impl std::fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Digest over one part's byte range
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartDigest {
    pub algorithm: DigestAlgorithm,
    bytes: Vec<u8>,
    /// Bytes actually consumed; less than requested if the source ended early
    pub bytes_read: u64,
}

impl PartDigest {
    pub fn new(algorithm: DigestAlgorithm, bytes: Vec<u8>, bytes_read: u64) -> Self {
        debug_assert_eq!(bytes.len(), algorithm.output_len());
        PartDigest {
            algorithm,
            bytes,
            bytes_read,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Base64 form, as carried in integrity headers
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }
}

/// Store acknowledgment for one uploaded part
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartAck {
    pub part_number: u32,
    /// Opaque tag (ETag) returned by the store
    pub tag: String,
    /// Checksum echoed by the store, repeated on commit when present
    pub checksum: Option<String>,
}

impl PartAck {
    pub fn new(part_number: u32, tag: impl Into<String>) -> Self {
        PartAck {
            part_number,
            tag: tag.into(),
            checksum: None,
        }
    }

    pub fn with_checksum(mut self, checksum: impl Into<String>) -> Self {
        self.checksum = Some(checksum.into());
        self
    }
}

/// Reference to the committed object
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedObject {
    pub location: Option<String>,
    pub e_tag: Option<String>,
    pub version_id: Option<String>,
}
