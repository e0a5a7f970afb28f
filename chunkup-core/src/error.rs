//! Error types for chunkup

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChunkupError {
    #[error("Invalid bucket name: {0}")]
    InvalidBucketName(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Invalid part size: {0} (must be greater than zero)")]
    InvalidPartSize(u64),

    #[error("Invalid hash buffer size: {0} (must be greater than zero)")]
    InvalidBufferSize(usize),

    #[error("Too many parts: {parts} exceeds the limit of {max}")]
    TooManyParts { parts: u64, max: u64 },

    #[error("Unknown digest algorithm: {0}")]
    UnknownDigest(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
