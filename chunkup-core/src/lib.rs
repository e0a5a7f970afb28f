//! Core data models, part planning and content hashing for chunkup

pub mod error;
pub mod hasher;
pub mod plan;
pub mod types;

pub use error::*;
pub use hasher::{digest_bytes, ContentHasher};
pub use plan::{PartIter, PartPlan, PartRange};
pub use types::*;

/// Result type alias for chunkup core operations
pub type Result<T> = std::result::Result<T, ChunkupError>;

/// Default part size (5 MiB)
pub const DEFAULT_PART_SIZE: u64 = 5 << 20;

/// Default hashing buffer size
pub const DEFAULT_HASH_BUFFER_SIZE: usize = 4096;

/// Maximum number of parts in one multipart upload
pub const MAX_PARTS: u64 = 10_000;
