//! chunkup client: resilient multipart uploads to an object store

pub mod client;
pub mod config;
pub mod error;
pub mod memory;
pub mod multipart;
pub mod store;

pub use client::{S3Settings, S3Store};
pub use config::{UploadConfig, S3_MIN_PART_SIZE};
pub use error::{PartError, StoreError, StoreOp, UploadError};
pub use memory::{MemoryStore, StoreCall};
pub use multipart::{MultipartUploader, UploadReceipt, UploadState};
pub use store::{ObjectStore, PartUpload};

pub type Result<T> = std::result::Result<T, UploadError>;
