//! Shared fixtures for upload tests

#![allow(dead_code)]

use async_trait::async_trait;
use chunkup_client::{
    MemoryStore, MultipartUploader, ObjectStore, PartUpload, StoreCall, StoreError, StoreOp,
    UploadConfig,
};
use chunkup_core::{CompletedObject, Destination, DigestAlgorithm, PartAck, UploadSession};
use std::io::Write;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub const MIB: u64 = 1024 * 1024;

/// Deterministic non-repeating-ish bytes so misplaced ranges change digests
pub fn pattern(len: u64) -> Vec<u8> {
    (0..len).map(|i| ((i * 7 + i / 251) % 256) as u8).collect()
}

pub fn fixture(len: u64) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&pattern(len)).unwrap();
    file.flush().unwrap();
    file
}

pub fn destination() -> Destination {
    Destination::parse("test-bucket", "uploads/object.bin").unwrap()
}

pub fn network_error() -> StoreError {
    StoreError::with_code(StoreOp::UploadPart, "RequestTimeout", "connection reset by peer")
}

pub fn uploader(store: &Arc<MemoryStore>, part_size: u64) -> MultipartUploader<Arc<MemoryStore>> {
    MultipartUploader::new(
        Arc::clone(store),
        UploadConfig::default().with_part_size(part_size),
    )
}

/// Session ids named by abort calls, in order
pub fn aborted_sessions(store: &MemoryStore) -> Vec<String> {
    store
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            StoreCall::Abort { session } => Some(session.to_string()),
            _ => None,
        })
        .collect()
}

/// Store wrapper that runs a hook after each successful part upload
pub struct Hooked<F> {
    pub inner: Arc<MemoryStore>,
    pub after_part: F,
}

#[async_trait]
impl<F> ObjectStore for Hooked<F>
where
    F: Fn(&PartAck) + Send + Sync,
{
    async fn initiate(
        &self,
        destination: &Destination,
        digest: DigestAlgorithm,
    ) -> Result<UploadSession, StoreError> {
        self.inner.initiate(destination, digest).await
    }

    async fn upload_part(
        &self,
        session: &UploadSession,
        part: &PartUpload,
    ) -> Result<PartAck, StoreError> {
        let ack = self.inner.upload_part(session, part).await?;
        (self.after_part)(&ack);
        Ok(ack)
    }

    async fn complete(
        &self,
        session: &UploadSession,
        parts: &[PartAck],
    ) -> Result<CompletedObject, StoreError> {
        self.inner.complete(session, parts).await
    }

    async fn abort(&self, session: &UploadSession) -> Result<(), StoreError> {
        self.inner.abort(session).await
    }
}

/// Store wrapper that sends a digest for the wrong bytes
pub struct CorruptDigest {
    pub inner: Arc<MemoryStore>,
    pub part_number: u32,
}

#[async_trait]
impl ObjectStore for CorruptDigest {
    async fn initiate(
        &self,
        destination: &Destination,
        digest: DigestAlgorithm,
    ) -> Result<UploadSession, StoreError> {
        self.inner.initiate(destination, digest).await
    }

    async fn upload_part(
        &self,
        session: &UploadSession,
        part: &PartUpload,
    ) -> Result<PartAck, StoreError> {
        let mut part = part.clone();
        if part.part_number() == self.part_number {
            part.digest = chunkup_core::digest_bytes(part.digest.algorithm, b"not these bytes");
        }
        self.inner.upload_part(session, &part).await
    }

    async fn complete(
        &self,
        session: &UploadSession,
        parts: &[PartAck],
    ) -> Result<CompletedObject, StoreError> {
        self.inner.complete(session, parts).await
    }

    async fn abort(&self, session: &UploadSession) -> Result<(), StoreError> {
        self.inner.abort(session).await
    }
}

/// Store wrapper whose part uploads never finish; the first one fires `cancel`
pub struct Stalled {
    pub inner: Arc<MemoryStore>,
    pub cancel: CancellationToken,
}

#[async_trait]
impl ObjectStore for Stalled {
    async fn initiate(
        &self,
        destination: &Destination,
        digest: DigestAlgorithm,
    ) -> Result<UploadSession, StoreError> {
        self.inner.initiate(destination, digest).await
    }

    async fn upload_part(
        &self,
        _session: &UploadSession,
        _part: &PartUpload,
    ) -> Result<PartAck, StoreError> {
        self.cancel.cancel();
        std::future::pending().await
    }

    async fn complete(
        &self,
        session: &UploadSession,
        parts: &[PartAck],
    ) -> Result<CompletedObject, StoreError> {
        self.inner.complete(session, parts).await
    }

    async fn abort(&self, session: &UploadSession) -> Result<(), StoreError> {
        self.inner.abort(session).await
    }
}
