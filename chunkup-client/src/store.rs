//! Remote object store abstraction

use async_trait::async_trait;
use chunkup_core::{
    CompletedObject, Destination, DigestAlgorithm, PartAck, PartDigest, PartRange, UploadSession,
};
use std::path::PathBuf;

use crate::error::StoreError;

/// A part to send: the byte range by reference, plus its digest
#[derive(Debug, Clone)]
pub struct PartUpload {
    pub source: PathBuf,
    pub range: PartRange,
    pub digest: PartDigest,
}

impl PartUpload {
    pub fn part_number(&self) -> u32 {
        self.range.number
    }
}

/// Multipart upload protocol spoken by the remote store.
///
/// A session returned by [`ObjectStore::initiate`] must be passed to exactly
/// one of [`ObjectStore::complete`] or [`ObjectStore::abort`].
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Open a multipart upload session
    async fn initiate(
        &self,
        destination: &Destination,
        digest: DigestAlgorithm,
    ) -> Result<UploadSession, StoreError>;

    /// Upload one part; the store verifies the supplied digest
    async fn upload_part(
        &self,
        session: &UploadSession,
        part: &PartUpload,
    ) -> Result<PartAck, StoreError>;

    /// Commit every uploaded part as one object
    async fn complete(
        &self,
        session: &UploadSession,
        parts: &[PartAck],
    ) -> Result<CompletedObject, StoreError>;

    /// Discard the session and any parts uploaded so far
    async fn abort(&self, session: &UploadSession) -> Result<(), StoreError>;
}

#[async_trait]
impl<S: ObjectStore + ?Sized> ObjectStore for std::sync::Arc<S> {
    async fn initiate(
        &self,
        destination: &Destination,
        digest: DigestAlgorithm,
    ) -> Result<UploadSession, StoreError> {
        (**self).initiate(destination, digest).await
    }

    async fn upload_part(
        &self,
        session: &UploadSession,
        part: &PartUpload,
    ) -> Result<PartAck, StoreError> {
        (**self).upload_part(session, part).await
    }

    async fn complete(
        &self,
        session: &UploadSession,
        parts: &[PartAck],
    ) -> Result<CompletedObject, StoreError> {
        (**self).complete(session, parts).await
    }

    async fn abort(&self, session: &UploadSession) -> Result<(), StoreError> {
        (**self).abort(session).await
    }
}
