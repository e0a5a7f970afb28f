//! Multipart upload orchestration
//!
//! Drives one upload through `NotStarted -> Initiated -> PartUploading* ->
//! Completed | Aborted`. Parts are hashed and uploaded strictly in sequence;
//! any failure after initiate, including cancellation and a rejected commit,
//! aborts the session before the error is returned.

use chunkup_core::{
    CompletedObject, ContentHasher, Destination, PartAck, PartPlan, PartRange, SessionId,
    UploadSession, UploadTarget,
};
use serde::Serialize;
use std::future::Future;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::Result;
use crate::config::UploadConfig;
use crate::error::{PartError, UploadError};
use crate::store::{ObjectStore, PartUpload};

/// Life cycle of one upload session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    NotStarted,
    Initiated,
    PartUploading(u32),
    Completed,
    Aborted,
}

impl UploadState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, UploadState::Completed | UploadState::Aborted)
    }

    fn can_move_to(&self, next: UploadState) -> bool {
        use UploadState::*;
        match (*self, next) {
            (NotStarted, Initiated) => true,
            (Initiated, PartUploading(1)) => true,
            (PartUploading(n), PartUploading(m)) => m == n + 1,
            (Initiated | PartUploading(_), Completed | Aborted) => true,
            _ => false,
        }
    }
}

/// Outcome of a committed upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadReceipt {
    pub destination: Destination,
    pub session: SessionId,
    pub parts: usize,
    pub bytes: u64,
    pub object: CompletedObject,
}

/// Uploads local files through an [`ObjectStore`]
pub struct MultipartUploader<S> {
    store: S,
    config: UploadConfig,
}

impl<S: ObjectStore> MultipartUploader<S> {
    pub fn new(store: S, config: UploadConfig) -> Self {
        MultipartUploader { store, config }
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Upload `source` to `destination`
    pub async fn upload(
        &self,
        source: impl AsRef<Path>,
        destination: &Destination,
    ) -> Result<UploadReceipt> {
        self.upload_with_cancel(source, destination, CancellationToken::new())
            .await
    }

    /// Upload `source` to `destination`, stopping early if `cancel` fires.
    ///
    /// Cancellation after initiate still aborts the session.
    pub async fn upload_with_cancel(
        &self,
        source: impl AsRef<Path>,
        destination: &Destination,
        cancel: CancellationToken,
    ) -> Result<UploadReceipt> {
        let source = source.as_ref();
        self.config.validate()?;
        let hasher = self.config.hasher()?;

        let target = UploadTarget::from_path(source, destination.clone()).map_err(|e| {
            UploadError::Source {
                path: source.to_path_buf(),
                source: e,
            }
        })?;
        let plan = PartPlan::new(target.length, self.config.part_size)?;
        if plan.is_empty() {
            return Err(UploadError::EmptySource(target.source));
        }
        if cancel.is_cancelled() {
            return Err(UploadError::Cancelled { completed_parts: 0 });
        }

        let mut run = UploadRun {
            store: &self.store,
            hasher,
            target: &target,
            cancel: &cancel,
            state: UploadState::NotStarted,
        };
        run.execute(&plan).await
    }
}

/// State for a single call to `upload`
struct UploadRun<'a, S> {
    store: &'a S,
    hasher: ContentHasher,
    target: &'a UploadTarget,
    cancel: &'a CancellationToken,
    state: UploadState,
}

impl<S: ObjectStore> UploadRun<'_, S> {
    fn advance(&mut self, next: UploadState) {
        debug_assert!(
            self.state.can_move_to(next),
            "illegal upload transition {:?} -> {:?}",
            self.state,
            next
        );
        self.state = next;
    }

    async fn execute(&mut self, plan: &PartPlan) -> Result<UploadReceipt> {
        let target = self.target;
        let destination = &target.destination;
        info!(
            source = %target.source.display(),
            %destination,
            bytes = target.length,
            parts = plan.part_count(),
            part_size = plan.part_size(),
            "starting multipart upload"
        );

        let session = self
            .store
            .initiate(destination, self.hasher.algorithm())
            .await
            .map_err(UploadError::Initiation)?;
        self.advance(UploadState::Initiated);
        info!(session = %session.id, "multipart upload initiated");

        let acks = match self.upload_parts(&session, plan).await {
            Ok(acks) => acks,
            Err(err) => return Err(self.abort(&session, err).await),
        };

        // Commit is not raced against cancellation: a commit that lands
        // server-side after we stopped waiting could not be aborted.
        let object = match self.store.complete(&session, &acks).await {
            Ok(object) => object,
            Err(e) => return Err(self.abort(&session, UploadError::Completion(e)).await),
        };
        self.advance(UploadState::Completed);
        info!(
            session = %session.id,
            parts = acks.len(),
            e_tag = ?object.e_tag,
            "multipart upload completed"
        );

        Ok(UploadReceipt {
            destination: destination.clone(),
            session: session.id,
            parts: acks.len(),
            bytes: target.length,
            object,
        })
    }

    async fn upload_parts(
        &mut self,
        session: &UploadSession,
        plan: &PartPlan,
    ) -> Result<Vec<PartAck>> {
        let mut acks = Vec::with_capacity(usize::try_from(plan.part_count()).unwrap_or_default());

        for range in plan {
            if self.cancel.is_cancelled() {
                return Err(UploadError::Cancelled {
                    completed_parts: acks.len(),
                });
            }
            self.advance(UploadState::PartUploading(range.number));

            let ack = self
                .upload_part(session, range)
                .await
                .map_err(|cause| match cause {
                    PartFailure::Cancelled => UploadError::Cancelled {
                        completed_parts: acks.len(),
                    },
                    PartFailure::Failed(cause) => UploadError::PartUpload {
                        part_number: range.number,
                        cause,
                    },
                })?;
            acks.push(ack);
        }

        Ok(acks)
    }

    async fn upload_part(
        &self,
        session: &UploadSession,
        range: PartRange,
    ) -> std::result::Result<PartAck, PartFailure> {
        let digest = cancellable(self.cancel, hash_range(self.hasher, self.target, range))
            .await
            .ok_or(PartFailure::Cancelled)??;
        if digest.bytes_read != range.len {
            return Err(PartError::ShortRead {
                expected: range.len,
                actual: digest.bytes_read,
            }
            .into());
        }
        debug!(
            part_number = range.number,
            offset = range.offset,
            len = range.len,
            digest = %digest.to_hex(),
            "part hashed"
        );

        let part = PartUpload {
            source: self.target.source.clone(),
            range,
            digest,
        };
        let ack = cancellable(self.cancel, self.store.upload_part(session, &part))
            .await
            .ok_or(PartFailure::Cancelled)?
            .map_err(PartError::Store)?;
        debug!(part_number = ack.part_number, tag = %ack.tag, "part uploaded");

        Ok(ack)
    }

    /// Abort `session` after `cause`, returning the error to surface
    async fn abort(&mut self, session: &UploadSession, cause: UploadError) -> UploadError {
        warn!(session = %session.id, error = %cause, "aborting multipart upload");
        let aborted = self.store.abort(session).await;
        self.advance(UploadState::Aborted);

        match aborted {
            Ok(()) => {
                info!(session = %session.id, "multipart upload aborted");
                cause
            }
            Err(abort) => {
                error!(session = %session.id, error = %abort, "abort failed; session may linger");
                UploadError::AbortFailed {
                    session: session.id.clone(),
                    original: Box::new(cause),
                    abort,
                }
            }
        }
    }
}

/// Part-level failure before it is tied to a part number
enum PartFailure {
    Cancelled,
    Failed(PartError),
}

impl From<PartError> for PartFailure {
    fn from(err: PartError) -> Self {
        PartFailure::Failed(err)
    }
}

impl From<std::io::Error> for PartFailure {
    fn from(err: std::io::Error) -> Self {
        PartFailure::Failed(PartError::Read(err))
    }
}

/// Hash a range on the blocking pool
async fn hash_range(
    hasher: ContentHasher,
    target: &UploadTarget,
    range: PartRange,
) -> std::io::Result<chunkup_core::PartDigest> {
    let path = target.source.clone();
    tokio::task::spawn_blocking(move || hasher.digest_file_range(path, range.offset, range.len))
        .await
        .map_err(std::io::Error::other)?
}

/// Run `fut` unless `cancel` fires first
async fn cancellable<F: Future>(cancel: &CancellationToken, fut: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        out = fut => Some(out),
    }
}
