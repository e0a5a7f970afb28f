//! S3 multipart upload backend

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::types::{ChecksumAlgorithm, CompletedMultipartUpload, CompletedPart};
use aws_smithy_types::byte_stream::{ByteStream, Length};
use chunkup_core::{
    CompletedObject, Destination, DigestAlgorithm, PartAck, SessionId, UploadSession,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{StoreError, StoreOp};
use crate::store::{ObjectStore, PartUpload};

/// Error codes S3 uses when a part fails its integrity check
const INTEGRITY_CODES: &[&str] = &["BadDigest", "InvalidDigest", "XAmzContentChecksumMismatch"];

/// Connection settings; credentials come from the default provider chain
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct S3Settings {
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible services
    pub endpoint_url: Option<String>,
    /// Path-style addressing, needed by most S3-compatible services
    pub force_path_style: bool,
}

/// Object store backed by the AWS SDK client.
///
/// The SDK client and its connection pool live as long as this value.
#[derive(Clone)]
pub struct S3Store {
    client: Client,
}

impl S3Store {
    /// Load shared AWS configuration and build a client
    pub async fn connect(settings: &S3Settings) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &settings.region {
            loader = loader.region(Region::new(region.clone()));
        }
        let shared = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(endpoint) = &settings.endpoint_url {
            builder = builder.endpoint_url(endpoint);
        }
        builder = builder.force_path_style(settings.force_path_style);

        info!(
            region = ?shared.region(),
            endpoint = ?settings.endpoint_url,
            path_style = settings.force_path_style,
            "S3 client configured"
        );

        S3Store {
            client: Client::from_conf(builder.build()),
        }
    }

    /// Wrap an existing SDK client
    pub fn from_client(client: Client) -> Self {
        S3Store { client }
    }
}

fn store_error<E, R>(
    operation: StoreOp,
    part_number: Option<u32>,
    err: SdkError<E, R>,
) -> StoreError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let code = err.code().map(str::to_string);
    let message = DisplayErrorContext(&err).to_string();

    match (part_number, code.as_deref()) {
        (Some(part_number), Some(code)) if INTEGRITY_CODES.contains(&code) => {
            StoreError::Integrity { part_number, message }
        }
        _ => StoreError::Service {
            operation,
            code,
            message,
        },
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn initiate(
        &self,
        destination: &Destination,
        digest: DigestAlgorithm,
    ) -> Result<UploadSession, StoreError> {
        let mut request = self
            .client
            .create_multipart_upload()
            .bucket(destination.bucket.as_str())
            .key(destination.key.as_str());
        if digest == DigestAlgorithm::Sha256 {
            request = request.checksum_algorithm(ChecksumAlgorithm::Sha256);
        }

        let response = request
            .send()
            .await
            .map_err(|e| store_error(StoreOp::Initiate, None, e))?;

        let upload_id = response.upload_id().ok_or_else(|| {
            StoreError::service(StoreOp::Initiate, "response did not include an upload id")
        })?;

        Ok(UploadSession {
            id: SessionId::new(upload_id),
            destination: destination.clone(),
            digest,
        })
    }

    async fn upload_part(
        &self,
        session: &UploadSession,
        part: &PartUpload,
    ) -> Result<PartAck, StoreError> {
        let part_number = part.part_number();
        let body = ByteStream::read_from()
            .path(&part.source)
            .offset(part.range.offset)
            .length(Length::Exact(part.range.len))
            .build()
            .await
            .map_err(|e| {
                StoreError::service(StoreOp::UploadPart, format!("opening part body: {}", e))
            })?;

        let mut request = self
            .client
            .upload_part()
            .bucket(session.destination.bucket.as_str())
            .key(session.destination.key.as_str())
            .upload_id(session.id.as_str())
            .part_number(part_number as i32)
            .content_length(part.range.len as i64)
            .body(body);
        request = match part.digest.algorithm {
            DigestAlgorithm::Md5 => request.content_md5(part.digest.to_base64()),
            DigestAlgorithm::Sha256 => request.checksum_sha256(part.digest.to_base64()),
        };

        let response = request
            .send()
            .await
            .map_err(|e| store_error(StoreOp::UploadPart, Some(part_number), e))?;

        let tag = response.e_tag().ok_or_else(|| {
            StoreError::service(
                StoreOp::UploadPart,
                format!("part {} response did not include an ETag", part_number),
            )
        })?;
        debug!(part_number, e_tag = tag, "part accepted");

        let mut ack = PartAck::new(part_number, tag);
        if let Some(checksum) = response.checksum_sha256() {
            ack = ack.with_checksum(checksum);
        }
        Ok(ack)
    }

    async fn complete(
        &self,
        session: &UploadSession,
        parts: &[PartAck],
    ) -> Result<CompletedObject, StoreError> {
        // S3 requires ascending part numbers
        let mut sorted: Vec<&PartAck> = parts.iter().collect();
        sorted.sort_by_key(|p| p.part_number);

        let completed: Vec<CompletedPart> = sorted
            .into_iter()
            .map(|ack| {
                CompletedPart::builder()
                    .part_number(ack.part_number as i32)
                    .e_tag(&ack.tag)
                    .set_checksum_sha256(ack.checksum.clone())
                    .build()
            })
            .collect();

        let response = self
            .client
            .complete_multipart_upload()
            .bucket(session.destination.bucket.as_str())
            .key(session.destination.key.as_str())
            .upload_id(session.id.as_str())
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(completed))
                    .build(),
            )
            .send()
            .await
            .map_err(|e| store_error(StoreOp::Complete, None, e))?;

        Ok(CompletedObject {
            location: response.location().map(str::to_string),
            e_tag: response.e_tag().map(str::to_string),
            version_id: response.version_id().map(str::to_string),
        })
    }

    async fn abort(&self, session: &UploadSession) -> Result<(), StoreError> {
        self.client
            .abort_multipart_upload()
            .bucket(session.destination.bucket.as_str())
            .key(session.destination.key.as_str())
            .upload_id(session.id.as_str())
            .send()
            .await
            .map_err(|e| store_error(StoreOp::Abort, None, e))?;
        Ok(())
    }
}
