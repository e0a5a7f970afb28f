//! chunkup: multipart upload of a local file to S3

use anyhow::Context;
use chunkup_client::{
    MemoryStore, MultipartUploader, ObjectStore, S3Store, UploadReceipt, S3_MIN_PART_SIZE,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

mod cli;
mod logging;
mod size;

use cli::Options;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli::command().get_matches();
    let options = Options::from_matches(&matches)?;
    logging::init(options.log_format);

    info!(
        source = %options.source.display(),
        destination = %options.destination,
        part_size = options.upload.part_size,
        digest = %options.upload.digest,
        dry_run = options.dry_run,
        "chunkup starting"
    );

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling upload");
            on_interrupt.cancel();
        }
    });

    // The store lives for this scope only; its connections are released on
    // every exit path when it drops.
    let receipt = if options.dry_run {
        run(MemoryStore::without_contents(), &options, cancel).await?
    } else {
        if options.upload.part_size < S3_MIN_PART_SIZE {
            warn!(
                part_size = options.upload.part_size,
                minimum = S3_MIN_PART_SIZE,
                "part size is below the S3 minimum; multi-part uploads will be rejected on commit"
            );
        }
        let store = S3Store::connect(&options.s3).await;
        run(store, &options, cancel).await?
    };

    println!(
        "{}",
        serde_json::to_string_pretty(&receipt).context("serializing upload receipt")?
    );
    Ok(())
}

async fn run<S: ObjectStore>(
    store: S,
    options: &Options,
    cancel: CancellationToken,
) -> anyhow::Result<UploadReceipt> {
    let uploader = MultipartUploader::new(store, options.upload.clone());

    match uploader
        .upload_with_cancel(&options.source, &options.destination, cancel)
        .await
    {
        Ok(receipt) => {
            info!(
                parts = receipt.parts,
                bytes = receipt.bytes,
                location = ?receipt.object.location,
                "upload finished"
            );
            Ok(receipt)
        }
        Err(e) => {
            if let Some(abort) = e.abort_error() {
                error!(
                    error = %abort,
                    "cleanup abort failed; the multipart upload may need manual removal"
                );
            }
            error!(error = %e.primary(), "upload failed");
            Err(e).with_context(|| format!("uploading {}", options.source.display()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn dry_run_options(path: &std::path::Path) -> Options {
        let matches = cli::command()
            .try_get_matches_from([
                "chunkup",
                "--bucket",
                "backups",
                "--key",
                "nightly/db.tar",
                "--part-size",
                "1k",
                "--dry-run",
                path.to_str().unwrap(),
            ])
            .unwrap();
        Options::from_matches(&matches).unwrap()
    }

    #[tokio::test]
    async fn test_dry_run_uploads_through_memory_store() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&vec![7u8; 2500]).unwrap();
        file.flush().unwrap();
        let options = dry_run_options(file.path());

        let store = std::sync::Arc::new(MemoryStore::without_contents());
        let receipt = run(store.clone(), &options, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(receipt.parts, 3);
        assert_eq!(receipt.bytes, 2500);
        assert_eq!(receipt.destination.to_string(), "backups/nightly/db.tar");
        assert_eq!(store.object_len(&options.destination), Some(2500));
        assert!(store.object(&options.destination).is_none());

        let json: serde_json::Value = serde_json::to_value(&receipt).unwrap();
        assert_eq!(json["parts"], 3);
    }

    #[tokio::test]
    async fn test_dry_run_of_missing_file_fails_without_calls() {
        let dir = tempfile::tempdir().unwrap();
        let options = dry_run_options(&dir.path().join("absent.bin"));

        let store = std::sync::Arc::new(MemoryStore::without_contents());
        let err = run(store.clone(), &options, CancellationToken::new())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("absent.bin"));
        assert!(store.calls().is_empty());
    }
}
