//! Command-line definition

use anyhow::{anyhow, Context};
use chunkup_client::{S3Settings, UploadConfig};
use chunkup_core::{Destination, DigestAlgorithm, DEFAULT_HASH_BUFFER_SIZE};
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;

use crate::logging::LogFormat;
use crate::size::parse_size;

/// Everything `main` needs, resolved from flags and environment
#[derive(Debug, Clone)]
pub struct Options {
    pub source: PathBuf,
    pub destination: Destination,
    pub upload: UploadConfig,
    pub s3: S3Settings,
    pub dry_run: bool,
    pub log_format: LogFormat,
}

pub fn command() -> Command {
    Command::new("chunkup")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Upload a large file to S3 in verified parts, aborting cleanly on failure")
        .arg(
            Arg::new("file")
                .value_name("FILE")
                .help("Local file to upload")
                .required(true)
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("bucket")
                .long("bucket")
                .short('b')
                .value_name("NAME")
                .help("Destination bucket")
                .env("CHUNKUP_BUCKET")
                .required(true),
        )
        .arg(
            Arg::new("key")
                .long("key")
                .short('k')
                .value_name("KEY")
                .help("Destination object key [default: file name]"),
        )
        .arg(
            Arg::new("part-size")
                .long("part-size")
                .value_name("SIZE")
                .help("Bytes per part, e.g. 5MiB, 8M, 1048576")
                .env("CHUNKUP_PART_SIZE")
                .default_value("5MiB")
                .value_parser(parse_size),
        )
        .arg(
            Arg::new("digest")
                .long("digest")
                .value_name("ALGORITHM")
                .help("Per-part integrity digest (md5 or sha256)")
                .env("CHUNKUP_DIGEST")
                .default_value("md5")
                .value_parser(|s: &str| s.parse::<DigestAlgorithm>().map_err(|e| e.to_string())),
        )
        .arg(
            Arg::new("buffer-size")
                .long("buffer-size")
                .value_name("SIZE")
                .help("Read buffer used while hashing")
                .value_parser(parse_size),
        )
        .arg(
            Arg::new("region")
                .long("region")
                .value_name("REGION")
                .help("AWS region [default: from the AWS environment]"),
        )
        .arg(
            Arg::new("endpoint-url")
                .long("endpoint-url")
                .value_name("URL")
                .help("Custom endpoint for S3-compatible services")
                .env("CHUNKUP_ENDPOINT_URL"),
        )
        .arg(
            Arg::new("path-style")
                .long("path-style")
                .help("Use path-style bucket addressing")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("dry-run")
                .long("dry-run")
                .help("Run the full upload against an in-memory store")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .help("Log output format (text or json)")
                .env("CHUNKUP_LOG_FORMAT")
                .default_value("text")
                .value_parser(|s: &str| s.parse::<LogFormat>()),
        )
}

impl Options {
    pub fn from_matches(matches: &ArgMatches) -> anyhow::Result<Self> {
        let source = matches
            .get_one::<PathBuf>("file")
            .cloned()
            .ok_or_else(|| anyhow!("missing FILE"))?;
        let bucket = matches
            .get_one::<String>("bucket")
            .ok_or_else(|| anyhow!("missing --bucket"))?;

        let key = match matches.get_one::<String>("key") {
            Some(key) => key.clone(),
            None => source
                .file_name()
                .and_then(|name| name.to_str())
                .map(str::to_string)
                .ok_or_else(|| {
                    anyhow!("cannot derive a key from {}; pass --key", source.display())
                })?,
        };
        let destination = Destination::parse(bucket, &key).context("invalid destination")?;

        let buffer_size = match matches.get_one::<u64>("buffer-size") {
            Some(size) => usize::try_from(*size).context("--buffer-size is too large")?,
            None => DEFAULT_HASH_BUFFER_SIZE,
        };
        let upload = UploadConfig::default()
            .with_part_size(matches.get_one::<u64>("part-size").copied().unwrap_or_default())
            .with_digest(matches.get_one::<DigestAlgorithm>("digest").copied().unwrap_or_default())
            .with_hash_buffer_size(buffer_size);
        upload.validate().context("invalid upload settings")?;

        let s3 = S3Settings {
            region: matches.get_one::<String>("region").cloned(),
            endpoint_url: matches.get_one::<String>("endpoint-url").cloned(),
            force_path_style: matches.get_flag("path-style"),
        };

        Ok(Options {
            source,
            destination,
            upload,
            s3,
            dry_run: matches.get_flag("dry-run"),
            log_format: matches
                .get_one::<LogFormat>("log-format")
                .copied()
                .unwrap_or(LogFormat::Text),
        })
    }
}
