//! In-process object store
//!
//! Speaks the same multipart protocol as a real store: it reads each part's
//! byte range from disk, re-verifies the digest, and only assembles the
//! object on complete. Every call is recorded and any operation can be made
//! to fail, which makes it the backend for dry runs and tests.
//!
//! By default part bodies are kept so committed objects can be inspected.
//! [`MemoryStore::without_contents`] keeps only tags and lengths, so memory
//! use stays bounded by one part no matter how large the source is.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chunkup_core::{
    digest_bytes, CompletedObject, Destination, DigestAlgorithm, PartAck, PartRange, SessionId,
    UploadSession,
};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::{self, SeekFrom};
use std::path::Path;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::debug;

use crate::error::{StoreError, StoreOp};
use crate::store::{ObjectStore, PartUpload};

/// A call observed by [`MemoryStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Initiate {
        destination: Destination,
    },
    UploadPart {
        session: SessionId,
        part_number: u32,
        offset: u64,
        len: u64,
    },
    Complete {
        session: SessionId,
        part_numbers: Vec<u32>,
    },
    Abort {
        session: SessionId,
    },
}

impl StoreCall {
    pub fn op(&self) -> StoreOp {
        match self {
            StoreCall::Initiate { .. } => StoreOp::Initiate,
            StoreCall::UploadPart { .. } => StoreOp::UploadPart,
            StoreCall::Complete { .. } => StoreOp::Complete,
            StoreCall::Abort { .. } => StoreOp::Abort,
        }
    }
}

struct StoredPart {
    tag: String,
    md5: Vec<u8>,
    len: u64,
    data: Option<Bytes>,
}

struct StoredObject {
    len: u64,
    data: Option<Bytes>,
}

struct OpenSession {
    destination: Destination,
    parts: BTreeMap<u32, StoredPart>,
}

#[derive(Default)]
struct Faults {
    initiate: Option<StoreError>,
    parts: HashMap<u32, StoreError>,
    complete: Option<StoreError>,
    abort: Option<StoreError>,
}

#[derive(Default)]
struct Inner {
    next_session: u64,
    sessions: HashMap<SessionId, OpenSession>,
    objects: HashMap<Destination, StoredObject>,
    calls: Vec<StoreCall>,
    faults: Faults,
}

/// Object store held entirely in memory
pub struct MemoryStore {
    inner: Mutex<Inner>,
    keep_contents: bool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        MemoryStore {
            inner: Mutex::new(Inner::default()),
            keep_contents: true,
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that verifies and records parts but discards their bytes
    pub fn without_contents() -> Self {
        MemoryStore {
            keep_contents: false,
            ..Self::default()
        }
    }

    pub fn keeps_contents(&self) -> bool {
        self.keep_contents
    }

    /// Make every initiate call fail with `error`
    pub fn fail_initiate(&self, error: StoreError) {
        self.inner.lock().faults.initiate = Some(error);
    }

    /// Make uploads of `part_number` fail with `error`
    pub fn fail_part(&self, part_number: u32, error: StoreError) {
        self.inner.lock().faults.parts.insert(part_number, error);
    }

    pub fn fail_complete(&self, error: StoreError) {
        self.inner.lock().faults.complete = Some(error);
    }

    pub fn fail_abort(&self, error: StoreError) {
        self.inner.lock().faults.abort = Some(error);
    }

    /// Calls received so far, in order
    pub fn calls(&self) -> Vec<StoreCall> {
        self.inner.lock().calls.clone()
    }

    pub fn call_count(&self, op: StoreOp) -> usize {
        self.inner.lock().calls.iter().filter(|c| c.op() == op).count()
    }

    /// Committed object contents, if this store keeps them
    pub fn object(&self, destination: &Destination) -> Option<Bytes> {
        self.inner
            .lock()
            .objects
            .get(destination)
            .and_then(|object| object.data.clone())
    }

    /// Size of the committed object
    pub fn object_len(&self, destination: &Destination) -> Option<u64> {
        self.inner.lock().objects.get(destination).map(|o| o.len)
    }

    /// Sessions neither completed nor aborted
    pub fn open_sessions(&self) -> usize {
        self.inner.lock().sessions.len()
    }

    fn no_such_upload(op: StoreOp, session: &SessionId) -> StoreError {
        StoreError::with_code(
            op,
            "NoSuchUpload",
            format!("upload {} does not exist", session),
        )
    }
}

async fn read_range(path: &Path, range: &PartRange) -> io::Result<Vec<u8>> {
    let capacity = usize::try_from(range.len).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("part of {} bytes does not fit in memory", range.len),
        )
    })?;
    let mut file = tokio::fs::File::open(path).await?;
    file.seek(SeekFrom::Start(range.offset)).await?;
    let mut data = Vec::with_capacity(capacity);
    file.take(range.len).read_to_end(&mut data).await?;
    Ok(data)
}

fn quoted_hex(bytes: &[u8]) -> String {
    format!("\"{}\"", hex::encode(bytes))
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn initiate(
        &self,
        destination: &Destination,
        digest: DigestAlgorithm,
    ) -> Result<UploadSession, StoreError> {
        let mut inner = self.inner.lock();
        inner.calls.push(StoreCall::Initiate {
            destination: destination.clone(),
        });
        if let Some(err) = inner.faults.initiate.clone() {
            return Err(err);
        }

        inner.next_session += 1;
        let id = SessionId::new(format!("mem-upload-{}", inner.next_session));
        inner.sessions.insert(
            id.clone(),
            OpenSession {
                destination: destination.clone(),
                parts: BTreeMap::new(),
            },
        );
        debug!(session = %id, %destination, "memory store opened session");

        Ok(UploadSession {
            id,
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
        {
            let mut inner = self.inner.lock();
            inner.calls.push(StoreCall::UploadPart {
                session: session.id.clone(),
                part_number,
                offset: part.range.offset,
                len: part.range.len,
            });
            if let Some(err) = inner.faults.parts.get(&part_number).cloned() {
                return Err(err);
            }
            if !inner.sessions.contains_key(&session.id) {
                return Err(Self::no_such_upload(StoreOp::UploadPart, &session.id));
            }
        }

        let data = read_range(&part.source, &part.range).await.map_err(|e| {
            StoreError::service(StoreOp::UploadPart, format!("reading part body: {}", e))
        })?;
        if data.len() as u64 != part.range.len {
            return Err(StoreError::with_code(
                StoreOp::UploadPart,
                "IncompleteBody",
                format!("expected {} bytes, got {}", part.range.len, data.len()),
            ));
        }

        let actual = digest_bytes(part.digest.algorithm, &data);
        if actual.as_bytes() != part.digest.as_bytes() {
            return Err(StoreError::Integrity {
                part_number,
                message: format!(
                    "supplied {} {} does not match computed {}",
                    part.digest.algorithm,
                    part.digest.to_hex(),
                    actual.to_hex()
                ),
            });
        }

        let md5 = digest_bytes(DigestAlgorithm::Md5, &data);
        let mut ack = PartAck::new(part_number, quoted_hex(md5.as_bytes()));
        if session.digest == DigestAlgorithm::Sha256 {
            ack = ack.with_checksum(actual.to_base64());
        }

        let mut inner = self.inner.lock();
        let open = inner
            .sessions
            .get_mut(&session.id)
            .ok_or_else(|| Self::no_such_upload(StoreOp::UploadPart, &session.id))?;
        open.parts.insert(
            part_number,
            StoredPart {
                tag: ack.tag.clone(),
                md5: md5.as_bytes().to_vec(),
                len: part.range.len,
                data: self.keep_contents.then(|| Bytes::from(data)),
            },
        );

        Ok(ack)
    }

    async fn complete(
        &self,
        session: &UploadSession,
        parts: &[PartAck],
    ) -> Result<CompletedObject, StoreError> {
        let mut inner = self.inner.lock();
        inner.calls.push(StoreCall::Complete {
            session: session.id.clone(),
            part_numbers: parts.iter().map(|p| p.part_number).collect(),
        });
        if let Some(err) = inner.faults.complete.clone() {
            return Err(err);
        }

        let open = inner
            .sessions
            .get(&session.id)
            .ok_or_else(|| Self::no_such_upload(StoreOp::Complete, &session.id))?;

        if parts.is_empty() {
            return Err(StoreError::with_code(
                StoreOp::Complete,
                "MalformedXML",
                "at least one part is required",
            ));
        }

        let mut seen = HashSet::new();
        for ack in parts {
            if !seen.insert(ack.part_number) {
                return Err(StoreError::with_code(
                    StoreOp::Complete,
                    "InvalidPartOrder",
                    format!("part {} listed more than once", ack.part_number),
                ));
            }
            match open.parts.get(&ack.part_number) {
                Some(stored) if stored.tag == ack.tag => {}
                _ => {
                    return Err(StoreError::with_code(
                        StoreOp::Complete,
                        "InvalidPart",
                        format!(
                            "part {} was not uploaded with tag {}",
                            ack.part_number, ack.tag
                        ),
                    ))
                }
            }
        }

        let mut numbers: Vec<u32> = seen.into_iter().collect();
        numbers.sort_unstable();

        // Listed numbers must be exactly 1..=n and cover every uploaded part
        let contiguous = numbers.iter().zip(1u32..).all(|(n, expected)| *n == expected);
        if !contiguous || numbers.len() != open.parts.len() {
            let highest = numbers
                .last()
                .copied()
                .max(open.parts.keys().next_back().copied())
                .unwrap_or(0);
            let missing: Vec<u32> = (1..=highest)
                .filter(|n| numbers.binary_search(n).is_err())
                .collect();
            return Err(StoreError::with_code(
                StoreOp::Complete,
                "InvalidPart",
                format!("part list is not contiguous from 1; missing parts {:?}", missing),
            ));
        }

        let mut object = self.keep_contents.then(BytesMut::new);
        let mut md5s = Vec::new();
        let mut len = 0u64;
        for number in &numbers {
            let stored = &open.parts[number];
            if let (Some(object), Some(data)) = (object.as_mut(), stored.data.as_ref()) {
                object.extend_from_slice(data);
            }
            md5s.extend_from_slice(&stored.md5);
            len += stored.len;
        }

        // Multipart ETag: md5 over the part md5s, suffixed with the part count
        let e_tag = format!(
            "\"{}-{}\"",
            digest_bytes(DigestAlgorithm::Md5, &md5s).to_hex(),
            numbers.len()
        );
        let destination = open.destination.clone();
        inner.sessions.remove(&session.id);
        inner.objects.insert(
            destination.clone(),
            StoredObject {
                len,
                data: object.map(BytesMut::freeze),
            },
        );
        debug!(
            session = %session.id,
            %destination,
            parts = numbers.len(),
            bytes = len,
            "memory store committed object"
        );

        Ok(CompletedObject {
            location: Some(format!("memory://{}", destination)),
            e_tag: Some(e_tag),
            version_id: None,
        })
    }

    async fn abort(&self, session: &UploadSession) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        inner.calls.push(StoreCall::Abort {
            session: session.id.clone(),
        });
        if let Some(err) = inner.faults.abort.clone() {
            return Err(err);
        }

        inner
            .sessions
            .remove(&session.id)
            .map(|_| ())
            .ok_or_else(|| Self::no_such_upload(StoreOp::Abort, &session.id))
    }
}
