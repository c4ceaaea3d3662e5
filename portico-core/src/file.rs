//! Streaming file reads over a single multipart field (spec §4.7).
//!
//! Grounded on `r2e_core::multipart`'s `UploadedFile`/`MultipartFields`, but
//! streamed rather than buffered outright: bytes are pulled chunk by chunk
//! from axum's `Field`, folded into a running SHA-256 digest, and the first
//! bytes are kept aside for content-type sniffing via `infer` — neither of
//! which the teacher's buffered version does.

use axum::extract::multipart::Field;
use bytes::{Bytes, BytesMut};
use sha2::{Digest, Sha256};

/// Bytes peeked for content-type sniffing. `infer` only needs the first few
/// dozen bytes for any format in its registry; 512 covers everything it
/// recognizes with room to spare.
const SNIFF_LEN: usize = 512;

/// Streams one multipart file field to completion, computing a SHA-256
/// checksum and a best-effort content type as it goes.
pub struct FileReader<'a> {
    field: Field<'a>,
    field_name: String,
    file_name: Option<String>,
    declared_content_type: Option<String>,
    hasher: Sha256,
    sniff_buf: BytesMut,
    bytes_read: u64,
    limit: u64,
}

impl<'a> FileReader<'a> {
    /// `limit` bounds the cumulative bytes [`FileReader::next_chunk`] will
    /// read before failing with [`FileReaderError::TooLarge`] — this is a
    /// streaming check against the running counter, not a post-hoc check
    /// against a fully buffered body.
    pub fn new(field: Field<'a>, limit: u64) -> Self {
        let field_name = field.name().unwrap_or("").to_string();
        let file_name = field.file_name().map(|s| s.to_string());
        let declared_content_type = field.content_type().map(|s| s.to_string());
        Self {
            field,
            field_name,
            file_name,
            declared_content_type,
            hasher: Sha256::new(),
            sniff_buf: BytesMut::with_capacity(SNIFF_LEN),
            bytes_read: 0,
            limit,
        }
    }

    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    /// Content type as declared by the client in the part headers, if any.
    /// Not to be trusted for anything security-sensitive — see
    /// [`FileReader::sniffed_content_type`] after a full read.
    pub fn declared_content_type(&self) -> Option<&str> {
        self.declared_content_type.as_deref()
    }

    /// Pull the next chunk, if any, feeding it into the running checksum and
    /// sniff buffer as it goes.
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>, FileReaderError> {
        if self.bytes_read > self.limit {
            return Err(FileReaderError::TooLarge { limit: self.limit });
        }
        let chunk = self
            .field
            .chunk()
            .await
            .map_err(|e| FileReaderError::Read(e.to_string()))?;
        let Some(chunk) = chunk else {
            return Ok(None);
        };
        self.bytes_read += chunk.len() as u64;
        if self.bytes_read > self.limit {
            return Err(FileReaderError::TooLarge { limit: self.limit });
        }
        self.hasher.update(&chunk);
        if self.sniff_buf.len() < SNIFF_LEN {
            let take = (SNIFF_LEN - self.sniff_buf.len()).min(chunk.len());
            self.sniff_buf.extend_from_slice(&chunk[..take]);
        }
        Ok(Some(chunk))
    }

    /// Drain the field to completion, returning the full body. Useful when a
    /// handler wants the whole file in memory; prefer [`FileReader::next_chunk`]
    /// for genuinely large uploads.
    pub async fn read_to_end(mut self) -> Result<CompletedFile, FileReaderError> {
        let mut body = BytesMut::new();
        while let Some(chunk) = self.next_chunk().await? {
            body.extend_from_slice(&chunk);
        }
        Ok(CompletedFile {
            field_name: self.field_name,
            file_name: self.file_name,
            declared_content_type: self.declared_content_type,
            sniffed_content_type: infer::get(&self.sniff_buf).map(|t| t.mime_type().to_string()),
            checksum_sha256: hex::encode(self.hasher.finalize()),
            bytes_read: self.bytes_read,
            data: body.freeze(),
        })
    }

    /// Best-effort content type from the bytes read so far. Call after
    /// exhausting [`FileReader::next_chunk`] (or use [`FileReader::read_to_end`])
    /// for a stable answer — early chunks may not carry enough of the file
    /// to be recognized.
    pub fn sniffed_content_type(&self) -> Option<String> {
        infer::get(&self.sniff_buf).map(|t| t.mime_type().to_string())
    }

    /// Running SHA-256 digest of every byte read so far, hex-encoded.
    pub fn checksum_so_far(&self) -> String {
        hex::encode(self.hasher.clone().finalize())
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }
}

/// A fully-drained upload: body, checksum, and both the client-declared and
/// sniffed content types.
#[derive(Debug, Clone)]
pub struct CompletedFile {
    pub field_name: String,
    pub file_name: Option<String>,
    pub declared_content_type: Option<String>,
    pub sniffed_content_type: Option<String>,
    pub checksum_sha256: String,
    pub bytes_read: u64,
    pub data: Bytes,
}

#[derive(Debug, Clone)]
pub enum FileReaderError {
    Read(String),
    /// The cumulative read count crossed `limit` (spec §4.7/§3).
    TooLarge { limit: u64 },
}

impl std::fmt::Display for FileReaderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileReaderError::Read(msg) => write!(f, "failed to read file field: {msg}"),
            FileReaderError::TooLarge { limit } => {
                write!(f, "file field exceeds {limit} bytes")
            }
        }
    }
}

impl std::error::Error for FileReaderError {}

/// Minimal hex encoding so the crate doesn't pull in a dedicated `hex` crate
/// for one call site.
mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        use std::fmt::Write;
        let bytes = bytes.as_ref();
        let mut out = String::with_capacity(bytes.len() * 2);
        for b in bytes {
            let _ = write!(out, "{b:02x}");
        }
        out
    }
}
