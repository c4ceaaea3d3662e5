//! Whole-form decoding over `multipart/form-data` (spec §4.7, §4.7.1).
//!
//! Builds on [`crate::file::FileReader`] for the file parts of a form and
//! adds scalar (text) decoding for the rest, plus a field-naming
//! reconciliation strategy ([`NamingMode`]) for matching the names a client
//! actually sent against the names a handler asks for.

use axum::extract::Multipart;

use crate::file::{CompletedFile, FileReader, FileReaderError};

/// How a requested field name is matched against the part names a client
/// actually sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamingMode {
    /// Byte-for-byte match only.
    Exact,
    /// Case-insensitive match only.
    CaseInsensitive,
    /// Exact match first; failing that, a separator- and case-insensitive
    /// match (`user_name`, `user-name`, `userName`, `USERNAME` all equate).
    /// The default: form clients rarely agree on a single convention, and
    /// text fields should resolve before falling back to stricter parsing.
    Hybrid,
}

impl Default for NamingMode {
    fn default() -> Self {
        NamingMode::Hybrid
    }
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '_' && *c != '-')
        .flat_map(|c| c.to_lowercase())
        .collect()
}

fn names_match(candidate: &str, requested: &str, mode: NamingMode) -> bool {
    match mode {
        NamingMode::Exact => candidate == requested,
        NamingMode::CaseInsensitive => candidate.eq_ignore_ascii_case(requested),
        NamingMode::Hybrid => {
            candidate == requested || normalize(candidate) == normalize(requested)
        }
    }
}

/// One decoded multipart part: either a scalar text value or a fully-read
/// file upload.
#[derive(Debug, Clone)]
pub enum Part {
    Text { name: String, value: String },
    File(CompletedFile),
}

/// Limits applied while decoding a whole form.
#[derive(Debug, Clone)]
pub struct FormReaderOptions {
    pub naming_mode: NamingMode,
    pub max_parts: usize,
    pub max_file_bytes: u64,
}

impl Default for FormReaderOptions {
    fn default() -> Self {
        Self {
            naming_mode: NamingMode::Hybrid,
            max_parts: 128,
            max_file_bytes: 10 * 1024 * 1024,
        }
    }
}

/// A fully-decoded `multipart/form-data` body.
pub struct FormReader {
    parts: Vec<Part>,
    naming_mode: NamingMode,
}

impl FormReader {
    /// Drain `multipart` to completion, decoding every part according to
    /// `options`.
    pub async fn from_multipart(
        mut multipart: Multipart,
        options: &FormReaderOptions,
    ) -> Result<Self, FormReaderError> {
        let mut parts = Vec::new();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| FormReaderError::Decode(e.to_string()))?
        {
            if parts.len() >= options.max_parts {
                return Err(FormReaderError::TooManyParts(options.max_parts));
            }
            if field.file_name().is_some() {
                let field_name = field.name().unwrap_or("").to_string();
                let completed = FileReader::new(field, options.max_file_bytes)
                    .read_to_end()
                    .await
                    .map_err(|err| match err {
                        FileReaderError::TooLarge { limit } => {
                            FormReaderError::FileTooLarge { field: field_name, limit }
                        }
                        FileReaderError::Read(msg) => FormReaderError::Decode(msg),
                    })?;
                parts.push(Part::File(completed));
            } else {
                let name = field.name().unwrap_or("").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| FormReaderError::Decode(e.to_string()))?;
                let value = String::from_utf8(bytes.to_vec())
                    .map_err(|e| FormReaderError::Decode(e.to_string()))?;
                parts.push(Part::Text { name, value });
            }
        }
        Ok(Self {
            parts,
            naming_mode: options.naming_mode,
        })
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// Look up a scalar field by name, using the reader's configured
    /// [`NamingMode`].
    pub fn text(&self, name: &str) -> Option<&str> {
        self.parts.iter().find_map(|part| match part {
            Part::Text { name: candidate, value } if names_match(candidate, name, self.naming_mode) => {
                Some(value.as_str())
            }
            _ => None,
        })
    }

    /// Look up a file field by name, using the reader's configured
    /// [`NamingMode`].
    pub fn file(&self, name: &str) -> Option<&CompletedFile> {
        self.parts.iter().find_map(|part| match part {
            Part::File(file) if names_match(&file.field_name, name, self.naming_mode) => Some(file),
            _ => None,
        })
    }
}

#[derive(Debug, Clone)]
pub enum FormReaderError {
    Decode(String),
    TooManyParts(usize),
    FileTooLarge { field: String, limit: u64 },
}

impl std::fmt::Display for FormReaderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FormReaderError::Decode(msg) => write!(f, "form decode error: {msg}"),
            FormReaderError::TooManyParts(limit) => {
                write!(f, "form has more than {limit} parts")
            }
            FormReaderError::FileTooLarge { field, limit } => {
                write!(f, "file field '{field}' exceeds {limit} bytes")
            }
        }
    }
}

impl std::error::Error for FormReaderError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hybrid_naming_matches_case_and_separator_variants() {
        assert!(names_match("user_name", "userName", NamingMode::Hybrid));
        assert!(names_match("USER-NAME", "user_name", NamingMode::Hybrid));
        assert!(!names_match("user_name", "username_two", NamingMode::Hybrid));
    }

    #[test]
    fn exact_naming_rejects_case_variants() {
        assert!(!names_match("userName", "username", NamingMode::Exact));
        assert!(names_match("userName", "userName", NamingMode::Exact));
    }

    #[test]
    fn case_insensitive_ignores_case_only() {
        assert!(names_match("UserName", "username", NamingMode::CaseInsensitive));
        assert!(!names_match("user_name", "username", NamingMode::CaseInsensitive));
    }

    #[tokio::test]
    async fn from_multipart_rejects_file_crossing_the_byte_limit() {
        use axum::body::Body;
        use axum::extract::{FromRequest, Multipart};
        use http::Request as HttpRequest;

        let boundary = "X-BOUNDARY";
        let file_bytes = vec![0u8; 128 * 1024];
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(
            b"Content-Disposition: form-data; name=\"upload\"; filename=\"f.bin\"\r\n",
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(&file_bytes);
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

        let request = HttpRequest::builder()
            .method("POST")
            .header("content-type", format!("multipart/form-data; boundary={boundary}"))
            .body(Body::from(body))
            .unwrap();
        let multipart = Multipart::from_request(request, &()).await.unwrap();

        let options = FormReaderOptions {
            max_file_bytes: 64 * 1024,
            ..Default::default()
        };
        let err = FormReader::from_multipart(multipart, &options).await.unwrap_err();
        match err {
            FormReaderError::FileTooLarge { limit, .. } => assert_eq!(limit, 64 * 1024),
            other => panic!("expected FileTooLarge, got {other:?}"),
        }
    }

    #[test]
    fn text_lookup_uses_reader_naming_mode() {
        let reader = FormReader {
            parts: vec![Part::Text {
                name: "user_name".to_string(),
                value: "ada".to_string(),
            }],
            naming_mode: NamingMode::Hybrid,
        };
        assert_eq!(reader.text("userName"), Some("ada"));
        assert_eq!(reader.text("missing"), None);
    }
}
