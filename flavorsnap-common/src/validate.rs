//! Upload validation
//!
//! Checks run locally and synchronously before any network attempt: a file
//! must be present, have an accepted image MIME type and fit under the size
//! limit.

use thiserror::Error;

use crate::config::UploadConfig;

/// Accepted MIME types when none are configured
pub const DEFAULT_ACCEPTED_TYPES: [&str; 4] = ["image/jpeg", "image/jpg", "image/png", "image/webp"];

/// 10 MiB
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// An image selected for classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            data,
        }
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Why an upload was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("No image provided")]
    Missing,

    #[error("Invalid file type '{content_type}'. Only JPG, PNG, and WebP are allowed.")]
    UnsupportedType { content_type: String },

    #[error("File too large: {size} bytes exceeds the {max_bytes} byte limit")]
    TooLarge { size: u64, max_bytes: u64 },
}

/// Enforces MIME type and size constraints on uploads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadValidator {
    accepted_types: Vec<String>,
    max_bytes: u64,
}

impl Default for UploadValidator {
    fn default() -> Self {
        Self::from_config(&UploadConfig::default())
    }
}

impl UploadValidator {
    pub fn new<I, S>(accepted_types: I, max_bytes: u64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            accepted_types: accepted_types
                .into_iter()
                .map(|t| mime_essence(t.as_ref()))
                .collect(),
            max_bytes,
        }
    }

    pub fn from_config(config: &UploadConfig) -> Self {
        Self::new(&config.accepted_types, config.max_bytes)
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    pub fn accepted_types(&self) -> &[String] {
        &self.accepted_types
    }

    /// Whether a MIME type is accepted; case and parameters are ignored
    pub fn accepts(&self, content_type: &str) -> bool {
        let essence = mime_essence(content_type);
        self.accepted_types.iter().any(|t| *t == essence)
    }

    /// Validate an optional upload, handing back the file when accepted
    pub fn validate<'a>(&self, file: Option<&'a UploadFile>) -> Result<&'a UploadFile, ValidationError> {
        let file = file.ok_or(ValidationError::Missing)?;
        self.check(&file.content_type, file.size())?;
        Ok(file)
    }

    /// Validate type and size without holding the file contents
    pub fn check(&self, content_type: &str, size: u64) -> Result<(), ValidationError> {
        if !self.accepts(content_type) {
            return Err(ValidationError::UnsupportedType {
                content_type: content_type.to_string(),
            });
        }
        if size > self.max_bytes {
            return Err(ValidationError::TooLarge {
                size,
                max_bytes: self.max_bytes,
            });
        }
        Ok(())
    }
}

/// `Image/PNG; q=1` -> `image/png`
fn mime_essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}
