use crate::config::UploadConfig;
use std::collections::BTreeSet;

/// A file part as it came off the multipart stream.
#[derive(Debug, Clone)]
pub struct UploadPart {
    pub filename: Option<String>,
    pub data: Vec<u8>,
}

/// An upload that passed validation. Owned by the request that produced it.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub filename: String,
    pub extension: String,
    pub data: Vec<u8>,
}

impl UploadedImage {
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ValidationError {
    #[error("no image part in request")]
    MissingFile,
    #[error("image part has an empty filename")]
    EmptyFilename,
    #[error("extension of {0:?} is not allowed")]
    UnsupportedType(String),
    #[error("upload content of {filename:?} does not match an allowed image format")]
    ContentMismatch { filename: String },
    #[error("upload of {size} bytes exceeds limit of {limit}")]
    TooLarge { size: usize, limit: usize },
}

#[derive(Debug, Clone)]
pub struct UploadValidator {
    allowed_extensions: BTreeSet<String>,
    max_bytes: usize,
    sniff_content: bool,
}

impl UploadValidator {
    pub fn new(config: &UploadConfig) -> Self {
        Self {
            allowed_extensions: config.extension_set(),
            max_bytes: config.max_bytes,
            sniff_content: config.sniff_content,
        }
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    pub fn validate(&self, part: Option<UploadPart>) -> Result<UploadedImage, ValidationError> {
        let part = part.ok_or(ValidationError::MissingFile)?;
        let filename = match part.filename {
            Some(name) if !name.is_empty() => name,
            _ => return Err(ValidationError::EmptyFilename),
        };

        let extension = self
            .allowed_extension(&filename)
            .ok_or_else(|| ValidationError::UnsupportedType(filename.clone()))?;

        if part.data.len() > self.max_bytes {
            return Err(ValidationError::TooLarge {
                size: part.data.len(),
                limit: self.max_bytes,
            });
        }

        if self.sniff_content && !self.content_allowed(&part.data) {
            return Err(ValidationError::ContentMismatch { filename });
        }

        Ok(UploadedImage {
            filename,
            extension,
            data: part.data,
        })
    }

    fn allowed_extension(&self, filename: &str) -> Option<String> {
        let (_, ext) = filename.rsplit_once('.')?;
        let ext = ext.to_ascii_lowercase();
        self.allowed_extensions.contains(&ext).then_some(ext)
    }

    fn content_allowed(&self, data: &[u8]) -> bool {
        match image::guess_format(data) {
            Ok(format) => format
                .extensions_str()
                .iter()
                .any(|ext| self.allowed_extensions.contains(*ext)),
            Err(_) => false,
        }
    }
}
