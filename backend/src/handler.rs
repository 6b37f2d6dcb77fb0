use crate::classifier::Classifier;
use crate::error::ApiError;
use crate::normalize::ResultNormalizer;
use crate::upload::{ScratchFileManager, UploadPart, UploadValidator, UploadedImage};
use shared::ClassifyResponse;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Where a classify request is in its lifecycle; used for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Validated,
    Stored,
    Classified,
    Responded,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Received => "received",
            Stage::Validated => "validated",
            Stage::Stored => "stored",
            Stage::Classified => "classified",
            Stage::Responded => "responded",
        };
        f.write_str(name)
    }
}

/// Runs one upload through validation, scratch storage, inference and normalization.
/// Shared read-only across all workers.
pub struct ClassifyHandler {
    validator: UploadValidator,
    scratch: ScratchFileManager,
    classifier: Arc<dyn Classifier>,
    normalizer: ResultNormalizer,
}

impl ClassifyHandler {
    pub fn new(
        validator: UploadValidator,
        scratch: ScratchFileManager,
        classifier: Arc<dyn Classifier>,
        normalizer: ResultNormalizer,
    ) -> Self {
        Self {
            validator,
            scratch,
            classifier,
            normalizer,
        }
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.validator.max_bytes()
    }

    pub fn normalizer(&self) -> &ResultNormalizer {
        &self.normalizer
    }

    /// Side-effect free; rejections never touch the filesystem.
    pub fn validate(
        &self,
        request_id: Uuid,
        part: Option<UploadPart>,
    ) -> Result<UploadedImage, ApiError> {
        let image = self.validator.validate(part)?;
        log::debug!(
            "[{}] {}: {} ({} bytes)",
            request_id,
            Stage::Validated,
            image.filename,
            image.size()
        );
        Ok(image)
    }

    /// Blocking part of the pipeline. The scratch file is released before this returns on
    /// every path, including a panic inside the classifier.
    pub fn classify(
        &self,
        request_id: Uuid,
        image: UploadedImage,
    ) -> Result<ClassifyResponse, ApiError> {
        let scratch = self.scratch.acquire(&image)?;
        drop(image);
        log::debug!("[{}] {}: {}", request_id, Stage::Stored, scratch.path().display());

        let prediction = self.classifier.predict(scratch.path());
        scratch.release();
        let prediction = prediction?;
        log::debug!("[{}] {}: {:?}", request_id, Stage::Classified, prediction);

        let response = self.normalizer.normalize(&prediction)?;
        log::info!(
            "[{}] Prediction: {} (confidence: {:.3}) - fire: {:.3}, no fire: {:.3}",
            request_id,
            response.classification,
            response.confidence,
            response.probabilities.fire,
            response.probabilities.no_fire
        );
        Ok(response)
    }
}
