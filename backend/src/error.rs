use crate::classifier::InferenceError;
use crate::normalize::NormalizeError;
use crate::upload::{ScratchError, ValidationError};
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use shared::ErrorResponse;
use shared::constants::messages;

/// Client-visible failure categories. Display text is what the client sees; the
/// underlying cause is logged where the conversion happens and never returned.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ApiError {
    #[error("{}", messages::MISSING_FILE)]
    MissingFile,
    #[error("{}", messages::EMPTY_FILENAME)]
    EmptyFilename,
    #[error("{}", messages::UNSUPPORTED_TYPE)]
    UnsupportedType,
    #[error("{}", too_large_message(.max_bytes))]
    TooLarge { max_bytes: usize },
    #[error("{}", messages::CLASSIFICATION_FAILED)]
    ClassificationFailed,
    #[error("{}", messages::INTERNAL_ERROR)]
    Internal,
}

fn too_large_message(max_bytes: &usize) -> String {
    messages::too_large(*max_bytes)
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::MissingFile => "missing_file",
            ApiError::EmptyFilename => "empty_filename",
            ApiError::UnsupportedType => "unsupported_type",
            ApiError::TooLarge { .. } => "payload_too_large",
            ApiError::ClassificationFailed => "classification_failed",
            ApiError::Internal => "internal_error",
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MissingFile | ApiError::EmptyFilename | ApiError::UnsupportedType => {
                StatusCode::BAD_REQUEST
            }
            ApiError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::ClassificationFailed | ApiError::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: self.to_string(),
            code: self.code().to_string(),
        })
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        log::warn!("Rejected upload: {}", err);
        match err {
            ValidationError::MissingFile => ApiError::MissingFile,
            ValidationError::EmptyFilename => ApiError::EmptyFilename,
            ValidationError::UnsupportedType(_) | ValidationError::ContentMismatch { .. } => {
                ApiError::UnsupportedType
            }
            ValidationError::TooLarge { limit, .. } => ApiError::TooLarge { max_bytes: limit },
        }
    }
}

impl From<ScratchError> for ApiError {
    fn from(err: ScratchError) -> Self {
        log::error!("Scratch storage failed: {}", err);
        ApiError::Internal
    }
}

impl From<InferenceError> for ApiError {
    fn from(err: InferenceError) -> Self {
        log::error!("Model classification error: {}", err);
        ApiError::ClassificationFailed
    }
}

impl From<NormalizeError> for ApiError {
    fn from(err: NormalizeError) -> Self {
        log::error!("Malformed classifier output: {}", err);
        ApiError::Internal
    }
}

impl From<actix_web::error::BlockingError> for ApiError {
    fn from(err: actix_web::error::BlockingError) -> Self {
        log::error!("Classification task aborted: {}", err);
        ApiError::Internal
    }
}
