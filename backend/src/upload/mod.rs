pub mod scratch;
pub mod validator;

pub use scratch::{ScratchError, ScratchFileManager};
pub use validator::{UploadPart, UploadValidator, UploadedImage, ValidationError};
