//! Constant tables shared by the server and its clients.

pub const API_BASE_URL: &str = "http://localhost:5000";
pub const CLASSIFY_ENDPOINT: &str = "/api/classify";
pub const HEALTH_ENDPOINT: &str = "/api/health";

/// Multipart field carrying the uploaded image.
pub const IMAGE_FIELD: &str = "image";

pub const ALLOWED_IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "bmp"];
pub const MAX_FILE_SIZE_MB: usize = 16;
pub const MAX_FILE_SIZE_BYTES: usize = MAX_FILE_SIZE_MB * 1024 * 1024;
pub const UPLOAD_DIR: &str = "uploads";

/// Class tokens in the order the model emits them: index 0 = fire, index 1 = no fire.
pub const CLASS_NAMES: [&str; 2] = ["fire", "no fire"];

pub const TARGET_IMAGE_SIZE: u32 = 224;
pub const IMAGE_CHANNELS: usize = 3;
pub const NORMALIZE_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const NORMALIZE_STD: [f32; 3] = [0.229, 0.224, 0.225];

pub const MODEL_ARCHITECTURE: &str = "Inception V3";
pub const MODEL_WEIGHTS: &str = "forest_fire_classifier.pt";
pub const MODEL_FRAMEWORK: &str = "PyTorch";

/// Decimal digits kept in reported probabilities.
pub const PROBABILITY_DIGITS: i32 = 3;

pub mod messages {
    pub const MISSING_FILE: &str = "No image file provided";
    pub const EMPTY_FILENAME: &str = "No file selected";
    pub const UNSUPPORTED_TYPE: &str = "Invalid file type. Allowed: PNG, JPG, JPEG, GIF, BMP";
    pub const CLASSIFICATION_FAILED: &str = "Failed to process image with the classification model";
    pub const INTERNAL_ERROR: &str = "Internal server error";

    pub fn too_large(max_bytes: usize) -> String {
        format!(
            "File too large. Maximum size is {}MB.",
            max_bytes.div_ceil(1024 * 1024)
        )
    }
}
