use crate::config::ModelConfig;
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum PreprocessError {
    #[error("Failed to open image: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("Image has zero width or height")]
    Empty,
}

/// Normalized CHW tensor data for a single RGB image.
#[derive(Debug, Clone)]
pub struct PreparedImage {
    pub data: Vec<f32>,
    pub height: usize,
    pub width: usize,
}

impl PreparedImage {
    /// `[batch, channels, height, width]` with a batch of one.
    pub fn shape(&self) -> [i64; 4] {
        [1, 3, self.height as i64, self.width as i64]
    }
}

/// Test-time transform: RGB, shorter side resized to `size` keeping aspect ratio,
/// scaled to [0, 1] and normalized per channel.
#[derive(Debug, Clone)]
pub struct Preprocessor {
    size: u32,
    mean: [f32; 3],
    std: [f32; 3],
}

impl Preprocessor {
    pub fn new(config: &ModelConfig) -> Self {
        Self {
            size: config.image_size,
            mean: config.mean,
            std: config.std,
        }
    }

    pub fn load(&self, path: &Path) -> Result<PreparedImage, PreprocessError> {
        let img = ImageReader::open(path)?.with_guessed_format()?.decode()?;
        self.prepare(&img)
    }

    pub fn prepare(&self, img: &DynamicImage) -> Result<PreparedImage, PreprocessError> {
        let (w, h) = (img.width(), img.height());
        if w == 0 || h == 0 {
            return Err(PreprocessError::Empty);
        }

        let (new_w, new_h) = resize_shorter_side(w, h, self.size);
        let rgb = img.to_rgb8();
        let rgb = if (new_w, new_h) == (w, h) {
            rgb
        } else {
            image::imageops::resize(&rgb, new_w, new_h, FilterType::Triangle)
        };

        let (width, height) = (new_w as usize, new_h as usize);
        let plane = width * height;
        let mut data = vec![0.0f32; 3 * plane];
        for (x, y, pixel) in rgb.enumerate_pixels() {
            let offset = y as usize * width + x as usize;
            for c in 0..3 {
                let value = pixel[c] as f32 / 255.0;
                data[c * plane + offset] = (value - self.mean[c]) / self.std[c];
            }
        }

        Ok(PreparedImage {
            data,
            height,
            width,
        })
    }
}

fn resize_shorter_side(w: u32, h: u32, size: u32) -> (u32, u32) {
    if w <= h {
        let new_h = (h as u64 * size as u64 / w as u64).max(1) as u32;
        (size, new_h)
    } else {
        let new_w = (w as u64 * size as u64 / h as u64).max(1) as u32;
        (new_w, size)
    }
}
