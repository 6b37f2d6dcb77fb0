use super::validator::UploadedImage;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum ScratchError {
    #[error("Failed to create upload directory {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },
    #[error("Failed to write scratch file {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
}

/// Owns the upload directory and hands out request-scoped scratch files.
#[derive(Debug, Clone)]
pub struct ScratchFileManager {
    dir: PathBuf,
}

impl ScratchFileManager {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Creates the upload directory if absent. Called once at startup.
    pub fn ensure_dir(&self) -> Result<(), ScratchError> {
        fs::create_dir_all(&self.dir).map_err(|source| ScratchError::CreateDir {
            path: self.dir.clone(),
            source,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes the upload under `<token>-<sanitized name>` and returns a guard that
    /// deletes the file when released or dropped.
    pub fn acquire(&self, image: &UploadedImage) -> Result<ScratchFile, ScratchError> {
        let name = format!(
            "{}-{}",
            Uuid::new_v4().simple(),
            sanitize_filename(&image.filename, &image.extension)
        );
        let scratch = ScratchFile {
            path: self.dir.join(name),
        };

        // The guard exists before the write so a failed write leaves nothing behind.
        let write = fs::File::create(&scratch.path).and_then(|mut file| {
            file.write_all(&image.data)?;
            file.flush()
        });
        if let Err(source) = write {
            return Err(ScratchError::Write {
                path: scratch.path.clone(),
                source,
            });
        }

        log::debug!(
            "Stored upload {} ({} bytes) at {}",
            image.filename,
            image.size(),
            scratch.path.display()
        );
        Ok(scratch)
    }
}

/// A file that lives for one request. Removed exactly once, on `release` or on drop.
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn release(self) {
        // Drop does the work.
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        release(&self.path);
    }
}

/// Deletes `path` if it still exists. Never fails: not-found is ignored and any other
/// I/O error is logged and swallowed.
pub fn release(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => log::debug!("Removed scratch file {}", path.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("Failed to remove scratch file {}: {}", path.display(), e),
    }
}

/// Longest sanitized name kept after the token prefix; keeps the full scratch name well
/// under the 255-byte filename limit.
const MAX_SANITIZED_LEN: usize = 128;

/// Reduces a client filename to a portable basename: path components are dropped, runs
/// of unsafe characters become `_`, leading dots are stripped and long stems are cut so
/// the name stays within `MAX_SANITIZED_LEN` bytes with its extension intact.
pub fn sanitize_filename(filename: &str, extension: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    let mut cleaned = String::with_capacity(base.len());
    for c in base.chars() {
        let keep = c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_');
        if keep {
            cleaned.push(c);
        } else if !cleaned.ends_with('_') {
            cleaned.push('_');
        }
    }

    let cleaned = cleaned.trim_start_matches(['.', '_']).trim_end_matches('_');
    if cleaned.is_empty() || !cleaned.contains('.') {
        return format!("upload.{}", extension);
    }
    if cleaned.len() <= MAX_SANITIZED_LEN {
        return cleaned.to_string();
    }

    // Only ASCII survives the filter above, so byte slicing is safe.
    let (stem, ext) = cleaned.rsplit_once('.').unwrap_or((cleaned, extension));
    let ext = if ext.is_empty() || ext.len() > 8 { extension } else { ext };
    let keep = MAX_SANITIZED_LEN.saturating_sub(ext.len() + 1);
    let stem = stem[..stem.len().min(keep)].trim_end_matches(['.', '_']);
    if stem.is_empty() {
        format!("upload.{}", ext)
    } else {
        format!("{}.{}", stem, ext)
    }
}
