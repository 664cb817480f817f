//! Importing and relocating files in the picture store.
//!
//! Canonical pictures always carry a `.jpg` extension. JPEG sources are copied
//! byte for byte; other raster formats the `image` crate can decode (PNG,
//! TIFF, WebP) are re-encoded to JPEG on import so the extension stays
//! truthful for the LaTeX toolchain, which picks its loader by extension.
//!
//! | Source | Operation |
//! |---|---|
//! | `.jpg` / `.jpeg` | `fs::copy` |
//! | `.png` / `.tif` / `.tiff` / `.webp` | decode with `ImageReader`, encode with `JpegEncoder` |
//! | anything else | copied as-is |

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageReader};
use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
#[error("picture {path} is unavailable: {reason}")]
pub struct PictureError {
    pub path: PathBuf,
    pub reason: String,
}

impl PictureError {
    fn new(path: &Path, reason: impl ToString) -> Self {
        Self {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }
}

/// How a picture got into the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    Copied,
    Transcoded,
}

/// JPEG encoding quality (1-100) used when transcoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(u8);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(90)
    }
}

const TRANSCODED_EXTENSIONS: &[&str] = &["png", "tif", "tiff", "webp"];

fn needs_transcode(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .is_some_and(|e| TRANSCODED_EXTENSIONS.contains(&e.as_str()))
}

fn ensure_parent(dest: &Path) -> Result<(), PictureError> {
    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| PictureError::new(parent, e))?;
    }
    Ok(())
}

/// Bring `source` into the store at `dest`, creating the picture directory
/// if needed. The caller checks that `dest` is free.
pub fn import_picture(
    source: &Path,
    dest: &Path,
    quality: Quality,
) -> Result<ImportKind, PictureError> {
    if !source.is_file() {
        return Err(PictureError::new(source, "source file does not exist"));
    }
    ensure_parent(dest)?;
    if needs_transcode(source) {
        let img = ImageReader::open(source)
            .map_err(|e| PictureError::new(source, e))?
            .with_guessed_format()
            .map_err(|e| PictureError::new(source, e))?
            .decode()
            .map_err(|e| PictureError::new(source, format!("cannot decode: {e}")))?;
        save_jpeg(&img, dest, quality)?;
        Ok(ImportKind::Transcoded)
    } else {
        fs::copy(source, dest).map_err(|e| PictureError::new(source, e))?;
        Ok(ImportKind::Copied)
    }
}

fn save_jpeg(img: &DynamicImage, dest: &Path, quality: Quality) -> Result<(), PictureError> {
    let file = fs::File::create(dest).map_err(|e| PictureError::new(dest, e))?;
    let encoder = JpegEncoder::new_with_quality(BufWriter::new(file), quality.value());
    // JPEG has no alpha channel.
    DynamicImage::ImageRgb8(img.to_rgb8())
        .write_with_encoder(encoder)
        .map_err(|e| PictureError::new(dest, format!("JPEG encode failed: {e}")))
}

/// Move a picture inside the store. Falls back to copy + remove when a plain
/// rename is not possible (e.g. across filesystems).
pub fn move_picture(from: &Path, to: &Path) -> Result<(), PictureError> {
    if !from.is_file() {
        return Err(PictureError::new(from, "file does not exist"));
    }
    ensure_parent(to)?;
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    fs::copy(from, to).map_err(|e| PictureError::new(from, e))?;
    fs::remove_file(from).map_err(|e| PictureError::new(from, e))
}

/// Whether two paths resolve to the same existing file.
pub fn same_file(a: impl AsRef<Path>, b: impl AsRef<Path>) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Copy a picture inside the store, leaving the original in place.
pub fn copy_picture(from: &Path, to: &Path) -> Result<(), PictureError> {
    if !from.is_file() {
        return Err(PictureError::new(from, "file does not exist"));
    }
    ensure_parent(to)?;
    fs::copy(from, to)
        .map(|_| ())
        .map_err(|e| PictureError::new(from, e))
}
