use image::imageops::FilterType;
use image::ImageFormat;
use rand::RngCore;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::UploadError;
use crate::state::data::ImageFile;

/// Longest edge of the display preview. Larger uploads get a downscaled copy.
const PREVIEW_EDGE: u32 = 1280;

/// Validate an image picked for upload and copy it into `uploads_dir`.
///
/// The file must decode as an image; its format decides the stored
/// extension and mimetype. Returns the metadata recorded in the catalog.
pub fn store_upload(source: &Path, uploads_dir: &Path) -> Result<ImageFile, UploadError> {
    let bytes = fs::read(source).map_err(|source_err| UploadError::Read {
        path: source.to_path_buf(),
        source: source_err,
    })?;

    let decode_error = |err| UploadError::Decode {
        path: source.to_path_buf(),
        source: err,
    };
    let format = image::guess_format(&bytes).map_err(decode_error)?;
    let decoded = image::load_from_memory_with_format(&bytes, format).map_err(decode_error)?;

    fs::create_dir_all(uploads_dir).map_err(|err| UploadError::Store {
        path: uploads_dir.to_path_buf(),
        source: err,
    })?;

    let stem = random_stem();
    let extension = format.extensions_str().first().copied().unwrap_or("img");
    let stored_path = uploads_dir.join(format!("{stem}.{extension}"));
    fs::write(&stored_path, &bytes).map_err(|err| UploadError::Store {
        path: stored_path.clone(),
        source: err,
    })?;

    let preview_path = if decoded.width() > PREVIEW_EDGE || decoded.height() > PREVIEW_EDGE {
        Some(save_preview(&decoded, uploads_dir, &stem)?)
    } else {
        None
    };

    let original_name = source
        .file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string();

    info!(
        file = %stored_path.display(),
        width = decoded.width(),
        height = decoded.height(),
        "stored upload"
    );

    Ok(ImageFile {
        path: stored_path.to_string_lossy().to_string(),
        mimetype: format.to_mime_type().to_string(),
        width: decoded.width(),
        height: decoded.height(),
        size: bytes.len() as u64,
        original_name,
        preview_path: preview_path.map(|path| path.to_string_lossy().to_string()),
    })
}

/// Remove the stored copy (and preview) of a deleted image.
/// Missing files are ignored; the catalog row is what matters.
pub fn remove_upload(file: &ImageFile) {
    for path in std::iter::once(file.path.as_str()).chain(file.preview_path.as_deref()) {
        if let Err(err) = fs::remove_file(path) {
            debug!(path, %err, "upload already gone");
        }
    }
}

/// Helper to save a downscaled JPEG preview
fn save_preview(decoded: &image::DynamicImage, uploads_dir: &Path, stem: &str) -> Result<PathBuf, UploadError> {
    let preview = decoded.resize(PREVIEW_EDGE, PREVIEW_EDGE, FilterType::Lanczos3);
    let preview_path = uploads_dir.join(format!("{stem}.preview.jpg"));

    // JPEG has no alpha channel
    preview
        .to_rgb8()
        .save_with_format(&preview_path, ImageFormat::Jpeg)
        .map_err(|err| UploadError::Decode {
            path: preview_path.clone(),
            source: err,
        })?;

    debug!(path = %preview_path.display(), "generated preview");
    Ok(preview_path)
}

fn random_stem() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
