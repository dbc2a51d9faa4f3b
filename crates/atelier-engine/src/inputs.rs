use std::fs;
use std::path::Path;

use atelier_contracts::requests::ImageInput;
use atelier_contracts::{StudioError, StudioResult};

/// Reads an image file for upload. The content type comes from the bytes when they are
/// recognisable, otherwise from the file extension.
pub fn load_image(path: &Path) -> StudioResult<ImageInput> {
    let bytes = fs::read(path).map_err(|err| {
        StudioError::invalid_input(format!("cannot read image {}: {err}", path.display()))
    })?;
    let mime = sniff_mime(&bytes)
        .or_else(|| mime_for_path(path))
        .ok_or_else(|| {
            StudioError::invalid_input(format!(
                "{} is not a recognised image file",
                path.display()
            ))
        })?;
    ImageInput::new(bytes, mime)
}

fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    image::guess_format(bytes)
        .ok()
        .map(|format| format.to_mime_type())
        .filter(|mime| mime.starts_with("image/"))
}

fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())?;
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "heic" => Some("image/heic"),
        "heif" => Some("image/heif"),
        _ => None,
    }
}
