use std::fs;
use std::path::Path;

use atelier_contracts::requests::Artifact;
use atelier_contracts::{StudioError, StudioResult};
use sha2::{Digest, Sha256};

use crate::transport::FetchedArtifact;

/// Writes fetched video bytes under `out_dir` and returns the playable artifact.
pub fn write_video_artifact(out_dir: &Path, fetched: FetchedArtifact) -> StudioResult<Artifact> {
    if fetched.bytes.is_empty() {
        return Err(StudioError::empty_result("video download returned no data"));
    }
    let mime_type = fetched
        .mime_type
        .filter(|mime| mime.starts_with("video/"))
        .unwrap_or_else(|| "video/mp4".to_string());
    fs::create_dir_all(out_dir).map_err(|source| StudioError::Output {
        path: out_dir.to_path_buf(),
        source,
    })?;
    let path = out_dir.join(format!(
        "video-{}.{}",
        short_id(&fetched.bytes),
        extension_for_mime(&mime_type)
    ));
    fs::write(&path, &fetched.bytes).map_err(|source| StudioError::Output {
        path: path.clone(),
        source,
    })?;
    Ok(Artifact::Video {
        path,
        mime_type,
        byte_len: fetched.bytes.len() as u64,
    })
}

/// Writes image artifact bytes to `path`.
pub fn write_image_artifact(path: &Path, artifact: &Artifact) -> StudioResult<()> {
    let Artifact::Image { bytes, .. } = artifact else {
        return Err(StudioError::invalid_input("artifact is not an image"));
    };
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| StudioError::Output {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, bytes).map_err(|source| StudioError::Output {
        path: path.to_path_buf(),
        source,
    })
}

pub fn extension_for_mime(mime: &str) -> &'static str {
    match mime {
        "video/webm" => "webm",
        "video/quicktime" => "mov",
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ if mime.starts_with("image/") => "png",
        _ => "mp4",
    }
}

fn short_id(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    hex::encode(&digest[..6])
}
