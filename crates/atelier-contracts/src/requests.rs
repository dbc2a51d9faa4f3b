use std::fmt;
use std::path::PathBuf;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::{json, Value};

use crate::error::{StudioError, StudioResult};
use crate::options::{AspectRatio, ImageSize, PromptStyle, VideoAspectRatio, VideoResolution};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Chat,
    Refine,
    Analyze,
    Generate,
    Edit,
    Video,
}

impl OperationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OperationKind::Chat => "chat",
            OperationKind::Refine => "refine",
            OperationKind::Analyze => "analyze",
            OperationKind::Generate => "generate",
            OperationKind::Edit => "edit",
            OperationKind::Video => "video",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw image bytes plus the declared content type.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageInput {
    bytes: Vec<u8>,
    mime_type: String,
}

impl ImageInput {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> StudioResult<Self> {
        let mime_type = mime_type.into().trim().to_ascii_lowercase();
        if bytes.is_empty() {
            return Err(StudioError::invalid_input("image is empty"));
        }
        if !mime_type.starts_with("image/") {
            return Err(StudioError::invalid_input(format!(
                "unsupported image content type '{mime_type}'"
            )));
        }
        Ok(Self { bytes, mime_type })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.bytes)
    }

    /// `inlineData` part for a `generateContent` request.
    pub fn inline_part(&self) -> Value {
        json!({
            "inlineData": {
                "mimeType": self.mime_type,
                "data": self.to_base64(),
            }
        })
    }
}

impl fmt::Debug for ImageInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageInput")
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefineRequest {
    pub prompt: String,
    pub style: PromptStyle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzeRequest {
    pub image: Option<ImageInput>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageGenerateRequest {
    pub prompt: String,
    pub aspect_ratio: AspectRatio,
    pub size: ImageSize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageEditRequest {
    pub image: Option<ImageInput>,
    pub instruction: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoRequest {
    pub prompt: String,
    pub aspect_ratio: VideoAspectRatio,
    pub resolution: VideoResolution,
    pub reference: Option<ImageInput>,
}

/// One dispatched studio action. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationRequest {
    Refine(RefineRequest),
    Analyze(AnalyzeRequest),
    Generate(ImageGenerateRequest),
    Edit(ImageEditRequest),
    Video(VideoRequest),
}

impl GenerationRequest {
    pub fn kind(&self) -> OperationKind {
        match self {
            GenerationRequest::Refine(_) => OperationKind::Refine,
            GenerationRequest::Analyze(_) => OperationKind::Analyze,
            GenerationRequest::Generate(_) => OperationKind::Generate,
            GenerationRequest::Edit(_) => OperationKind::Edit,
            GenerationRequest::Video(_) => OperationKind::Video,
        }
    }

    pub fn validate(&self) -> StudioResult<()> {
        match self {
            GenerationRequest::Refine(request) => {
                require_text(&request.prompt, "original prompt")?;
            }
            GenerationRequest::Analyze(request) => {
                require_image(request.image.as_ref(), "image to analyze")?;
            }
            GenerationRequest::Generate(request) => {
                require_text(&request.prompt, "prompt")?;
            }
            GenerationRequest::Edit(request) => {
                require_image(request.image.as_ref(), "image to edit")?;
                require_text(&request.instruction, "edit instruction")?;
            }
            GenerationRequest::Video(request) => {
                require_text(&request.prompt, "prompt")?;
            }
        }
        Ok(())
    }
}

pub fn require_text<'a>(value: &'a str, what: &str) -> StudioResult<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(StudioError::invalid_input(format!("{what} is required")));
    }
    Ok(trimmed)
}

pub fn require_image<'a>(value: Option<&'a ImageInput>, what: &str) -> StudioResult<&'a ImageInput> {
    value.ok_or_else(|| StudioError::invalid_input(format!("{what} is required")))
}

/// Displayable result of an image or video operation.
#[derive(Clone, PartialEq, Eq)]
pub enum Artifact {
    Image {
        mime_type: String,
        bytes: Vec<u8>,
    },
    Video {
        path: PathBuf,
        mime_type: String,
        byte_len: u64,
    },
}

impl Artifact {
    pub fn mime_type(&self) -> &str {
        match self {
            Artifact::Image { mime_type, .. } | Artifact::Video { mime_type, .. } => mime_type,
        }
    }

    /// `data:` URI for images, `file://` URI for videos.
    pub fn locator(&self) -> String {
        match self {
            Artifact::Image { mime_type, bytes } => {
                format!("data:{mime_type};base64,{}", BASE64.encode(bytes))
            }
            Artifact::Video { path, .. } => format!("file://{}", path.display()),
        }
    }
}

impl fmt::Debug for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Artifact::Image { mime_type, bytes } => f
                .debug_struct("Image")
                .field("mime_type", mime_type)
                .field("len", &bytes.len())
                .finish(),
            Artifact::Video {
                path,
                mime_type,
                byte_len,
            } => f
                .debug_struct("Video")
                .field("path", path)
                .field("mime_type", mime_type)
                .field("byte_len", byte_len)
                .finish(),
        }
    }
}
