use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

mod console;
pub use console::*;

#[derive(Debug, Error)]
pub enum StoryboardError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("not an image: {0}")]
    NotAnImage(String),
    #[error("unsupported aspect ratio: {0}")]
    UnsupportedAspectRatio(String),
    #[error("unsupported quality: {0}")]
    UnsupportedQuality(String),
}

/// The single user-provided image that establishes visual and character
/// identity for the whole sequence. Stored as a base64 payload ready to be
/// attached inline to generation requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceImage {
    pub mime_type: String,
    /// Base64-encoded image bytes.
    pub data: String,
}

impl ReferenceImage {
    /// Read an image file from disk. Rejects anything the `image` crate does
    /// not recognize as an image format.
    pub fn from_path(path: &Path) -> Result<Self, StoryboardError> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes).map_err(|_| StoryboardError::NotAnImage(path.display().to_string()))
    }

    /// Validate raw bytes and encode them for inline transport.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StoryboardError> {
        let format = image::guess_format(bytes)
            .map_err(|_| StoryboardError::NotAnImage("unrecognized image data".to_string()))?;
        Ok(Self {
            mime_type: format.to_mime_type().to_string(),
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
        })
    }

    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

/// Visual fingerprint extracted from the reference image, produced once per
/// run and consumed by sequence planning. Never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageAnalysis {
    pub subject: String,
    pub style: String,
    pub lighting: String,
    pub key_elements: String,
    /// Precise physical description of the character, reused verbatim across
    /// all frame prompts to enforce identity.
    #[serde(rename = "characterDNA")]
    pub character_dna: String,
}

/// A single shot's metadata from the planning call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryboardFramePlan {
    pub frame_number: u32,
    pub shot_type: String,
    pub prompt: String,
    pub description: String,
}

/// How many frames a storyboard sequence always has.
pub const SEQUENCE_LEN: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameStatus {
    Pending,
    Generating,
    Done,
    Error,
}

impl FrameStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }
}

impl fmt::Display for FrameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Generating => write!(f, "generating"),
            Self::Done => write!(f, "done"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// One frame of the storyboard. Created `Pending`, moves forward only:
/// pending -> generating -> done | error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedFrame {
    /// Equal to `plan.frame_number`.
    pub id: u32,
    /// `data:image/png;base64,...` once generation succeeds, `None` otherwise.
    pub image_url: Option<String>,
    pub plan: StoryboardFramePlan,
    pub status: FrameStatus,
}

impl GeneratedFrame {
    pub fn pending(plan: StoryboardFramePlan) -> Self {
        Self {
            id: plan.frame_number,
            image_url: None,
            plan,
            status: FrameStatus::Pending,
        }
    }

    pub fn mark_generating(&mut self) {
        self.status = FrameStatus::Generating;
    }

    pub fn mark_done(&mut self, image_url: String) {
        self.image_url = Some(image_url);
        self.status = FrameStatus::Done;
    }

    /// The image stays empty; the frame is skipped by exports.
    pub fn mark_error(&mut self) {
        self.status = FrameStatus::Error;
    }
}

/// Session lifecycle. Exactly one state is active at a time; progression is
/// monotonic except for the explicit reset from a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SessionState {
    Idle,
    Analyzing,
    Planning,
    Generating,
    Complete,
    Error,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "IDLE"),
            Self::Analyzing => write!(f, "ANALYZING"),
            Self::Planning => write!(f, "PLANNING"),
            Self::Generating => write!(f, "GENERATING"),
            Self::Complete => write!(f, "COMPLETE"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AspectRatio {
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "16:9")]
    Widescreen,
    #[serde(rename = "4:3")]
    Classic,
}

impl AspectRatio {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Square => "1:1",
            Self::Widescreen => "16:9",
            Self::Classic => "4:3",
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AspectRatio {
    type Err = StoryboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1:1" => Ok(Self::Square),
            "16:9" => Ok(Self::Widescreen),
            "4:3" => Ok(Self::Classic),
            other => Err(StoryboardError::UnsupportedAspectRatio(other.to_string())),
        }
    }
}

/// Defined for parity with the session options; nothing reads it yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Standard,
    Cinematic,
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Standard => write!(f, "standard"),
            Self::Cinematic => write!(f, "cinematic"),
        }
    }
}

impl FromStr for Quality {
    type Err = StoryboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard" => Ok(Self::Standard),
            "cinematic" => Ok(Self::Cinematic),
            other => Err(StoryboardError::UnsupportedQuality(other.to_string())),
        }
    }
}

/// User-facing generation options.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub quality: Quality,
    pub aspect_ratio: AspectRatio,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            quality: Quality::Standard,
            aspect_ratio: AspectRatio::Widescreen,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::DynamicImage;

    fn png_bytes() -> Vec<u8> {
        let mut bytes = Vec::new();
        DynamicImage::new_rgb8(4, 4)
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn test_reference_image_from_png_bytes() {
        let image = ReferenceImage::from_bytes(&png_bytes()).unwrap();
        assert_eq!(image.mime_type, "image/png");
        assert!(image.data_uri().starts_with("data:image/png;base64,"));
    }

    #[test]
    fn test_reference_image_rejects_non_image() {
        let err = ReferenceImage::from_bytes(b"definitely not pixels").unwrap_err();
        assert!(matches!(err, StoryboardError::NotAnImage(_)));
    }

    #[test]
    fn test_frame_lifecycle() {
        let plan = StoryboardFramePlan {
            frame_number: 3,
            shot_type: "Close Up - Low Angle".to_string(),
            prompt: "a test prompt".to_string(),
            description: "测试".to_string(),
        };
        let mut frame = GeneratedFrame::pending(plan);
        assert_eq!(frame.id, 3);
        assert_eq!(frame.status, FrameStatus::Pending);
        assert!(!frame.status.is_terminal());

        frame.mark_generating();
        assert_eq!(frame.status, FrameStatus::Generating);

        frame.mark_done("data:image/png;base64,AAAA".to_string());
        assert_eq!(frame.status, FrameStatus::Done);
        assert!(frame.status.is_terminal());
        assert!(frame.image_url.is_some());
    }

    #[test]
    fn test_errored_frame_has_no_image() {
        let plan = StoryboardFramePlan {
            frame_number: 9,
            shot_type: "Wide Shot".to_string(),
            prompt: "p".to_string(),
            description: "d".to_string(),
        };
        let mut frame = GeneratedFrame::pending(plan);
        frame.mark_generating();
        frame.mark_error();
        assert_eq!(frame.status, FrameStatus::Error);
        assert!(frame.image_url.is_none());
    }

    #[test]
    fn test_aspect_ratio_round_trip() {
        for ratio in ["1:1", "16:9", "4:3"] {
            assert_eq!(ratio.parse::<AspectRatio>().unwrap().to_string(), ratio);
        }
        assert!("21:9".parse::<AspectRatio>().is_err());
    }

    #[test]
    fn test_frame_status_serde_matches_wire_names() {
        assert_eq!(serde_json::to_string(&FrameStatus::Pending).unwrap(), "\"pending\"");
        assert_eq!(serde_json::to_string(&SessionState::Complete).unwrap(), "\"COMPLETE\"");
    }

    #[test]
    fn test_analysis_serde_uses_camel_case() {
        let analysis = ImageAnalysis {
            subject: "s".into(),
            style: "st".into(),
            lighting: "l".into(),
            key_elements: "k".into(),
            character_dna: "short black hair, green eyes, red jacket".into(),
        };
        let json = serde_json::to_string(&analysis).unwrap();
        assert!(json.contains("keyElements"));
        assert!(json.contains("characterDNA"));
    }
}
