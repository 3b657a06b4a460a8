use async_trait::async_trait;
use storyboard::{
    GenerationConfig, ImageAnalysis, ReferenceImage, StoryboardFramePlan, SEQUENCE_LEN,
};
use thiserror::Error;

pub mod gemini;
pub mod mock;
pub mod prompts;

pub use gemini::GeminiClient;
pub use mock::MockClient;

#[derive(Debug, Error)]
pub enum GenError {
    #[error("GEMINI_API_KEY not set in environment")]
    MissingApiKey,
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("empty response from model")]
    EmptyResponse,
    #[error("failed to parse model response: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid storyboard sequence: {0}")]
    InvalidSequence(String),
    #[error("no image generated")]
    NoImage,
}

/// Adapter over the external generation service. Three operations, one
/// request/response exchange each: no retries, no caching, no rate limiting.
/// Failures surface as typed errors to the caller.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Provider name, for logging.
    fn name(&self) -> &str;

    /// Extract the visual fingerprint of the reference image.
    async fn analyze_reference(&self, image: &ReferenceImage) -> Result<ImageAnalysis, GenError>;

    /// Plan the 9-shot sequence for the given story arc. The returned plans
    /// are validated (exactly 9, frame numbers dense 1..9) and sorted.
    async fn plan_sequence(
        &self,
        analysis: &ImageAnalysis,
        action: &str,
    ) -> Result<Vec<StoryboardFramePlan>, GenError>;

    /// Generate one frame image against the reference, returning a
    /// `data:image/png;base64,...` URI.
    async fn generate_frame(
        &self,
        plan: &StoryboardFramePlan,
        reference: &ReferenceImage,
        config: &GenerationConfig,
    ) -> Result<String, GenError>;
}

/// Check that a planned sequence is exactly 9 frames numbered 1..9 with no
/// gaps or duplicates, and return it sorted by frame number.
pub fn validate_sequence(
    mut plans: Vec<StoryboardFramePlan>,
) -> Result<Vec<StoryboardFramePlan>, GenError> {
    if plans.len() != SEQUENCE_LEN {
        return Err(GenError::InvalidSequence(format!(
            "expected {} frames, got {}",
            SEQUENCE_LEN,
            plans.len()
        )));
    }
    plans.sort_by_key(|p| p.frame_number);
    for (idx, plan) in plans.iter().enumerate() {
        let expected = idx as u32 + 1;
        if plan.frame_number != expected {
            return Err(GenError::InvalidSequence(format!(
                "frame numbers must be 1..{} contiguous, found {}",
                SEQUENCE_LEN, plan.frame_number
            )));
        }
    }
    Ok(plans)
}
