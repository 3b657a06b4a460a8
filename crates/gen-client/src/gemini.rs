//! Gemini `generateContent` REST backend.
//!
//! Analysis and planning use structured-JSON responses pinned by a response
//! schema; frame generation returns inline image bytes in the response parts.

use crate::{prompts, validate_sequence, GenError, GenerationClient};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use storyboard::{GenerationConfig, ImageAnalysis, ReferenceImage, StoryboardFramePlan};
use tracing::debug;

/// Model used for analysis and sequence planning.
pub const TEXT_MODEL: &str = "gemini-3-flash-preview";
/// Model used for frame image generation.
pub const IMAGE_MODEL: &str = "gemini-2.5-flash-image";

/// Environment variable holding the API credential, read at call time.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

pub struct GeminiClient {
    api_base: String,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Point the client at a different endpoint (self-hosted proxy, tests).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn api_key(&self) -> Result<String, GenError> {
        std::env::var(API_KEY_ENV).map_err(|_| GenError::MissingApiKey)
    }

    async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, GenError> {
        let api_key = self.api_key()?;
        let url = format!("{}/{}:generateContent", self.api_base, model);
        debug!(model, "sending generateContent request");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GenError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        Ok(response.json().await?)
    }
}

impl Default for GeminiClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerationClient for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn analyze_reference(&self, image: &ReferenceImage) -> Result<ImageAnalysis, GenError> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![
                    Part::inline(&image.mime_type, &image.data),
                    Part::text(prompts::ANALYSIS_PROMPT),
                ],
            }],
            generation_config: Some(GenerationConfigBody {
                response_mime_type: Some("application/json".to_string()),
                response_schema: Some(analysis_schema()),
                image_config: None,
            }),
        };

        let response = self.generate_content(TEXT_MODEL, &request).await?;
        let text = response.first_text().ok_or(GenError::EmptyResponse)?;
        Ok(serde_json::from_str(text)?)
    }

    async fn plan_sequence(
        &self,
        analysis: &ImageAnalysis,
        action: &str,
    ) -> Result<Vec<StoryboardFramePlan>, GenError> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part::text(prompts::sequence_prompt(analysis, action))],
            }],
            generation_config: Some(GenerationConfigBody {
                response_mime_type: Some("application/json".to_string()),
                response_schema: Some(sequence_schema()),
                image_config: None,
            }),
        };

        let response = self.generate_content(TEXT_MODEL, &request).await?;
        let text = response.first_text().ok_or(GenError::EmptyResponse)?;
        let plans: Vec<StoryboardFramePlan> = serde_json::from_str(text)?;
        validate_sequence(plans)
    }

    async fn generate_frame(
        &self,
        plan: &StoryboardFramePlan,
        reference: &ReferenceImage,
        config: &GenerationConfig,
    ) -> Result<String, GenError> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![
                    Part::text(prompts::frame_prompt(plan)),
                    Part::inline(&reference.mime_type, &reference.data),
                ],
            }],
            generation_config: Some(GenerationConfigBody {
                response_mime_type: None,
                response_schema: None,
                image_config: Some(ImageConfigBody {
                    aspect_ratio: config.aspect_ratio.to_string(),
                }),
            }),
        };

        let response = self.generate_content(IMAGE_MODEL, &request).await?;
        let image = response.first_inline_image().ok_or(GenError::NoImage)?;
        Ok(format!("data:image/png;base64,{}", image.data))
    }
}

fn analysis_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "OBJECT",
        "properties": {
            "subject": { "type": "STRING" },
            "style": { "type": "STRING" },
            "lighting": { "type": "STRING" },
            "keyElements": { "type": "STRING" },
            "characterDNA": { "type": "STRING" },
        },
        "required": ["subject", "style", "lighting", "keyElements", "characterDNA"],
    })
}

fn sequence_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "frameNumber": { "type": "INTEGER" },
                "shotType": { "type": "STRING" },
                "prompt": { "type": "STRING" },
                "description": { "type": "STRING" },
            },
            "required": ["frameNumber", "shotType", "prompt", "description"],
        },
    })
}

/// Request body for `models/{model}:generateContent`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfigBody>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

impl Part {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }

    fn inline(mime_type: &str, data: &str) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData {
                mime_type: mime_type.to_string(),
                data: data.to_string(),
            }),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfigBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_config: Option<ImageConfigBody>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageConfigBody {
    aspect_ratio: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

impl GenerateContentResponse {
    fn parts(&self) -> impl Iterator<Item = &Part> {
        self.candidates
            .iter()
            .filter_map(|c| c.content.as_ref())
            .flat_map(|c| c.parts.iter())
    }

    fn first_text(&self) -> Option<&str> {
        self.parts().find_map(|p| p.text.as_deref())
    }

    /// First part carrying inline binary image data.
    fn first_inline_image(&self) -> Option<&InlineData> {
        self.parts().find_map(|p| p.inline_data.as_ref())
    }
}
