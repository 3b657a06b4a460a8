//! Scripted in-memory client for tests and offline development. Returns
//! canned results with the same validation and failure surface as a real
//! backend.

use crate::{validate_sequence, GenError, GenerationClient};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use storyboard::{
    GenerationConfig, ImageAnalysis, ReferenceImage, StoryboardFramePlan, SEQUENCE_LEN,
};

/// 1x1 transparent PNG, base64-encoded.
const SAMPLE_IMAGE_B64: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

pub struct MockClient {
    analysis: ImageAnalysis,
    plans: Vec<StoryboardFramePlan>,
    failing_frames: HashSet<u32>,
    fail_analysis: bool,
    fail_planning: bool,
    generated: Arc<Mutex<Vec<u32>>>,
}

impl MockClient {
    pub fn new() -> Self {
        let shot_types = [
            "Wide Shot - High Angle",
            "Medium Shot - Eye Level",
            "Close Up - Low Angle",
            "Extreme Close Up - Eye Level",
            "Medium Long Shot - Dutch Angle",
            "Over-the-shoulder - Eye Level",
            "Extreme Wide Shot - Bird's Eye View",
            "Medium Close Up - High Angle",
            "Close Up - Eye Level",
        ];
        let plans = (1..=SEQUENCE_LEN as u32)
            .map(|n| StoryboardFramePlan {
                frame_number: n,
                shot_type: shot_types[(n - 1) as usize].to_string(),
                prompt: format!("beat {} of the story", n),
                description: format!("第 {} 镜", n),
            })
            .collect();

        Self {
            analysis: ImageAnalysis {
                subject: "a young traveler".to_string(),
                style: "cinematic".to_string(),
                lighting: "soft rim light".to_string(),
                key_elements: "rain-slicked street, neon signs".to_string(),
                character_dna: "short black hair, green eyes, red jacket".to_string(),
            },
            plans,
            failing_frames: HashSet::new(),
            fail_analysis: false,
            fail_planning: false,
            generated: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Shared view of the frame numbers passed to `generate_frame`, in call
    /// order. Clone it out before handing the client to a session.
    pub fn generated_order(&self) -> Arc<Mutex<Vec<u32>>> {
        self.generated.clone()
    }

    pub fn with_analysis(mut self, analysis: ImageAnalysis) -> Self {
        self.analysis = analysis;
        self
    }

    pub fn with_plans(mut self, plans: Vec<StoryboardFramePlan>) -> Self {
        self.plans = plans;
        self
    }

    /// Make generation of the given frame fail.
    pub fn with_failing_frame(mut self, frame_number: u32) -> Self {
        self.failing_frames.insert(frame_number);
        self
    }

    pub fn with_failing_analysis(mut self) -> Self {
        self.fail_analysis = true;
        self
    }

    pub fn with_failing_planning(mut self) -> Self {
        self.fail_planning = true;
        self
    }
}

impl Default for MockClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerationClient for MockClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn analyze_reference(&self, _image: &ReferenceImage) -> Result<ImageAnalysis, GenError> {
        if self.fail_analysis {
            return Err(GenError::EmptyResponse);
        }
        Ok(self.analysis.clone())
    }

    async fn plan_sequence(
        &self,
        _analysis: &ImageAnalysis,
        _action: &str,
    ) -> Result<Vec<StoryboardFramePlan>, GenError> {
        if self.fail_planning {
            return Err(GenError::EmptyResponse);
        }
        validate_sequence(self.plans.clone())
    }

    async fn generate_frame(
        &self,
        plan: &StoryboardFramePlan,
        _reference: &ReferenceImage,
        _config: &GenerationConfig,
    ) -> Result<String, GenError> {
        if let Ok(mut generated) = self.generated.lock() {
            generated.push(plan.frame_number);
        }
        if self.failing_frames.contains(&plan.frame_number) {
            return Err(GenError::NoImage);
        }
        Ok(format!("data:image/png;base64,{}", SAMPLE_IMAGE_B64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference() -> ReferenceImage {
        ReferenceImage {
            mime_type: "image/png".to_string(),
            data: SAMPLE_IMAGE_B64.to_string(),
        }
    }

    #[tokio::test]
    async fn test_mock_plans_are_valid_sequence() {
        let client = MockClient::new();
        let analysis = client.analyze_reference(&reference()).await.unwrap();
        let plans = client.plan_sequence(&analysis, "a walk home").await.unwrap();
        assert_eq!(plans.len(), SEQUENCE_LEN);
        assert_eq!(plans[0].frame_number, 1);
        assert_eq!(plans[8].frame_number, 9);
    }

    #[tokio::test]
    async fn test_mock_failing_frame() {
        let client = MockClient::new().with_failing_frame(5);
        let plans = client.plan_sequence(&client.analysis, "x").await.unwrap();
        let config = GenerationConfig::default();

        let ok = client
            .generate_frame(&plans[0], &reference(), &config)
            .await;
        assert!(ok.unwrap().starts_with("data:image/png;base64,"));

        let err = client
            .generate_frame(&plans[4], &reference(), &config)
            .await;
        assert!(matches!(err, Err(GenError::NoImage)));
    }
}
