//! Prompt assembly for the three generation calls. The wording is part of
//! the product: the analysis prompt pins the JSON field contract, and the
//! frame prompt carries the strict-identity rule that keeps the character
//! consistent across all nine frames.

use storyboard::{ImageAnalysis, StoryboardFramePlan};

/// Fixed instruction for the reference-image analysis call.
pub const ANALYSIS_PROMPT: &str = "\
You are a Director of Photography (DP). Analyze this reference image strictly for a continuity storyboard.
Extract the following details in JSON format:
1. subject: The main subject (person, object, scene).
2. style: The visual style (cinematic, grainy, photorealistic, noir, etc.).
3. lighting: The lighting setup (soft, harsh, rim, volumetric, etc.).
4. keyElements: Specific environmental details to preserve.
5. characterDNA: A precise description of the character's physical appearance (hair style/color, facial features, eyes, any unique traits, and EXACT clothing/outfit details). This is crucial for maintaining identity.";

/// Director prompt for the 9-shot sequence plan, embedding the analysis and
/// the user's story arc.
pub fn sequence_prompt(analysis: &ImageAnalysis, action: &str) -> String {
    format!(
        "Act as a professional Film Director and Storyboard Artist. Plan a high-end 9-frame cinematic sequence.

REFERENCE DNA:
- Subject: {subject}
- Style: {style}
- Lighting: {lighting}
- Key Elements: {key_elements}
- Character Appearance (STRICT CONSISTENCY REQUIRED): {character_dna}

STORY ARC: \"{action}\"

CORE MISSION: Create a visually dynamic sequence. You MUST vary the shot sizes and camera angles significantly across the 9 frames.

SHOT SIZES TO USE (Mix these):
- Extreme Close Up (ECU), Close Up (CU), Medium Close Up (MCU), Medium Shot (MS), Medium Long Shot (MLS), Wide Shot (WS), Extreme Wide Shot (EWS).

CAMERA ANGLES TO USE (Mix these):
- Eye level, High angle (俯拍), Low angle (仰拍), Bird's eye view (鸟瞰), Dutch angle (倾斜构图), Over-the-shoulder (过肩拍).

For each of the 9 frames, provide:
1. frameNumber (1-9)
2. shotType (e.g., \"Extreme Close Up - Low Angle\", \"Wide Shot - High Angle\")
3. prompt (A detailed visual description for an image generator that integrates the Character DNA and the specific action/composition)
4. description (A short director's note in Chinese explaining why this shot was chosen for the story)

Return the result as a JSON array of 9 objects.",
        subject = analysis.subject,
        style = analysis.style,
        lighting = analysis.lighting,
        key_elements = analysis.key_elements,
        character_dna = analysis.character_dna,
    )
}

/// Per-frame render prompt: shot framing, scene action, identity lock and
/// technical style directives.
pub fn frame_prompt(plan: &StoryboardFramePlan) -> String {
    format!(
        "Professional cinematic film still.
SHOT TYPE & COMPOSITION: {shot_type}.
SCENE ACTION: {prompt}.

STRICT IDENTITY RULE: The character in this frame MUST be IDENTICAL to the person in the provided reference image.
Do not change facial features, eye color, hair style, or clothing details.

TECHNICAL SPECS: Photorealistic, 35mm film grain, cinematic lighting, 8k, ultra-detailed textures.",
        shot_type = plan.shot_type,
        prompt = plan.prompt,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analysis() -> ImageAnalysis {
        ImageAnalysis {
            subject: "a lone astronaut".to_string(),
            style: "cinematic".to_string(),
            lighting: "volumetric".to_string(),
            key_elements: "red dust, habitat dome".to_string(),
            character_dna: "short black hair, green eyes, red jacket".to_string(),
        }
    }

    #[test]
    fn test_sequence_prompt_embeds_analysis_and_action() {
        let prompt = sequence_prompt(&analysis(), "she walks toward the dome");
        assert!(prompt.contains("short black hair, green eyes, red jacket"));
        assert!(prompt.contains("STORY ARC: \"she walks toward the dome\""));
        assert!(prompt.contains("9-frame"));
    }

    #[test]
    fn test_frame_prompt_carries_identity_rule() {
        let plan = StoryboardFramePlan {
            frame_number: 1,
            shot_type: "Wide Shot - High Angle".to_string(),
            prompt: "astronaut crossing the plain".to_string(),
            description: "建立场景".to_string(),
        };
        let prompt = frame_prompt(&plan);
        assert!(prompt.contains("SHOT TYPE & COMPOSITION: Wide Shot - High Angle."));
        assert!(prompt.contains("STRICT IDENTITY RULE"));
        assert!(prompt.contains("astronaut crossing the plain"));
    }
}
