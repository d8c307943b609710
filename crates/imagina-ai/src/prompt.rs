//! Prompt construction for both providers.

use imagina_shared::constants::DEFAULT_ARTISTIC_STYLE;
use imagina_shared::GenerationParams;

/// Fold the generation hints into the text prompt sent to the image model.
///
/// Blank hints are skipped, as is the `none` style.
pub fn build_generation_prompt(prompt: &str, params: &GenerationParams) -> String {
    let mut out = prompt.trim().to_string();

    let style = params.artistic_style.trim();
    if !style.is_empty() && !style.eq_ignore_ascii_case(DEFAULT_ARTISTIC_STYLE) {
        out.push_str(", in the artistic style of ");
        out.push_str(style);
    }

    let aspect = params.aspect_ratio.trim();
    if !aspect.is_empty() {
        out.push_str(", with an aspect ratio of ");
        out.push_str(aspect);
    }

    let quality = params.image_quality.trim();
    if !quality.is_empty() {
        out.push_str(", ");
        out.push_str(quality_descriptor(quality));
    }

    out
}

fn quality_descriptor(quality: &str) -> &str {
    match quality {
        "draft" => "draft quality, quick sketch",
        "standard" => "standard quality",
        "high" => "high quality, detailed",
        other => other,
    }
}

/// Instructions for the text model that asks for collections and an
/// alternate prompt as a single JSON object.
pub fn suggestion_instructions(prompt: &str) -> String {
    format!(
        r#"You categorize AI-generated images and help users write better prompts.

1. Suggest 3 to 5 short keywords or phrases (collections) that categorize an image generated from the prompt below.
2. Suggest one alternative or enhanced prompt that could produce a similar or variant image, adding detail or a new perspective.

Reply ONLY with a JSON object with two keys: "tags" (an array of strings) and "suggestedPrompt" (a string, or null when there is no good suggestion).
Example:
{{
  "tags": ["Landscapes", "Dusk", "Impressionism"],
  "suggestedPrompt": "A serene mountain lake at dusk reflecting a vivid sky, painted in an impressionistic style"
}}

Image generation prompt:
"{}""#,
        prompt.trim()
    )
}
