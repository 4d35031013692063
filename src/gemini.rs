use std::path::Path;

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::config::Settings;
use crate::models::{AdCopy, CreativeSpec, GenerationRequest, Outcome};
use crate::providers::SpecGenerator;

#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("product image unusable: {0}")] Image(String),
    #[error("HTTP error: {0}")] Http(String),
    #[error("parse error: {0}")] Parse(String),
    #[error("Other: {0}")] Other(String),
}

// Helper function to truncate base64 data in JSON for cleaner logging
fn truncate_base64_in_json(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, val) in map.iter_mut() {
                if key == "data" {
                    if let serde_json::Value::String(s) = val {
                        if s.len() > 100 {
                            *val = serde_json::Value::String(format!("{}...[truncated {} chars]", &s[..50], s.len() - 50));
                        }
                    }
                } else {
                    truncate_base64_in_json(val);
                }
            }
        }
        serde_json::Value::Array(arr) => {
            for val in arr.iter_mut() {
                truncate_base64_in_json(val);
            }
        }
        _ => {}
    }
}

fn preview(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        format!("{}...[{} chars]", text.chars().take(max).collect::<String>(), text.len())
    }
}

/// Client for the multimodal model that writes the creative concepts.
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    mock_mode: bool,
}

impl GeminiClient {
    pub fn new(settings: &Settings) -> Result<Self, GeminiError> {
        let client = Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| GeminiError::Other(e.to_string()))?;
        Ok(Self {
            client,
            api_key: settings.gemini_api_key.clone(),
            base_url: settings.gemini_base_url.trim_end_matches('/').to_string(),
            model: settings.gemini_model.clone(),
            mock_mode: settings.mock_mode,
        })
    }

    pub fn build_creative_prompt(product_name: &str, product_description: &str, brand_tone: &str, num_variants: usize) -> String {
        format!(
            r#"You are an elite creative director.
Study the attached product image: its colours, shape, materials, aesthetics and selling points.

Context:
- Product Name: {product_name}
- Product Description: {product_description}
- Brand Tone: {brand_tone}

Create {num_variants} distinct creative concepts for a digital ad campaign.
Every concept needs an `image_prompt` that a text-to-image model (Flux, Stable Diffusion) will render as the final ad visual.

Rules for `image_prompt`:
1. The product is the main subject. Describe it visually (colour, shape, material) so the generator can reproduce a close likeness.
2. Place the brand logo subtly where it fits (corner watermark, branded packaging).
3. Keep a clean composition with a strong visual hierarchy.
4. Use an attractive, uncluttered background that suits the style (lighting, gradients).
5. Follow the brand tone "{brand_tone}":
   - Luxury: soft lighting, dark backgrounds, metallic accents.
   - Minimal: clean white or pastel backgrounds, simple layout.
   - Energetic: vibrant colours, dynamic shapes, playful glow.
6. The product must look sharp, clear and professionally lit.
7. Ask for a high-resolution, aesthetic, 4:5 aspect ratio image.

Across the concepts, vary:
- background colour and texture
- lighting style (cinematic, studio, natural, neon)
- camera angle or perspective (eye-level, low angle, top-down flat lay)
- colour palette, kept within the brand tone
- composition and layout

Each concept has these fields:
1. `image_prompt`: the full image-generator prompt with visual detail, lighting, style and quality boosters ("8k", "photorealistic").
2. `caption`: a catchy social media caption with hashtags.
3. `headline`: a punchy ad headline, at most 10 words.
4. `body`: persuasive ad body copy, 1-2 sentences.
5. `cta`: a strong call to action.

Reply with ONLY a valid JSON array of objects. Do not wrap it in markdown such as ```json ... ```.
Format:
[
  {{
    "image_prompt": "...",
    "caption": "...",
    "headline": "...",
    "body": "...",
    "cta": "..."
  }}
]"#
        )
    }

    async fn perform_api_call(&self, prompt: &str, image: &[u8], mime_type: &str) -> Result<String, GeminiError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);

        info!("🔗 Making request to: {}", url);

        let request_body = json!({
            "contents": [{
                "parts": [
                    {"text": prompt},
                    {"inlineData": {
                        "mimeType": mime_type,
                        "data": base64::engine::general_purpose::STANDARD.encode(image)
                    }}
                ]
            }],
            "generationConfig": {
                "responseMimeType": "application/json"
            }
        });

        let mut loggable = request_body.clone();
        truncate_base64_in_json(&mut loggable);
        debug!("📤 Request body: {}", serde_json::to_string_pretty(&loggable).unwrap_or_default());

        let response = self.client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| GeminiError::Http(e.without_url().to_string()))?;

        let status = response.status();
        info!("📥 Response status: {}", status);

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!("❌ API Error response: {}", error_body);
            return Err(GeminiError::Http(format!("status={} body={}", status, error_body)));
        }

        let response_text = response.text().await
            .map_err(|e| GeminiError::Http(e.without_url().to_string()))?;
        debug!("📥 Raw Gemini API response: {}", preview(&response_text, 1000));

        let parsed: GeminiResponse = serde_json::from_str(&response_text)
            .map_err(|e| GeminiError::Parse(format!("{}: {}", e, preview(&response_text, 200))))?;

        extract_text(&parsed).ok_or_else(|| GeminiError::Other("no text content in response".into()))
    }

    async fn request_specs(&self, request: &GenerationRequest, product_image: &Path) -> Result<Vec<CreativeSpec>, GeminiError> {
        let image_bytes = tokio::fs::read(product_image)
            .await
            .map_err(|e| GeminiError::Image(e.to_string()))?;
        let mime_type = image::guess_format(&image_bytes)
            .map_err(|e| GeminiError::Image(e.to_string()))?
            .to_mime_type();

        let prompt = Self::build_creative_prompt(
            request.product_name(),
            request.product_description(),
            request.brand_tone(),
            request.num_variants,
        );
        let raw = self.perform_api_call(&prompt, &image_bytes, mime_type).await?;
        parse_creative_specs(&raw, request.num_variants)
    }
}

#[async_trait]
impl SpecGenerator for GeminiClient {
    async fn generate_specs(&self, request: &GenerationRequest, product_image: &Path) -> Outcome<Vec<CreativeSpec>> {
        let fallback = || mock_specs(request.num_variants, request.product_name(), request.brand_tone());

        if self.mock_mode {
            info!("Using demo mode - templated creative specs");
            return Outcome::degraded(fallback(), "mock mode");
        }

        info!("🔍 Analyzing product image for {}...", request.product_name());
        match self.request_specs(request, product_image).await {
            Ok(specs) => {
                info!("✅ Model returned {} creative specs ({} requested)", specs.len(), request.num_variants);
                Outcome::Success(specs)
            }
            Err(e) => {
                error!("❌ Creative spec generation failed: {}", e);
                info!("🔄 Falling back to mock specs");
                Outcome::degraded(fallback(), e.to_string())
            }
        }
    }
}

/// Removes a markdown code fence the model sometimes wraps around JSON.
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    if !trimmed.starts_with("```") {
        return trimmed;
    }
    let without_opening = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_opening.strip_suffix("```").unwrap_or(without_opening).trim()
}

#[derive(Debug, Deserialize)]
struct RawCreative {
    #[serde(default)]
    image_prompt: Option<String>,
    #[serde(default)]
    caption: Option<String>,
    #[serde(default)]
    headline: Option<String>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    cta: Option<String>,
}

/// Parses the model's JSON array into specs numbered from 1, keeping at most
/// `limit` entries. Missing fields become empty strings.
pub fn parse_creative_specs(raw: &str, limit: usize) -> Result<Vec<CreativeSpec>, GeminiError> {
    let items: Vec<RawCreative> = serde_json::from_str(strip_code_fence(raw))
        .map_err(|e| GeminiError::Parse(format!("{}: {}", e, preview(raw, 200))))?;

    Ok(items
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(i, item)| {
            let id = i + 1;
            CreativeSpec {
                id,
                image_file: CreativeSpec::image_file_for(id),
                image_prompt: item.image_prompt.unwrap_or_default(),
                caption: item.caption.unwrap_or_default(),
                ad_copy: AdCopy {
                    headline: item.headline.unwrap_or_default(),
                    body: item.body.unwrap_or_default(),
                    cta: item.cta.unwrap_or_default(),
                },
            }
        })
        .collect())
}

/// Deterministic specs used whenever the model can't be reached or understood.
pub fn mock_specs(num_variants: usize, product_name: &str, brand_tone: &str) -> Vec<CreativeSpec> {
    (1..=num_variants)
        .map(|id| CreativeSpec {
            id,
            image_file: CreativeSpec::image_file_for(id),
            image_prompt: format!("Professional photo of {product_name}, {brand_tone} style, high quality, 4k"),
            caption: format!("Experience the best {product_name} today!"),
            ad_copy: AdCopy {
                headline: format!("New {product_name}"),
                body: format!("This is the best {product_name} you can find."),
                cta: "Shop Now".to_string(),
            },
        })
        .collect()
}

// --- Response Parsing Helpers ---

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate { #[serde(default)] content: Content }

#[derive(Debug, Deserialize, Default)]
struct Content { #[serde(default)] parts: Vec<Part> }

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    Other(serde_json::Value),
}

fn extract_text(resp: &GeminiResponse) -> Option<String> {
    let text: String = resp
        .candidates
        .first()?
        .content
        .parts
        .iter()
        .filter_map(|p| match p {
            Part::Text { text } => Some(text.as_str()),
            Part::Other(_) => None,
        })
        .collect();
    if text.trim().is_empty() { None } else { Some(text) }
}
