use serde::{Deserialize, Serialize};

pub const DEFAULT_NUM_VARIANTS: usize = 10;
pub const METADATA_FILE: &str = "metadata.json";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct GenerationRequest {
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub product_description: Option<String>,
    #[serde(default)]
    pub brand_tone: Option<String>, // e.g. Luxury, Minimal, Energetic
    #[serde(default = "default_num_variants")]
    pub num_variants: usize,
}

fn default_num_variants() -> usize {
    DEFAULT_NUM_VARIANTS
}

impl Default for GenerationRequest {
    fn default() -> Self {
        Self {
            product_name: None,
            product_description: None,
            brand_tone: None,
            num_variants: DEFAULT_NUM_VARIANTS,
        }
    }
}

impl GenerationRequest {
    pub fn product_name(&self) -> &str {
        self.product_name.as_deref().unwrap_or_default()
    }

    pub fn product_description(&self) -> &str {
        self.product_description.as_deref().unwrap_or_default()
    }

    pub fn brand_tone(&self) -> &str {
        self.brand_tone.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AdCopy {
    pub headline: String,
    pub body: String,
    pub cta: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct CreativeSpec {
    pub id: usize,
    pub image_file: String,
    pub image_prompt: String,
    pub caption: String,
    pub ad_copy: AdCopy,
}

impl CreativeSpec {
    /// Filename of the rendered image for a 1-based creative id.
    pub fn image_file_for(id: usize) -> String {
        format!("creative_{id:02}.png")
    }
}

/// The `metadata.json` written once per batch.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CreativeCollection {
    pub product_name: String,
    pub brand_tone: String,
    pub num_variants: usize,
    pub creatives: Vec<CreativeSpec>,
}

impl CreativeCollection {
    pub fn new(request: &GenerationRequest, creatives: Vec<CreativeSpec>) -> Self {
        Self {
            product_name: request.product_name().to_string(),
            brand_tone: request.brand_tone().to_string(),
            num_variants: request.num_variants,
            creatives,
        }
    }
}

/// Result of a best-effort remote call. `Degraded` carries the fallback
/// value that was substituted and why.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Success(T),
    Degraded { value: T, reason: String },
}

impl<T> Outcome<T> {
    pub fn degraded(value: T, reason: impl Into<String>) -> Self {
        Outcome::Degraded { value, reason: reason.into() }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Outcome::Degraded { .. })
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Outcome::Success(_) => None,
            Outcome::Degraded { reason, .. } => Some(reason),
        }
    }

    pub fn value(&self) -> &T {
        match self {
            Outcome::Success(value) | Outcome::Degraded { value, .. } => value,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Outcome::Success(value) | Outcome::Degraded { value, .. } => value,
        }
    }
}
