use std::path::Path;

use async_trait::async_trait;

use crate::models::{CreativeSpec, GenerationRequest, Outcome};
use crate::render::RenderError;

/// Produces the per-variant creative specifications for a request.
///
/// Never fails: when the remote model cannot be used the implementation
/// returns fallback specs tagged as [`Outcome::Degraded`].
#[async_trait]
pub trait SpecGenerator: Send + Sync {
    async fn generate_specs(&self, request: &GenerationRequest, product_image: &Path) -> Outcome<Vec<CreativeSpec>>;
}

/// Renders one image for a prompt into `output`.
///
/// Remote failures are absorbed by writing a placeholder and returning
/// [`Outcome::Degraded`]. `Err` means nothing could be written at all.
#[async_trait]
pub trait ImageRenderer: Send + Sync {
    async fn render(&self, prompt: &str, output: &Path, reference_image: &Path) -> Result<Outcome<()>, RenderError>;
}
