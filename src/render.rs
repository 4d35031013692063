use std::io::Cursor;
use std::path::Path;

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use reqwest::{Client, StatusCode, Url};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::Settings;
use crate::models::Outcome;
use crate::providers::ImageRenderer;

pub const IMAGE_SIZE: u32 = 1024;
pub const RENDER_SEED: u32 = 42;

/// Fill colour when the renderer answered with a non-success status.
pub const STATUS_PLACEHOLDER: [u8; 3] = [100, 255, 100];
/// Fill colour when the request itself failed (timeout, connection, decode).
pub const ERROR_PLACEHOLDER: [u8; 3] = [255, 100, 100];
/// Fill colour in mock mode.
pub const MOCK_PLACEHOLDER: [u8; 3] = [200, 200, 200];

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("HTTP error: {0}")] Http(String),
    #[error("renderer returned {0}")] Status(StatusCode),
    #[error("invalid renderer url: {0}")] Url(String),
    #[error("image error: {0}")] Image(#[from] image::ImageError),
    #[error("io error: {0}")] Io(#[from] std::io::Error),
}

/// Text-to-image client for the public Pollinations endpoint.
pub struct PollinationsRenderer {
    client: Client,
    base_url: String,
    model: String,
    mock_mode: bool,
}

impl PollinationsRenderer {
    pub fn new(settings: &Settings) -> Result<Self, RenderError> {
        let client = Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| RenderError::Http(e.without_url().to_string()))?;
        Ok(Self {
            client,
            base_url: settings.image_base_url.clone(),
            model: settings.image_model.clone(),
            mock_mode: settings.mock_mode,
        })
    }

    /// `<base>/<percent-encoded prompt>?model=..&width=..&height=..&seed=42&nologo=true`
    pub fn render_url(&self, prompt: &str) -> Result<Url, RenderError> {
        let mut url = Url::parse(&self.base_url).map_err(|e| RenderError::Url(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| RenderError::Url(format!("{} cannot take a path", self.base_url)))?
            .pop_if_empty()
            .push(prompt);
        let size = IMAGE_SIZE.to_string();
        url.query_pairs_mut()
            .append_pair("model", &self.model)
            .append_pair("width", &size)
            .append_pair("height", &size)
            .append_pair("seed", &RENDER_SEED.to_string())
            .append_pair("nologo", "true");
        Ok(url)
    }

    async fn fetch_and_save(&self, prompt: &str, output: &Path) -> Result<(), RenderError> {
        let url = self.render_url(prompt)?;
        let response = self.client
            .get(url)
            .send()
            .await
            .map_err(|e| RenderError::Http(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Renderer error response {}: {}", status, body.chars().take(200).collect::<String>());
            return Err(RenderError::Status(status));
        }

        let bytes = response.bytes().await.map_err(|e| RenderError::Http(e.without_url().to_string()))?;
        let decoded = image::load_from_memory(&bytes)?;
        tokio::fs::write(output, encode_png(&decoded)?).await?;
        Ok(())
    }
}

#[async_trait]
impl ImageRenderer for PollinationsRenderer {
    // The reference image is accepted for interface parity; the endpoint has
    // no image-to-image parameter to forward it to.
    async fn render(&self, prompt: &str, output: &Path, _reference_image: &Path) -> Result<Outcome<()>, RenderError> {
        if self.mock_mode {
            write_placeholder(output, MOCK_PLACEHOLDER).await?;
            return Ok(Outcome::degraded((), "mock mode"));
        }

        info!("🎨 Generating image for prompt: {}", prompt.chars().take(80).collect::<String>());
        match self.fetch_and_save(prompt, output).await {
            Ok(()) => {
                info!("✅ Saved image to {}", output.display());
                Ok(Outcome::Success(()))
            }
            Err(e) => {
                error!("❌ Failed to generate image: {}", e);
                let color = match e {
                    RenderError::Status(_) => STATUS_PLACEHOLDER,
                    _ => ERROR_PLACEHOLDER,
                };
                write_placeholder(output, color).await?;
                info!("📦 Wrote placeholder image to {}", output.display());
                Ok(Outcome::degraded((), e.to_string()))
            }
        }
    }
}

fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    image.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
    Ok(buf)
}

/// Solid-colour `IMAGE_SIZE` square PNG.
pub fn placeholder_png(color: [u8; 3]) -> Result<Vec<u8>, image::ImageError> {
    encode_png(&DynamicImage::ImageRgb8(RgbImage::from_pixel(IMAGE_SIZE, IMAGE_SIZE, Rgb(color))))
}

pub async fn write_placeholder(output: &Path, color: [u8; 3]) -> Result<(), RenderError> {
    let png = placeholder_png(color)?;
    tokio::fs::write(output, png).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{closed_port_url, png_bytes, spawn_stub};
    use axum::{
        http::{header, StatusCode, Uri},
        Router,
    };
    use std::sync::{Arc, Mutex};

    fn renderer_for(base_url: &str, mock_mode: bool) -> PollinationsRenderer {
        let mut settings = Settings::from_lookup(|_| None, Path::new("."));
        settings.image_base_url = base_url.to_string();
        settings.request_timeout = std::time::Duration::from_secs(5);
        settings.mock_mode = mock_mode;
        PollinationsRenderer::new(&settings).unwrap()
    }

    fn pixel_at_origin(path: &Path) -> ([u8; 3], (u32, u32)) {
        let img = image::open(path).unwrap().to_rgb8();
        (img.get_pixel(0, 0).0, img.dimensions())
    }

    #[test]
    fn url_encodes_prompt_and_fixed_parameters() {
        let renderer = renderer_for("https://pollinations.ai/p", false);
        let url = renderer.render_url("red mug, soft light / 8k?").unwrap();

        assert_eq!(url.path(), "/p/red%20mug,%20soft%20light%20%2F%208k%3F");
        let query: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        let expected: Vec<(String, String)> = [
            ("model", "flux"),
            ("width", "1024"),
            ("height", "1024"),
            ("seed", "42"),
            ("nologo", "true"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        assert_eq!(query, expected);
    }

    #[test]
    fn trailing_slash_in_base_is_not_doubled() {
        let renderer = renderer_for("https://pollinations.ai/p/", false);
        let url = renderer.render_url("mug").unwrap();
        assert_eq!(url.path(), "/p/mug");
    }

    #[tokio::test]
    async fn saves_rendered_image_as_png() {
        let hits = Arc::new(Mutex::new(Vec::<String>::new()));
        let hits_in_stub = hits.clone();
        let stub = Router::new().fallback(move |uri: Uri| {
            let hits = hits_in_stub.clone();
            async move {
                hits.lock().unwrap().push(uri.to_string());
                ([(header::CONTENT_TYPE, "image/png")], png_bytes(16, 16, [1, 2, 3]))
            }
        });
        let base = spawn_stub(stub).await;
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("creative_01.png");

        let outcome = renderer_for(&format!("{base}/p"), false)
            .render("blue mug", &output, Path::new("unused.png"))
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Success(()));
        assert_eq!(pixel_at_origin(&output), ([1, 2, 3], (16, 16)));
        let hits = hits.lock().unwrap();
        assert!(hits[0].starts_with("/p/blue%20mug?"), "{}", hits[0]);
        assert!(hits[0].contains("seed=42"));
    }

    #[tokio::test]
    async fn error_status_writes_status_placeholder() {
        let stub = Router::new().fallback(|| async { (StatusCode::BAD_GATEWAY, "upstream down") });
        let base = spawn_stub(stub).await;
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("creative_02.png");

        let outcome = renderer_for(&base, false).render("mug", &output, Path::new("ref.png")).await.unwrap();

        assert!(outcome.reason().unwrap().contains("502"));
        assert_eq!(pixel_at_origin(&output), (STATUS_PLACEHOLDER, (IMAGE_SIZE, IMAGE_SIZE)));
    }

    #[tokio::test]
    async fn undecodable_body_writes_error_placeholder() {
        let stub = Router::new().fallback(|| async { "<html>not an image</html>" });
        let base = spawn_stub(stub).await;
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("creative_03.png");

        let outcome = renderer_for(&base, false).render("mug", &output, Path::new("ref.png")).await.unwrap();

        assert!(outcome.is_degraded());
        assert_eq!(pixel_at_origin(&output).0, ERROR_PLACEHOLDER);
    }

    #[tokio::test]
    async fn connection_failure_writes_error_placeholder() {
        let base = closed_port_url().await;
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("creative_04.png");

        let outcome = renderer_for(&base, false).render("mug", &output, Path::new("ref.png")).await.unwrap();

        assert!(outcome.reason().unwrap().starts_with("HTTP error"));
        assert_eq!(pixel_at_origin(&output).0, ERROR_PLACEHOLDER);
    }

    #[tokio::test]
    async fn mock_mode_writes_placeholder_without_network() {
        let base = closed_port_url().await;
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("creative_05.png");

        let outcome = renderer_for(&base, true).render("mug", &output, Path::new("ref.png")).await.unwrap();

        assert_eq!(outcome.reason(), Some("mock mode"));
        assert_eq!(pixel_at_origin(&output), (MOCK_PLACEHOLDER, (IMAGE_SIZE, IMAGE_SIZE)));
    }

    #[tokio::test]
    async fn unwritable_output_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("missing-dir").join("creative_01.png");

        let result = renderer_for("http://127.0.0.1:9", true).render("mug", &output, Path::new("ref.png")).await;

        assert!(matches!(result, Err(RenderError::Io(_))));
    }
}
