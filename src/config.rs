use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::info;

pub const PROJECT_NAME: &str = "Auto-Creative Engine";
pub const DEMO_KEY: &str = "DEMO_KEY";

const DEFAULT_GEMINI_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_IMAGE_BASE: &str = "https://pollinations.ai/p";
const DEFAULT_IMAGE_MODEL: &str = "flux";
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_RENDER_CONCURRENCY: usize = 4;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;
const DEFAULT_PORT: u16 = 8000;

/// Process-wide settings, built once in `main` and shared behind an `Arc`.
#[derive(Clone)]
pub struct Settings {
    pub gemini_api_key: String,
    /// Auxiliary token; loaded for parity with deployments that set it, not sent anywhere.
    pub hf_token: Option<String>,
    pub gemini_base_url: String,
    pub gemini_model: String,
    pub image_base_url: String,
    pub image_model: String,
    pub temp_dir: PathBuf,
    pub output_dir: PathBuf,
    pub request_timeout: Duration,
    pub render_concurrency: usize,
    pub max_upload_bytes: usize,
    pub mock_mode: bool,
    pub port: u16,
}

impl Settings {
    pub fn from_env() -> Self {
        let base_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::from_lookup(|key| std::env::var(key).ok(), &base_dir)
    }

    /// Builds settings from an arbitrary key lookup. Relative default
    /// directories are resolved against `base_dir`.
    pub fn from_lookup<F>(lookup: F, base_dir: &Path) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let string_or = |key: &str, default: &str| {
            lookup(key).filter(|v| !v.trim().is_empty()).unwrap_or_else(|| default.to_string())
        };

        let gemini_api_key = lookup("GEMINI_API_KEY").unwrap_or_default();
        let forced_mock = lookup("CREATIVE_MOCK_MODE").map(|v| is_truthy(&v)).unwrap_or(false);
        let mock_mode = forced_mock || gemini_api_key.trim().is_empty() || gemini_api_key == DEMO_KEY;

        Self {
            hf_token: lookup("HF_TOKEN").filter(|v| !v.is_empty()),
            gemini_base_url: string_or("GEMINI_API_BASE", DEFAULT_GEMINI_BASE),
            gemini_model: string_or("GEMINI_MODEL", DEFAULT_GEMINI_MODEL),
            image_base_url: string_or("IMAGE_API_BASE", DEFAULT_IMAGE_BASE),
            image_model: string_or("IMAGE_MODEL", DEFAULT_IMAGE_MODEL),
            temp_dir: lookup("TEMP_DIR").map(PathBuf::from).unwrap_or_else(|| base_dir.join("temp_uploads")),
            output_dir: lookup("OUTPUT_DIR").map(PathBuf::from).unwrap_or_else(|| base_dir.join("generated_creatives")),
            request_timeout: Duration::from_secs(
                lookup("REQUEST_TIMEOUT_SECS").and_then(|v| v.parse().ok()).unwrap_or(DEFAULT_TIMEOUT_SECS),
            ),
            render_concurrency: lookup("RENDER_CONCURRENCY")
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_RENDER_CONCURRENCY)
                .max(1),
            max_upload_bytes: lookup("MAX_UPLOAD_BYTES").and_then(|v| v.parse().ok()).unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
            port: lookup("PORT").and_then(|v| v.parse().ok()).unwrap_or(DEFAULT_PORT),
            gemini_api_key,
            mock_mode,
        }
    }

    /// Creates the scratch and output directories if they are missing.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.temp_dir)?;
        std::fs::create_dir_all(&self.output_dir)?;
        info!(temp_dir = %self.temp_dir.display(), output_dir = %self.output_dir.display(), "📁 Storage directories ready");
        Ok(())
    }

    /// API key prefix safe for logs.
    pub fn redacted_key(&self) -> String {
        let key = &self.gemini_api_key;
        let visible: String = key.chars().take(6).collect();
        if key.is_empty() { "<unset>".to_string() } else { format!("{visible}***") }
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
