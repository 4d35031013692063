use std::sync::Arc;

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, Multipart, State},
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tokio_util::io::ReaderStream;
use tower_http::cors::{Any, CorsLayer};

use crate::config::PROJECT_NAME;
use crate::engine::CreativeEngine;
use crate::error::ApiError;
use crate::models::{GenerationRequest, DEFAULT_NUM_VARIANTS};
use crate::staging::Upload;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<CreativeEngine>,
}

pub fn router(state: AppState) -> Router {
    let body_limit = state.engine.settings().max_upload_bytes;
    Router::new()
        .route("/", get(root))
        .route("/generate-creatives", post(generate_creatives))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
                .expose_headers(Any),
        )
        .with_state(state)
}

pub async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "message": format!("Welcome to {PROJECT_NAME} API"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// The fields of the `/generate-creatives` form.
#[derive(Debug, Default)]
struct CreativeForm {
    logo: Option<Upload>,
    product_image: Option<Upload>,
    product_name: Option<String>,
    product_description: Option<String>,
    brand_tone: Option<String>,
    num_variants: Option<usize>,
}

impl CreativeForm {
    async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = Self::default();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "logo" | "product_image" => {
                    let filename = field.file_name().map(str::to_string);
                    let upload = Upload { filename, bytes: field.bytes().await? };
                    if name == "logo" { form.logo = Some(upload) } else { form.product_image = Some(upload) }
                }
                "product_name" => form.product_name = Some(field.text().await?),
                "product_description" => form.product_description = Some(field.text().await?),
                "brand_tone" => form.brand_tone = Some(field.text().await?),
                "num_variants" => {
                    let raw = field.text().await?;
                    let parsed = raw
                        .trim()
                        .parse::<usize>()
                        .map_err(|_| ApiError::InvalidForm(format!("num_variants must be a non-negative integer, got {raw:?}")))?;
                    form.num_variants = Some(parsed);
                }
                _ => {}
            }
        }
        Ok(form)
    }

    fn into_parts(self) -> Result<(Upload, Upload, GenerationRequest), ApiError> {
        let logo = required(self.logo, "logo")?;
        let product_image = required(self.product_image, "product_image")?;
        let request = GenerationRequest {
            product_name: Some(required(self.product_name, "product_name")?),
            product_description: Some(required(self.product_description, "product_description")?),
            brand_tone: Some(required(self.brand_tone, "brand_tone")?),
            num_variants: self.num_variants.unwrap_or(DEFAULT_NUM_VARIANTS),
        };
        Ok((logo, product_image, request))
    }
}

fn required<T>(value: Option<T>, field: &str) -> Result<T, ApiError> {
    value.ok_or_else(|| ApiError::InvalidForm(format!("missing form field `{field}`")))
}

pub async fn generate_creatives(State(state): State<AppState>, multipart: Multipart) -> Result<Response, ApiError> {
    let (logo, product_image, request) = CreativeForm::read(multipart).await?.into_parts()?;

    tracing::info!("🎯 Generating {} creatives for: {}", request.num_variants, request.product_name());
    let output = state.engine.process(&logo, &product_image, &request).await?;

    let archive = tokio::fs::File::open(&output.archive_path).await.map_err(ApiError::ReadArchive)?;
    let filename = output
        .archive_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("creatives.zip")
        .to_string();

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/zip"));
    if let Ok(value) = HeaderValue::from_str(&format!("attachment; filename=\"{filename}\"")) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    headers.insert("x-creatives-count", HeaderValue::from(output.collection.creatives.len()));
    headers.insert("x-creatives-placeholders", HeaderValue::from(output.placeholder_images));
    let source = if output.spec_fallback_reason.is_some() { "fallback" } else { "model" };
    headers.insert("x-creatives-specs", HeaderValue::from_static(source));

    Ok((headers, Body::from_stream(ReaderStream::new(archive))).into_response())
}
