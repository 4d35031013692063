use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::archive;
use crate::config::Settings;
use crate::error::EngineError;
use crate::models::{CreativeCollection, CreativeSpec, GenerationRequest, Outcome, METADATA_FILE};
use crate::providers::{ImageRenderer, SpecGenerator};
use crate::staging::{self, StagedFiles, Upload};

/// What a finished batch produced.
#[derive(Debug, Clone)]
pub struct BatchOutput {
    pub batch_id: String,
    pub archive_path: PathBuf,
    pub collection: CreativeCollection,
    /// Set when the specs came from the templated fallback instead of the model.
    pub spec_fallback_reason: Option<String>,
    pub placeholder_images: usize,
}

/// Runs the upload → specs → images → metadata → zip pipeline.
pub struct CreativeEngine {
    settings: Arc<Settings>,
    specs: Arc<dyn SpecGenerator>,
    renderer: Arc<dyn ImageRenderer>,
}

impl CreativeEngine {
    pub fn new(settings: Arc<Settings>, specs: Arc<dyn SpecGenerator>, renderer: Arc<dyn ImageRenderer>) -> Self {
        Self { settings, specs, renderer }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    #[instrument(skip_all, fields(product = %request.product_name(), num_variants = request.num_variants))]
    pub async fn process(&self, logo: &Upload, product_image: &Upload, request: &GenerationRequest) -> Result<BatchOutput, EngineError> {
        // Dropped on every return path, which removes whatever was staged.
        let mut staged = StagedFiles::new();
        let logo_path = staging::stage(&self.settings.temp_dir, logo).await.map_err(EngineError::Staging)?;
        staged.track(logo_path);
        let product_path = staging::stage(&self.settings.temp_dir, product_image).await.map_err(EngineError::Staging)?;
        staged.track(product_path.clone());

        let spec_outcome = self.specs.generate_specs(request, &product_path).await;
        let spec_fallback_reason = spec_outcome.reason().map(str::to_string);
        if let Some(reason) = &spec_fallback_reason {
            warn!(%reason, "Using fallback creative specs");
        }
        let specs = spec_outcome.into_value();

        let batch_id = new_batch_id();
        let batch_dir = self.settings.output_dir.join(&batch_id);
        tokio::fs::create_dir_all(&batch_dir).await.map_err(EngineError::BatchDir)?;
        info!(%batch_id, creatives = specs.len(), "🚀 Rendering batch");

        let placeholder_images = self.render_all(&specs, &batch_dir, &product_path).await?;

        let collection = CreativeCollection::new(request, specs);
        let metadata = serde_json::to_vec_pretty(&collection)?;
        tokio::fs::write(batch_dir.join(METADATA_FILE), metadata).await.map_err(EngineError::MetadataWrite)?;

        let archive_path = archive::archive_batch(&self.settings.output_dir, &batch_id).await?;
        info!(
            %batch_id,
            creatives = collection.creatives.len(),
            placeholders = placeholder_images,
            "✅ Batch ready at {}",
            archive_path.display()
        );

        Ok(BatchOutput { batch_id, archive_path, collection, spec_fallback_reason, placeholder_images })
    }

    /// Renders every spec with at most `render_concurrency` calls in flight
    /// and waits for all of them. Returns how many ended up as placeholders.
    async fn render_all(&self, specs: &[CreativeSpec], batch_dir: &Path, reference: &Path) -> Result<usize, EngineError> {
        let limit = self.settings.render_concurrency.max(1);
        let renders: Vec<_> = specs
            .iter()
            .map(|spec| {
                let output = batch_dir.join(&spec.image_file);
                async move { self.renderer.render(&spec.image_prompt, &output, reference).await }
            })
            .collect();
        let results: Vec<_> = stream::iter(renders).buffered(limit).collect().await;

        let mut placeholders = 0;
        for (spec, result) in specs.iter().zip(results) {
            if let Outcome::Degraded { reason, .. } = result? {
                placeholders += 1;
                warn!(creative = spec.id, %reason, "Placeholder image used");
            }
        }
        Ok(placeholders)
    }
}

fn new_batch_id() -> String {
    Uuid::new_v4().simple().to_string()
}
