//! Label extraction: turns an uploaded photo into descriptive labels using an
//! external image-recognition service.

pub mod google;

use std::time::Instant;

use opentelemetry::KeyValue;

use crate::error::AppError;
use crate::telemetry::metrics::{VISION_DURATION, VISION_LABELS};

pub use google::GoogleVision;

#[async_trait::async_trait]
pub trait LabelSource: Send + Sync {
    /// Labels for the image, in the order the service ranked them.
    async fn labels(&self, image: &[u8]) -> anyhow::Result<Vec<String>>;
    fn name(&self) -> &str;
}

#[tracing::instrument(
    name = "pipeline_stage labels",
    skip(source, image),
    fields(
        pipeline.stage = "labels",
        image.bytes = image.len(),
        labels.count,
    )
)]
pub async fn extract_labels(source: &dyn LabelSource, image: &[u8]) -> Result<Vec<String>, AppError> {
    if image.is_empty() {
        return Err(AppError::InputMissing("No image uploaded".into()));
    }

    let start = Instant::now();
    let result = source.labels(image).await;
    let service_kv = KeyValue::new("vision.service", source.name().to_string());
    VISION_DURATION.record(start.elapsed().as_secs_f64(), &[service_kv.clone()]);

    let labels = result.map_err(|e| AppError::upstream("image recognition", e))?;

    VISION_LABELS.record(labels.len() as f64, &[service_kv]);
    tracing::Span::current().record("labels.count", labels.len());
    tracing::info!(labels = ?labels, "Image labeled");

    Ok(labels)
}
