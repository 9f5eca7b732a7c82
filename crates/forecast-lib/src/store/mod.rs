//! Model artifact persistence
//!
//! One JSON file per fitted pipeline. Each write goes to its own temp file in
//! the target directory and is renamed over the target, so readers never see
//! a partial artifact. Concurrent writers to one path are last-writer-wins.

mod artifact;

#[cfg(test)]
mod tests;

pub use artifact::{ArtifactMetadata, ARTIFACT_FORMAT};

use crate::error::{ForecastError, Result};
use crate::models::Observation;
use crate::observability::{PipelineMetrics, StructuredLogger};
use crate::predictor::{FittedEncoding, FittedPipeline};
use artifact::{payload_checksum, ArtifactPayload, ArtifactV1, Envelope};
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Default artifact location
pub const DEFAULT_MODEL_PATH: &str = "country_sales_ml_model.json";

/// Persist a fitted pipeline, replacing any artifact at `path`
pub fn save<R: Observation>(pipeline: &FittedPipeline<R>, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let info = pipeline.info();
    let payload = ArtifactPayload::V1(ArtifactV1 {
        metadata: ArtifactMetadata {
            schema: R::SCHEMA.to_string(),
            key_field: R::KEY_FIELD.to_string(),
            numeric_fields: R::field_names(),
            vocabulary: pipeline.encoding().vocabulary().to_vec(),
            trained_at: info.trained_at,
            trained_rows: info.trained_rows,
            seed: info.seed,
            params: pipeline.model().params().clone(),
        },
        model: pipeline.model().clone(),
    });

    let payload = serde_json::to_value(&payload).map_err(io::Error::from)?;
    let envelope = Envelope {
        format: ARTIFACT_FORMAT.to_string(),
        checksum: payload_checksum(&payload).map_err(io::Error::from)?,
        payload,
    };
    let bytes = serde_json::to_vec_pretty(&envelope).map_err(io::Error::from)?;

    write_atomic(path, &bytes)?;

    PipelineMetrics::new().set_artifact_size(bytes.len() as u64);
    StructuredLogger::new(R::SCHEMA).log_model_saved(
        &path.display().to_string(),
        bytes.len() as u64,
        pipeline.encoding().vocabulary().len(),
    );
    Ok(())
}

/// Restore a pipeline saved for record schema `R`
pub fn load<R: Observation>(path: impl AsRef<Path>) -> Result<FittedPipeline<R>> {
    let path = path.as_ref();
    let (envelope, size) = read_envelope(path)?;
    if envelope.format != ARTIFACT_FORMAT {
        return Err(ForecastError::corrupt(
            path,
            format!("unknown artifact format {:?}", envelope.format),
        ));
    }
    let checksum = payload_checksum(&envelope.payload)
        .map_err(|e| ForecastError::corrupt(path, e.to_string()))?;
    if checksum != envelope.checksum {
        return Err(ForecastError::corrupt(
            path,
            format!(
                "checksum mismatch: expected {}, got {}",
                envelope.checksum, checksum
            ),
        ));
    }

    let ArtifactPayload::V1(artifact) = serde_json::from_value::<ArtifactPayload>(envelope.payload)
        .map_err(|e| ForecastError::corrupt(path, format!("invalid payload: {e}")))?;
    let ArtifactV1 { metadata, model } = artifact;

    check_schema::<R>(&metadata)?;
    model
        .validate()
        .map_err(|e| ForecastError::corrupt(path, e))?;

    let encoding = FittedEncoding::<R>::from_vocabulary(metadata.vocabulary.clone());
    if encoding.vocabulary() != metadata.vocabulary.as_slice() {
        return Err(ForecastError::corrupt(path, "vocabulary is not sorted and unique"));
    }
    if encoding.feature_len() != model.n_features() {
        return Err(ForecastError::corrupt(
            path,
            format!(
                "model expects {} features, encoding yields {}",
                model.n_features(),
                encoding.feature_len()
            ),
        ));
    }

    PipelineMetrics::new().set_artifact_size(size);
    StructuredLogger::new(R::SCHEMA).log_model_loaded(
        &path.display().to_string(),
        metadata.trained_rows,
        &metadata.trained_at.to_rfc3339(),
    );
    Ok(FittedPipeline::new(encoding, model, metadata.info()))
}

fn read_envelope(path: &Path) -> Result<(Envelope, u64)> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(ForecastError::ArtifactNotFound(path.to_path_buf()))
        }
        Err(e) => return Err(e.into()),
    };
    let envelope = serde_json::from_slice(&bytes)
        .map_err(|e| ForecastError::corrupt(path, format!("invalid envelope: {e}")))?;
    Ok((envelope, bytes.len() as u64))
}

fn check_schema<R: Observation>(metadata: &ArtifactMetadata) -> Result<()> {
    let expected_fields = R::field_names();
    if metadata.schema != R::SCHEMA
        || metadata.key_field != R::KEY_FIELD
        || metadata.numeric_fields != expected_fields
    {
        return Err(ForecastError::SchemaMismatch {
            expected: describe(R::SCHEMA, R::KEY_FIELD, &expected_fields),
            found: describe(&metadata.schema, &metadata.key_field, &metadata.numeric_fields),
        });
    }
    Ok(())
}

fn describe(schema: &str, key_field: &str, fields: &[String]) -> String {
    format!("{schema} (key {key_field}; fields {})", fields.join(", "))
}

/// Write `bytes` to a fresh temp file beside `path`, then rename it into place
///
/// The temp file is removed if any step fails.
fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(bytes)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}
