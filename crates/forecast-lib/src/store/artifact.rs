//! On-disk artifact layout

use crate::predictor::PipelineInfo;
use crate::training::{FittedModel, TrainerParams};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Format marker written in every artifact envelope
pub const ARTIFACT_FORMAT: &str = "sales-forecaster/pipeline";

/// Outer JSON object: format marker, payload checksum and payload
///
/// The payload is kept as a JSON value so the checksum covers exactly the
/// bytes that are re-serialized on load.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Envelope {
    pub format: String,
    pub checksum: String,
    pub payload: serde_json::Value,
}

/// Versioned artifact payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "version")]
pub(crate) enum ArtifactPayload {
    #[serde(rename = "1")]
    V1(ArtifactV1),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ArtifactV1 {
    pub metadata: ArtifactMetadata,
    pub model: FittedModel,
}

/// Everything needed to rebuild the encoding and check the record schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub schema: String,
    pub key_field: String,
    /// Numeric fields in model input order
    pub numeric_fields: Vec<String>,
    /// Sorted one-hot vocabulary
    pub vocabulary: Vec<String>,
    pub trained_at: DateTime<Utc>,
    pub trained_rows: usize,
    pub seed: u64,
    pub params: TrainerParams,
}

impl ArtifactMetadata {
    pub(crate) fn info(&self) -> PipelineInfo {
        PipelineInfo {
            trained_at: self.trained_at,
            trained_rows: self.trained_rows,
            seed: self.seed,
        }
    }
}

/// Hex SHA-256 of the compact payload serialization
pub(crate) fn payload_checksum(payload: &serde_json::Value) -> serde_json::Result<String> {
    let bytes = serde_json::to_vec(payload)?;
    Ok(compute_checksum(&bytes))
}

fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
