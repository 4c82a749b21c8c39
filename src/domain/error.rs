// ============================================================
// Layer 3 — Error Taxonomy
// ============================================================
// Every failure the detection pipeline can produce.
//
//   Ingest        — file missing, empty, corrupt or unsupported
//   ModelLoad     — checkpoint missing or unreadable (startup only)
//   LayerNotFound — target layer is not part of the model
//   Inference     — anything else going wrong in forward/backward
//
// None of these are retried. Degenerate-but-valid inputs
// (all-zero DICOM pixels, non-positive saliency) are NOT errors,
// they produce zero-valued outputs instead.
//
// Reference: Rust Book §9 (Error Handling)
//            thiserror crate documentation

use thiserror::Error;

/// Errors surfaced by the detection pipeline.
#[derive(Error, Debug)]
pub enum DetectionError {
    /// The radiograph could not be read or decoded.
    #[error("cannot ingest '{path}': {reason}")]
    Ingest {
        path:   String,
        reason: String,
    },

    /// The classifier checkpoint could not be loaded.
    #[error("cannot load model from '{path}': {reason}")]
    ModelLoad {
        path:   String,
        reason: String,
    },

    /// The requested target layer does not exist in the model.
    #[error("layer '{layer}' not found (available: {available})")]
    LayerNotFound {
        layer:     String,
        available: String,
    },

    /// The forward or backward computation failed.
    #[error("inference failed: {0}")]
    Inference(String),
}

impl DetectionError {
    pub fn ingest(path: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Ingest { path: path.into(), reason: reason.to_string() }
    }

    pub fn model_load(path: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::ModelLoad { path: path.into(), reason: reason.to_string() }
    }

    pub fn layer_not_found(layer: impl Into<String>, available: &[String]) -> Self {
        Self::LayerNotFound {
            layer:     layer.into(),
            available: available.join(", "),
        }
    }

    pub fn inference(reason: impl std::fmt::Display) -> Self {
        Self::Inference(reason.to_string())
    }
}

/// Result alias used throughout the pipeline layers
pub type Result<T> = std::result::Result<T, DetectionError>;
