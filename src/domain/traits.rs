// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The pipeline depends on these traits, never on a concrete
// model or facade:
//
//   ClassifierPort — a frozen classifier that can run forward
//                    inference AND expose the gradient of a class
//                    score at a named layer.
//                      - BurnClassifier → Burn CNN with autodiff
//                      - test stubs     → fixed probabilities/maps
//
//   Diagnoser      — anything that turns a radiograph file into
//                    a PredictionResult.
//                      - PneumoniaDetector → the full pipeline
//
// Swapping the model backend only requires a new ClassifierPort
// implementation; nothing upstream changes.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)
//            Rust Book §17 (Object Oriented Patterns)

use std::path::Path;

use crate::domain::error::Result;
use crate::domain::prediction::{ClassProbabilities, PredictionResult};
use crate::domain::tensor::{ActivationMap, FeatureMap, InputTensor};

// ─── ClassifierPort ───────────────────────────────────────────────────────────
/// Capability interface over a frozen multi-class model.
pub trait ClassifierPort: Send {
    /// Standard forward inference, softmax-normalised.
    fn forward(&self, input: &InputTensor) -> Result<ClassProbabilities>;

    /// Forward pass that also returns the activation tensor at `layer_id`
    /// and the gradient of `target_class`'s output score with respect to it.
    /// Both maps share the same `(H', W', C)` shape.
    ///
    /// Fails with `LayerNotFound` if `layer_id` is not part of the model.
    fn forward_with_activation_and_gradient(
        &self,
        input:        &InputTensor,
        layer_id:     &str,
        target_class: usize,
    ) -> Result<(ActivationMap, FeatureMap)>;

    /// Layer ids accepted by `forward_with_activation_and_gradient`
    fn layer_names(&self) -> Vec<String>;
}

// Backend is picked at runtime, so the loaded classifier is boxed.
impl<C: ClassifierPort + ?Sized> ClassifierPort for Box<C> {
    fn forward(&self, input: &InputTensor) -> Result<ClassProbabilities> {
        (**self).forward(input)
    }

    fn forward_with_activation_and_gradient(
        &self,
        input:        &InputTensor,
        layer_id:     &str,
        target_class: usize,
    ) -> Result<(ActivationMap, FeatureMap)> {
        (**self).forward_with_activation_and_gradient(input, layer_id, target_class)
    }

    fn layer_names(&self) -> Vec<String> {
        (**self).layer_names()
    }
}

// ─── Diagnoser ────────────────────────────────────────────────────────────────
/// Any component that can classify and explain a radiograph file.
pub trait Diagnoser {
    fn predict(&self, path: &Path) -> Result<PredictionResult>;
}
