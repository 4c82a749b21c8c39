// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All Burn framework code for the classifier lives here; the
// explanation layer only ever sees plain FeatureMaps.
//
//   model.rs      — PneumoniaCnn: conv1..convN blocks
//                   (3×3 conv, ReLU, 2×2 max-pool), global
//                   average pooling, dense + softmax head.
//                   Can be split at any conv block so the
//                   activation there is exposed.
//
//   inferencer.rs — BurnClassifier: ClassifierPort over the
//                   CNN. Forward inference on the inner
//                   backend, Grad-CAM gradients through
//                   autodiff.
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §4 (Autodiff)

/// CNN architecture and its persisted config
pub mod model;

/// ClassifierPort implementation with autodiff gradients
pub mod inferencer;

/// Default backend: ndarray on the CPU
pub type CpuBackend = burn::backend::Autodiff<burn::backend::NdArray>;

/// GPU backend through wgpu
pub type GpuBackend = burn::backend::Autodiff<burn::backend::Wgpu>;
