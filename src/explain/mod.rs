// ============================================================
// Layer 5b — Explanation Layer
// ============================================================
// Turns (activation, gradient) pairs from the classifier into
// something a reviewer can look at.
//
//   saliency.rs  — Grad-CAM: channel weights, weighted sum,
//                  ReLU, normalisation, noise floor, resize
//   colormap.rs  — 256-entry jet lookup table (RGB)
//   overlay.rs   — heatmap rendering and alpha blending
//
// Like the domain layer, nothing here imports Burn: the maths
// runs on plain FeatureMap values and is tested with
// synthetic tensors.
//
// Reference: Selvaraju et al. (2017) Grad-CAM

/// Grad-CAM saliency computation
pub mod saliency;

/// Jet false-colour lookup table
pub mod colormap;

/// Heatmap rendering and blending
pub mod overlay;
