// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything between a file on disk and the model input tensor.
//
//   .dcm / .png / .jpg
//       │
//       ▼
//   ImageIngestor   → decodes, windows to 8 bits, expands to RGB
//       │             (CanonicalImage)
//       ▼
//   Preprocessor    → resize, luma, CLAHE, normalise
//       │             (InputTensor 1×512×512×1)
//       ▼
//   ClassifierPort
//
// Reference: Rust Book §13 (Iterators and Closures)

/// Decodes DICOM and raster radiographs
pub mod loader;

/// Fixed-shape tensor preparation
pub mod preprocessor;

/// Contrast-limited adaptive histogram equalization
pub mod clahe;
