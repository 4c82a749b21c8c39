// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Pure Rust structs, enums and traits describing what the
// system works with: images, tensors, predictions, errors.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain Rust structs, enums, and traits
//     (image::RgbImage is used as a plain pixel container)
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// Error taxonomy shared by every layer
pub mod error;

// Raw, canonical and overlay images
pub mod image;

// Input tensor, feature maps, gradient weights, saliency map
pub mod tensor;

// Diagnosis labels, probabilities, PredictionResult
pub mod prediction;

// ClassifierPort and Diagnoser abstractions
pub mod traits;
