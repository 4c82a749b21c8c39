// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Orchestrates the other layers to classify and explain a
// radiograph.
//
// Rules for this layer:
//   - No model maths or image arithmetic here
//   - No printing here (that's Layer 1)
//   - Only workflow coordination
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// The classify-and-explain workflow
pub mod predict_use_case;
