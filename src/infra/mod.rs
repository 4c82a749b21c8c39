// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Filesystem concerns shared by the other layers:
//
//   checkpoint.rs — model_config.json + CompactRecorder weights.
//                   Rebuilds the CNN architecture before the
//                   weights are loaded into it.
//
//   artifacts.rs  — writes the heatmap overlay and the
//                   canonical radiograph of a prediction as
//                   PNG files.
//
// Reference: Burn Book §5 (Checkpointing)
//            Rust Book §9 (Error Handling with anyhow)

/// Model checkpoint saving and loading
pub mod checkpoint;

/// PNG output for prediction results
pub mod artifacts;
