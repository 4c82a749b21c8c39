// ============================================================
// Layer 3 — Image Domain Types
// ============================================================
// The three image shapes a radiograph takes on its way
// through the pipeline:
//
//   RawImage        — decoded samples straight from the file,
//                     still in the source value range (e.g. 12-bit DICOM)
//   CanonicalImage  — RGB, 8 bits per channel, original H×W.
//                     Shown to the reviewer and used as overlay base.
//   Overlay         — RGB, 8 bits per channel, always 512×512.
//                     Canonical image blended with the heatmap.
//
// Reference: Rust Book §5 (Structs), §6 (Enums)

use std::path::Path;

use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::domain::error::{DetectionError, Result};

/// Side length of every model-facing and overlay image
pub const MODEL_SIZE: u32 = 512;

// ─── FileKind ─────────────────────────────────────────────────────────────────
/// The two families of radiograph files the ingestor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileKind {
    /// `.dcm` — medical DICOM with arbitrary bit depth
    Dicom,
    /// `.jpg`, `.jpeg`, `.png` — ordinary 8-bit raster images
    Raster,
}

impl FileKind {
    /// Infer the kind from the file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref() {
            Some("dcm")                  => Ok(Self::Dicom),
            Some("jpg" | "jpeg" | "png") => Ok(Self::Raster),
            Some(other) => Err(DetectionError::ingest(
                path.display().to_string(),
                format!("unsupported file extension '.{other}'"),
            )),
            None => Err(DetectionError::ingest(
                path.display().to_string(),
                "file has no extension",
            )),
        }
    }
}

// ─── RawImage ─────────────────────────────────────────────────────────────────
/// Decoded pixel buffer plus the metadata needed to window it.
/// Samples are interleaved row-major: `(y * width + x) * channels + c`.
#[derive(Debug, Clone)]
pub struct RawImage {
    pub width:     u32,
    pub height:    u32,
    /// 1 for grayscale, 3 for colour
    pub channels:  u8,
    /// Bits per stored sample in the source file
    pub bit_depth: u16,
    pub kind:      FileKind,
    pub samples:   Vec<f32>,
}

impl RawImage {
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty() || self.pixel_count() == 0
    }
}

// ─── CanonicalImage ───────────────────────────────────────────────────────────
/// RGB 8-bit rendering of the radiograph at its native resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalImage {
    pixels: RgbImage,
    kind:   FileKind,
}

impl CanonicalImage {
    pub fn new(pixels: RgbImage, kind: FileKind) -> Self {
        Self { pixels, kind }
    }

    /// The RGB pixel array consumed by the preprocessor
    pub fn pixels(&self) -> &RgbImage {
        &self.pixels
    }

    pub fn kind(&self) -> FileKind {
        self.kind
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }
}

// ─── Overlay ──────────────────────────────────────────────────────────────────
/// Final 512×512 RGB explanation image.
#[derive(Debug, Clone, PartialEq)]
pub struct Overlay(RgbImage);

impl Overlay {
    pub fn new(pixels: RgbImage) -> Self {
        Self(pixels)
    }

    pub fn pixels(&self) -> &RgbImage {
        &self.0
    }

    /// Raw interleaved RGB bytes, 512 × 512 × 3
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_raw()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.0.dimensions()
    }
}
