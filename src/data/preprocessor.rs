// ============================================================
// Layer 4 — Image Preprocessor
// ============================================================
// Turns a canonical RGB image of any size into the model's
// fixed-shape input tensor.
//
// Steps (applied in order, no randomness anywhere):
//   1. Resize to 512×512 with a triangle (bilinear) filter
//   2. Reduce RGB to luma with ITU-R BT.601 weights
//        Y = 0.299 R + 0.587 G + 0.114 B   (14-bit fixed point, rounded)
//   3. CLAHE, clip limit 2.0 on a 4×4 tile grid
//   4. Scale u8 → f32 in [0, 1] (divide by 255)
//   5. Wrap as a (1, 512, 512, 1) batch tensor
//
// Identical input always yields a bit-identical tensor.
//
// Reference: ITU-R BT.601
//            Rust Book §13 (Iterators)

use image::{imageops::FilterType, GrayImage, Luma, RgbImage};
use serde::{Deserialize, Serialize};

use crate::data::clahe::Clahe;
use crate::domain::error::Result;
use crate::domain::image::MODEL_SIZE;
use crate::domain::tensor::InputTensor;

// ─── Preprocess Configuration ────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PreprocessConfig {
    /// Output side length in pixels
    pub size:       u32,
    /// CLAHE clip limit
    pub clip_limit: f32,
    /// CLAHE tiles per axis
    pub tile_grid:  usize,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            size:       MODEL_SIZE,
            clip_limit: 2.0,
            tile_grid:  4,
        }
    }
}

// ─── Preprocessor ─────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct Preprocessor {
    config: PreprocessConfig,
    clahe:  Clahe,
}

impl Preprocessor {
    pub fn new(config: PreprocessConfig) -> Self {
        let clahe = Clahe::new(config.clip_limit, config.tile_grid, config.tile_grid);
        Self { config, clahe }
    }

    pub fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    /// Run the full preprocessing chain on an RGB image.
    pub fn process(&self, image: &RgbImage) -> Result<InputTensor> {
        let size = self.config.size;

        // ── Step 1: Resize ────────────────────────────────────────────────────
        let resized;
        let image = if image.dimensions() == (size, size) {
            image
        } else {
            resized = image::imageops::resize(image, size, size, FilterType::Triangle);
            &resized
        };

        // ── Step 2: Luma ──────────────────────────────────────────────────────
        let gray = to_luma(image);

        // ── Step 3: Local contrast enhancement ────────────────────────────────
        let enhanced = self.clahe.apply(&gray);

        // ── Steps 4 + 5: Normalise and wrap ───────────────────────────────────
        let data: Vec<f32> = enhanced
            .as_raw()
            .iter()
            .map(|&v| f32::from(v) / 255.0)
            .collect();

        tracing::debug!("Preprocessed image to {}x{} tensor", size, size);
        InputTensor::new(size as usize, size as usize, data)
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new(PreprocessConfig::default())
    }
}

// BT.601 weights in 14-bit fixed point; they sum to 1 << 14, so gray stays gray
const LUMA_R: u32 = 4899;
const LUMA_G: u32 = 9617;
const LUMA_B: u32 = 1868;
const LUMA_SHIFT: u32 = 14;

/// BT.601 luma, rounded in 14-bit fixed point.
pub fn to_luma(image: &RgbImage) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b] = image.get_pixel(x, y).0;
        let sum = LUMA_R * u32::from(r) + LUMA_G * u32::from(g) + LUMA_B * u32::from(b);
        Luma([((sum + (1 << (LUMA_SHIFT - 1))) >> LUMA_SHIFT) as u8])
    })
}
