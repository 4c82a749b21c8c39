// ============================================================
// Layer 5b — Overlay Composer
// ============================================================
// Renders a SaliencyMap as a jet heatmap and alpha-blends it
// over the canonical radiograph.
//
//   1. intensity = ⌊255 · s⌋                 (u8)
//   2. heat      = jet(intensity)             (RGB)
//   3. base      = canonical resized to 512×512 (triangle filter)
//   4. out       = round(0.6 · base + 0.4 · heat), saturated to u8
//
// Input and output are RGB throughout; the result is always
// 512 × 512 × 3 regardless of the radiograph's resolution.

use image::{imageops::FilterType, Rgb, RgbImage};
use serde::{Deserialize, Serialize};

use crate::domain::error::{DetectionError, Result};
use crate::domain::image::{CanonicalImage, Overlay, MODEL_SIZE};
use crate::domain::tensor::SaliencyMap;
use crate::explain::colormap::JetColormap;

// ─── Overlay Configuration ────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverlayConfig {
    /// Weight of the radiograph in the blend
    pub base_weight: f32,
    /// Weight of the heatmap in the blend
    pub heat_weight: f32,
    /// Side length of the overlay
    pub size:        u32,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            base_weight: 0.6,
            heat_weight: 0.4,
            size:        MODEL_SIZE,
        }
    }
}

// ─── OverlayComposer ──────────────────────────────────────────────────────────
#[derive(Debug, Clone, Default)]
pub struct OverlayComposer {
    config:   OverlayConfig,
    colormap: JetColormap,
}

impl OverlayComposer {
    pub fn new(config: OverlayConfig) -> Self {
        Self { config, colormap: JetColormap::new() }
    }

    /// Colourise the saliency map on its own.
    pub fn heatmap(&self, saliency: &SaliencyMap) -> Result<RgbImage> {
        let size = self.config.size;
        if (saliency.width(), saliency.height()) != (size as usize, size as usize) {
            return Err(DetectionError::inference(format!(
                "saliency map is {}x{}, overlay needs {size}x{size}",
                saliency.width(),
                saliency.height()
            )));
        }

        Ok(RgbImage::from_fn(size, size, |x, y| {
            // `as u8` truncates, matching an 8-bit cast of 255·s
            let intensity = (255.0 * saliency.get(x as usize, y as usize)) as u8;
            self.colormap.map(intensity)
        }))
    }

    /// Blend the heatmap over the canonical image.
    pub fn compose(&self, saliency: &SaliencyMap, canonical: &CanonicalImage) -> Result<Overlay> {
        let size = self.config.size;
        let heat = self.heatmap(saliency)?;

        let base = if canonical.dimensions() == (size, size) {
            canonical.pixels().clone()
        } else {
            image::imageops::resize(canonical.pixels(), size, size, FilterType::Triangle)
        };

        let (bw, hw) = (self.config.base_weight, self.config.heat_weight);
        let blended = RgbImage::from_fn(size, size, |x, y| {
            let b = base.get_pixel(x, y).0;
            let h = heat.get_pixel(x, y).0;
            let mix = |c: usize| {
                (f32::from(b[c]) * bw + f32::from(h[c]) * hw).round().clamp(0.0, 255.0) as u8
            };
            Rgb([mix(0), mix(1), mix(2)])
        });

        Ok(Overlay::new(blended))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::image::FileKind;

    fn uniform_saliency(value: f32) -> SaliencyMap {
        SaliencyMap::new((512, 512), vec![value; 512 * 512], (1, 1), vec![value])
    }

    fn solid(width: u32, height: u32, rgb: [u8; 3]) -> CanonicalImage {
        CanonicalImage::new(RgbImage::from_pixel(width, height, Rgb(rgb)), FileKind::Raster)
    }

    #[test]
    fn test_zero_saliency_blends_zero_colour_everywhere() {
        let overlay = OverlayComposer::default()
            .compose(&uniform_saliency(0.0), &solid(512, 512, [100, 100, 100]))
            .unwrap();

        assert_eq!(overlay.dimensions(), (512, 512));
        // 0.6·100 + 0.4·(0, 0, 128) = (60, 60, 111.2)
        assert!(overlay.pixels().pixels().all(|p| p.0 == [60, 60, 111]));
    }

    #[test]
    fn test_full_saliency_blends_red_end() {
        let overlay = OverlayComposer::default()
            .compose(&uniform_saliency(1.0), &solid(512, 512, [100, 100, 100]))
            .unwrap();
        assert_eq!(overlay.pixels().get_pixel(10, 10).0, [111, 60, 60]);
    }

    #[test]
    fn test_output_stays_rgb() {
        // A pure red base must stay in the first channel
        let overlay = OverlayComposer::default()
            .compose(&uniform_saliency(0.0), &solid(512, 512, [255, 0, 0]))
            .unwrap();
        assert_eq!(overlay.pixels().get_pixel(0, 0).0, [153, 0, 51]);
    }

    #[test]
    fn test_any_input_size_gives_512_overlay() {
        let composer = OverlayComposer::default();
        for (w, h) in [(1, 1), (1000, 300), (64, 2048)] {
            let overlay = composer
                .compose(&uniform_saliency(0.5), &solid(w, h, [30, 60, 90]))
                .unwrap();
            assert_eq!(overlay.dimensions(), (512, 512));
            assert_eq!(overlay.as_bytes().len(), 512 * 512 * 3);
        }
    }

    #[test]
    fn test_wrong_saliency_size_is_rejected() {
        let small = SaliencyMap::new((8, 8), vec![0.0; 64], (1, 1), vec![0.0]);
        let err = OverlayComposer::default()
            .compose(&small, &solid(8, 8, [0, 0, 0]))
            .unwrap_err();
        assert!(matches!(err, DetectionError::Inference(_)));
    }
}
