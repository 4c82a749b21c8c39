// ============================================================
// Layer 5b — Saliency Map Generator (Grad-CAM)
// ============================================================
// Computes a class-discriminative saliency map from the
// activations A (H'×W'×C) of a convolutional layer and the
// gradient G of the target class score with respect to A.
//
//   1. w_c    = mean over (x, y) of G[:, :, c]
//   2. M(x,y) = Σ_c w_c · A(x, y, c)
//   3. M      = max(M, 0)              negative evidence dropped
//   4. M      = M / max(M)             only when max(M) > 0
//   5. M[M < threshold] = 0            background speckle removed
//   6. resize M to 512×512 (triangle filter)
//
// A map whose maximum is zero stays all-zero: "nothing salient"
// is a valid answer, never a division by zero or a NaN.
// Non-finite activations or gradients are an Inference error.
//
// No model or framework types are involved, so every step can be
// exercised with synthetic tensors.
//
// Reference: Selvaraju et al. (2017) Grad-CAM: Visual Explanations
//            from Deep Networks via Gradient-based Localization

use image::{imageops::FilterType, ImageBuffer, Luma};
use serde::{Deserialize, Serialize};

use crate::domain::error::{DetectionError, Result};
use crate::domain::image::MODEL_SIZE;
use crate::domain::tensor::{ActivationMap, FeatureMap, GradientWeights, SaliencyMap};

type FloatGray = ImageBuffer<Luma<f32>, Vec<f32>>;

// ─── Saliency Configuration ───────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SaliencyConfig {
    /// Normalised values below this noise floor are zeroed
    pub threshold:   f32,
    /// Side length of the resized map
    pub output_size: u32,
}

impl Default for SaliencyConfig {
    fn default() -> Self {
        Self {
            threshold:   0.10,
            output_size: MODEL_SIZE,
        }
    }
}

// ─── SaliencyMapGenerator ─────────────────────────────────────────────────────
#[derive(Debug, Clone, Default)]
pub struct SaliencyMapGenerator {
    config: SaliencyConfig,
}

impl SaliencyMapGenerator {
    pub fn new(config: SaliencyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SaliencyConfig {
        &self.config
    }

    /// Spatial mean of the gradient, one weight per channel.
    pub fn gradient_weights(gradient: &FeatureMap) -> GradientWeights {
        let (h, w, c) = gradient.shape();
        let mut sums = vec![0.0f64; c];
        for y in 0..h {
            for x in 0..w {
                for (sum, &g) in sums.iter_mut().zip(gradient.pixel(y, x)) {
                    *sum += f64::from(g);
                }
            }
        }
        let n = (h * w).max(1) as f64;
        GradientWeights::new(sums.into_iter().map(|s| (s / n) as f32).collect())
    }

    /// Weighted channel sum `Σ_c w_c · A[:, :, c]`, row-major H'×W'.
    pub fn weighted_sum(activation: &ActivationMap, weights: &GradientWeights) -> Vec<f32> {
        let (h, w, _) = activation.shape();
        let mut map = Vec::with_capacity(h * w);
        for y in 0..h {
            for x in 0..w {
                let v: f32 = activation
                    .pixel(y, x)
                    .iter()
                    .zip(weights.as_slice())
                    .map(|(&a, &wc)| a * wc)
                    .sum();
                map.push(v);
            }
        }
        map
    }

    /// Run all six Grad-CAM steps.
    pub fn generate(&self, activation: &ActivationMap, gradient: &FeatureMap) -> Result<SaliencyMap> {
        if activation.shape() != gradient.shape() {
            return Err(DetectionError::inference(format!(
                "activation {:?} and gradient {:?} shapes differ",
                activation.shape(),
                gradient.shape()
            )));
        }
        let (h, w, c) = activation.shape();
        if h == 0 || w == 0 || c == 0 {
            return Err(DetectionError::inference("empty activation map"));
        }

        // ── Steps 1 + 2: weights and weighted sum ─────────────────────────────
        let weights = Self::gradient_weights(gradient);
        let mut map = Self::weighted_sum(activation, &weights);
        if let Some(pos) = map.iter().position(|v| !v.is_finite()) {
            return Err(DetectionError::inference(format!(
                "non-finite saliency value {} at ({}, {})",
                map[pos],
                pos % w,
                pos / w
            )));
        }

        // ── Step 3: rectify ───────────────────────────────────────────────────
        for v in map.iter_mut() {
            *v = v.max(0.0);
        }

        // ── Step 4: normalise ─────────────────────────────────────────────────
        let max = map.iter().copied().fold(0.0f32, f32::max);
        if max > 0.0 {
            for v in map.iter_mut() {
                *v /= max;
            }
        } else {
            tracing::debug!(
                "Saliency map is empty (all weights non-positive: {})",
                weights.all_non_positive()
            );
        }

        // ── Step 5: noise floor ───────────────────────────────────────────────
        let threshold = self.config.threshold;
        for v in map.iter_mut() {
            if *v < threshold {
                *v = 0.0;
            }
        }

        // ── Step 6: resize to display resolution ──────────────────────────────
        let size   = self.config.output_size;
        let values = resize_map(&map, w, h, size)?;

        Ok(SaliencyMap::new(
            (size as usize, size as usize),
            values,
            (w, h),
            map,
        ))
    }
}

/// Resize a row-major `w × h` map to `size × size`, keeping values in [0, 1].
fn resize_map(map: &[f32], w: usize, h: usize, size: u32) -> Result<Vec<f32>> {
    let target = size as usize * size as usize;
    if map.iter().all(|&v| v == 0.0) {
        return Ok(vec![0.0; target]);
    }
    if w == size as usize && h == size as usize {
        return Ok(map.to_vec());
    }

    let grid = FloatGray::from_raw(w as u32, h as u32, map.to_vec())
        .ok_or_else(|| DetectionError::inference("saliency buffer does not match its shape"))?;
    let resized = image::imageops::resize(&grid, size, size, FilterType::Triangle);

    Ok(resized.into_raw().into_iter().map(|v| v.clamp(0.0, 1.0)).collect())
}
