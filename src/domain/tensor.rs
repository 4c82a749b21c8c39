// ============================================================
// Layer 3 — Tensor Value Types
// ============================================================
// Framework-free tensors passed between pipeline stages.
// None of these types know about Burn — the ml layer converts
// to and from them at the ClassifierPort boundary, which keeps
// the saliency maths testable with plain Vec<f32> data.
//
//   InputTensor     — (1, H, W, 1) model input, values in [0,1]
//   FeatureMap      — (H', W', C) activation or gradient at a layer
//   GradientWeights — (C,) spatial mean of the gradient per channel
//   SaliencyMap     — (512, 512) Grad-CAM map, values in [0,1]
//
// Reference: Rust Book §5 (Structs), §8 (Vectors)

use crate::domain::error::{DetectionError, Result};

// ─── InputTensor ──────────────────────────────────────────────────────────────
/// Single-channel batch tensor of shape `(1, height, width, 1)`.
#[derive(Debug, Clone, PartialEq)]
pub struct InputTensor {
    height: usize,
    width:  usize,
    data:   Vec<f32>,
}

impl InputTensor {
    /// Wrap row-major luma values. Length must equal `height * width`.
    pub fn new(height: usize, width: usize, data: Vec<f32>) -> Result<Self> {
        if data.len() != height * width {
            return Err(DetectionError::inference(format!(
                "input tensor expects {} values, got {}",
                height * width,
                data.len()
            )));
        }
        Ok(Self { height, width, data })
    }

    /// `[batch, height, width, channels]`
    pub fn shape(&self) -> [usize; 4] {
        [1, self.height, self.width, 1]
    }

    pub fn height(&self) -> usize { self.height }

    pub fn width(&self) -> usize { self.width }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

// ─── FeatureMap ───────────────────────────────────────────────────────────────
/// A spatial tensor `(height, width, channels)` stored HWC row-major:
/// `data[(y * width + x) * channels + c]`.
///
/// Used both for a layer's activations and for the gradient of the
/// class score with respect to those activations.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMap {
    height:   usize,
    width:    usize,
    channels: usize,
    data:     Vec<f32>,
}

/// Activations captured at the target layer
pub type ActivationMap = FeatureMap;

impl FeatureMap {
    pub fn new(height: usize, width: usize, channels: usize, data: Vec<f32>) -> Result<Self> {
        if data.len() != height * width * channels {
            return Err(DetectionError::inference(format!(
                "feature map {height}x{width}x{channels} expects {} values, got {}",
                height * width * channels,
                data.len()
            )));
        }
        Ok(Self { height, width, channels, data })
    }

    /// Every element set to `value`
    pub fn filled(height: usize, width: usize, channels: usize, value: f32) -> Self {
        Self { height, width, channels, data: vec![value; height * width * channels] }
    }

    /// Re-lay out a channel-first `(C, H, W)` buffer (Burn's NCHW with N = 1).
    pub fn from_chw(channels: usize, height: usize, width: usize, chw: &[f32]) -> Result<Self> {
        if chw.len() != channels * height * width {
            return Err(DetectionError::inference(format!(
                "CHW buffer {channels}x{height}x{width} expects {} values, got {}",
                channels * height * width,
                chw.len()
            )));
        }
        let plane = height * width;
        let mut data = vec![0.0f32; chw.len()];
        for c in 0..channels {
            for p in 0..plane {
                data[p * channels + c] = chw[c * plane + p];
            }
        }
        Ok(Self { height, width, channels, data })
    }

    /// `(height, width, channels)`
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.height, self.width, self.channels)
    }

    pub fn height(&self) -> usize { self.height }

    pub fn width(&self) -> usize { self.width }

    pub fn channels(&self) -> usize { self.channels }

    pub fn get(&self, y: usize, x: usize, c: usize) -> f32 {
        self.data[(y * self.width + x) * self.channels + c]
    }

    /// The channel vector at one spatial position
    pub fn pixel(&self, y: usize, x: usize) -> &[f32] {
        let start = (y * self.width + x) * self.channels;
        &self.data[start..start + self.channels]
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

// ─── GradientWeights ──────────────────────────────────────────────────────────
/// Per-channel importance `w_c`, one scalar per activation channel.
#[derive(Debug, Clone, PartialEq)]
pub struct GradientWeights(Vec<f32>);

impl GradientWeights {
    pub fn new(weights: Vec<f32>) -> Self {
        Self(weights)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    /// True when no channel contributes positively
    pub fn all_non_positive(&self) -> bool {
        self.0.iter().all(|&w| w <= 0.0)
    }
}

// ─── SaliencyMap ──────────────────────────────────────────────────────────────
/// Grad-CAM output.
///
/// `coarse` is the thresholded map at the layer's own resolution
/// (H' × W'); `values` is the same map resized for display.
/// Both are row-major and every value lies in [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct SaliencyMap {
    width:         usize,
    height:        usize,
    values:        Vec<f32>,
    coarse_width:  usize,
    coarse_height: usize,
    coarse:        Vec<f32>,
}

impl SaliencyMap {
    pub fn new(
        (width, height): (usize, usize),
        values: Vec<f32>,
        (coarse_width, coarse_height): (usize, usize),
        coarse: Vec<f32>,
    ) -> Self {
        debug_assert_eq!(values.len(), width * height);
        debug_assert_eq!(coarse.len(), coarse_width * coarse_height);
        Self { width, height, values, coarse_width, coarse_height, coarse }
    }

    pub fn width(&self) -> usize { self.width }

    pub fn height(&self) -> usize { self.height }

    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.values[y * self.width + x]
    }

    /// Display-resolution values, row-major
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Thresholded values at activation resolution, row-major
    pub fn coarse(&self) -> &[f32] {
        &self.coarse
    }

    pub fn coarse_dimensions(&self) -> (usize, usize) {
        (self.coarse_width, self.coarse_height)
    }

    pub fn is_all_zero(&self) -> bool {
        self.values.iter().all(|&v| v == 0.0)
    }

    pub fn max(&self) -> f32 {
        self.values.iter().copied().fold(0.0, f32::max)
    }
}
