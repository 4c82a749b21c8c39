// ============================================================
// Layer 3 — Prediction Domain Types
// ============================================================
// The three diagnostic classes, the probability vector the
// classifier returns, and the immutable PredictionResult handed
// back to presentation layers.
//
// Class indices follow the order of the model's output head:
//   0 → bacterial
//   1 → normal
//   2 → viral
//
// Reference: Rust Book §6 (Enums and Pattern Matching)

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::image::{CanonicalImage, Overlay};

/// Number of outputs of the classifier head
pub const NUM_CLASSES: usize = 3;

/// Allowed drift of the probability sum from 1
pub const SUM_TOLERANCE: f32 = 1e-3;

// ─── Diagnosis ────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Diagnosis {
    Bacterial,
    Normal,
    Viral,
}

impl Diagnosis {
    pub const ALL: [Diagnosis; NUM_CLASSES] = [Self::Bacterial, Self::Normal, Self::Viral];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        match self {
            Self::Bacterial => 0,
            Self::Normal    => 1,
            Self::Viral     => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bacterial => "bacterial",
            Self::Normal    => "normal",
            Self::Viral     => "viral",
        }
    }
}

impl fmt::Display for Diagnosis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Diagnosis {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bacterial" => Ok(Self::Bacterial),
            "normal"    => Ok(Self::Normal),
            "viral"     => Ok(Self::Viral),
            other       => Err(format!("unknown diagnosis '{other}'")),
        }
    }
}

// ─── ClassProbabilities ───────────────────────────────────────────────────────
/// Softmax output of the classifier, one entry per Diagnosis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassProbabilities(pub [f32; NUM_CLASSES]);

impl ClassProbabilities {
    /// Index of the largest probability. Ties go to the lowest index,
    /// NaN entries never win.
    pub fn argmax(&self) -> usize {
        let mut best = 0;
        for (i, &p) in self.0.iter().enumerate().skip(1) {
            if p > self.0[best] || (self.0[best].is_nan() && !p.is_nan()) {
                best = i;
            }
        }
        best
    }

    /// Check the distribution contract: finite entries in [0, 1]
    /// summing to 1 within `SUM_TOLERANCE`.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(p) = self.0.iter().find(|p| !p.is_finite() || !(0.0..=1.0).contains(*p)) {
            return Err(format!("classifier returned invalid probability {p} in {:?}", self.0));
        }
        let sum = self.sum();
        if (sum - 1.0).abs() > SUM_TOLERANCE {
            return Err(format!("classifier probabilities sum to {sum}, expected 1"));
        }
        Ok(())
    }

    pub fn top(&self) -> (Diagnosis, f32) {
        let idx = self.argmax();
        // argmax is always < NUM_CLASSES
        (Diagnosis::ALL[idx], self.0[idx])
    }

    pub fn get(&self, diagnosis: Diagnosis) -> f32 {
        self.0[diagnosis.index()]
    }

    pub fn sum(&self) -> f32 {
        self.0.iter().sum()
    }
}

// ─── PredictionResult ─────────────────────────────────────────────────────────
/// Immutable outcome of one "classify and explain" request.
/// Fields are private; the accessors are the whole surface.
#[derive(Debug, Clone)]
pub struct PredictionResult {
    label:          Diagnosis,
    probability:    f64,
    probabilities:  ClassProbabilities,
    explained:      Diagnosis,
    heatmap:        Overlay,
    original_image: CanonicalImage,
}

impl PredictionResult {
    pub fn new(
        probabilities:  ClassProbabilities,
        explained:      Diagnosis,
        heatmap:        Overlay,
        original_image: CanonicalImage,
    ) -> Self {
        let (label, p) = probabilities.top();
        let probability = (f64::from(p) * 100.0).clamp(0.0, 100.0);
        Self { label, probability, probabilities, explained, heatmap, original_image }
    }

    /// Predicted class (argmax of the probabilities)
    pub fn label(&self) -> Diagnosis {
        self.label
    }

    /// Confidence of `label` as a percentage in [0, 100]
    pub fn probability(&self) -> f64 {
        self.probability
    }

    /// Two-decimal display form, e.g. "70.00"
    pub fn probability_display(&self) -> String {
        format!("{:.2}", self.probability)
    }

    pub fn probabilities(&self) -> &ClassProbabilities {
        &self.probabilities
    }

    /// Class the heatmap explains
    pub fn explained_class(&self) -> Diagnosis {
        self.explained
    }

    pub fn heatmap(&self) -> &Overlay {
        &self.heatmap
    }

    pub fn original_image(&self) -> &CanonicalImage {
        &self.original_image
    }
}
