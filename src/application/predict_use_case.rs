// ============================================================
// Layer 2 — Predict Use Case (Detection Facade)
// ============================================================
// Runs one radiograph through the whole pipeline:
//
//   Step 1: Ingest the file              (Layer 4 - data)
//   Step 2: Preprocess to (1,512,512,1)  (Layer 4 - data)
//   Step 3: Forward pass → probabilities (Layer 5 - ml)
//   Step 4: Gradient pass at the layer   (Layer 5 - ml)
//   Step 5: Grad-CAM saliency            (Layer 5b - explain)
//   Step 6: Heatmap overlay              (Layer 5b - explain)
//
// The classifier is loaded once and shared. A single mutex is
// held for the whole request, so the detector can sit behind an
// Arc and be called from any thread; calls simply queue.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::data::{
    loader::ImageIngestor,
    preprocessor::{PreprocessConfig, Preprocessor},
};
use crate::domain::error::{DetectionError, Result};
use crate::domain::prediction::{Diagnosis, PredictionResult};
use crate::domain::traits::{ClassifierPort, Diagnoser};
use crate::explain::{
    overlay::{OverlayComposer, OverlayConfig},
    saliency::{SaliencyConfig, SaliencyMapGenerator},
};
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::{inferencer::BurnClassifier, CpuBackend, GpuBackend};

// ─── Detector Configuration ───────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComputeBackend {
    #[default]
    Cpu,
    Gpu,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    pub checkpoint_dir: String,
    /// Grad-CAM target layer; `None` picks the model's last conv layer
    pub layer_name:     Option<String>,
    pub backend:        ComputeBackend,
    pub preprocess:     PreprocessConfig,
    pub saliency:       SaliencyConfig,
    pub overlay:        OverlayConfig,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            checkpoint_dir: "models".to_string(),
            layer_name:     None,
            backend:        ComputeBackend::Cpu,
            preprocess:     PreprocessConfig::default(),
            saliency:       SaliencyConfig::default(),
            overlay:        OverlayConfig::default(),
        }
    }
}

/// Classifier whose backend was chosen at runtime
pub type DynClassifier = Box<dyn ClassifierPort>;

/// Load the Burn classifier stored in `config.checkpoint_dir`.
pub fn load_classifier(config: &DetectorConfig) -> Result<DynClassifier> {
    let ckpt = CheckpointManager::new(&config.checkpoint_dir);
    tracing::info!(
        "Loading classifier from '{}' on {:?}",
        config.checkpoint_dir,
        config.backend
    );
    Ok(match config.backend {
        ComputeBackend::Cpu => {
            Box::new(BurnClassifier::<CpuBackend>::from_checkpoint(&ckpt, Default::default())?)
        }
        ComputeBackend::Gpu => {
            Box::new(BurnClassifier::<GpuBackend>::from_checkpoint(&ckpt, Default::default())?)
        }
    })
}

// ─── PneumoniaDetector ────────────────────────────────────────────────────────
pub struct PneumoniaDetector<C: ClassifierPort> {
    classifier:   Mutex<C>,
    ingestor:     ImageIngestor,
    preprocessor: Preprocessor,
    saliency:     SaliencyMapGenerator,
    composer:     OverlayComposer,
    layer:        String,
}

impl PneumoniaDetector<DynClassifier> {
    /// Build the detector around the checkpointed Burn model.
    pub fn load(config: DetectorConfig) -> Result<Self> {
        let classifier = load_classifier(&config)?;
        Self::new(classifier, config)
    }
}

impl<C: ClassifierPort> PneumoniaDetector<C> {
    /// Wrap any classifier. Fails only if no target layer can be chosen.
    pub fn new(classifier: C, config: DetectorConfig) -> Result<Self> {
        let layer = match config.layer_name {
            Some(layer) => layer,
            None => classifier.layer_names().pop().ok_or_else(|| {
                DetectionError::model_load(&config.checkpoint_dir, "model exposes no conv layers")
            })?,
        };
        tracing::info!("Grad-CAM target layer: '{}'", layer);

        Ok(Self {
            classifier:   Mutex::new(classifier),
            ingestor:     ImageIngestor::new(),
            preprocessor: Preprocessor::new(config.preprocess),
            saliency:     SaliencyMapGenerator::new(config.saliency),
            composer:     OverlayComposer::new(config.overlay),
            layer,
        })
    }

    /// The layer the saliency maps are computed at
    pub fn layer(&self) -> &str {
        &self.layer
    }

    pub fn layer_names(&self) -> Vec<String> {
        self.classifier.lock().layer_names()
    }

    /// Classify `path` and explain `target` (the predicted class when `None`).
    pub fn predict_for_class(&self, path: &Path, target: Option<Diagnosis>) -> Result<PredictionResult> {
        let classifier = self.classifier.lock();

        // ── Step 1 + 2: ingest and preprocess ─────────────────────────────────
        let canonical = self.ingestor.ingest_path(path)?;
        let input     = self.preprocessor.process(canonical.pixels())?;

        // ── Step 3: classify ──────────────────────────────────────────────────
        let probabilities = classifier.forward(&input)?;
        probabilities.validate().map_err(DetectionError::inference)?;
        let (label, p)    = probabilities.top();
        let explained     = target.unwrap_or(label);

        // ── Step 4 + 5: gradient pass and Grad-CAM ────────────────────────────
        let (activation, gradient) = classifier.forward_with_activation_and_gradient(
            &input,
            &self.layer,
            explained.index(),
        )?;
        let saliency = self.saliency.generate(&activation, &gradient)?;
        if saliency.is_all_zero() {
            tracing::warn!("No positive evidence for '{}' in '{}'", explained, path.display());
        }

        // ── Step 6: overlay ───────────────────────────────────────────────────
        let heatmap = self.composer.compose(&saliency, &canonical)?;

        tracing::info!(
            "'{}': {} ({:.2}%), heatmap explains '{}'",
            path.display(),
            label,
            f64::from(p) * 100.0,
            explained
        );
        Ok(PredictionResult::new(probabilities, explained, heatmap, canonical))
    }
}

impl<C: ClassifierPort> Diagnoser for PneumoniaDetector<C> {
    fn predict(&self, path: &Path) -> Result<PredictionResult> {
        self.predict_for_class(path, None)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::prediction::ClassProbabilities;
    use crate::domain::tensor::{ActivationMap, FeatureMap, InputTensor};
    use image::{Rgb, RgbImage};
    use std::path::PathBuf;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    /// Fixed outputs, records the last requested class.
    struct StubClassifier {
        probs:      [f32; 3],
        gradient:   f32,
        last_class: AtomicUsize,
    }

    impl StubClassifier {
        fn new(probs: [f32; 3], gradient: f32) -> Self {
            Self { probs, gradient, last_class: AtomicUsize::new(usize::MAX) }
        }
    }

    impl ClassifierPort for StubClassifier {
        fn forward(&self, input: &InputTensor) -> Result<ClassProbabilities> {
            assert_eq!(input.shape(), [1, 512, 512, 1]);
            Ok(ClassProbabilities(self.probs))
        }

        fn forward_with_activation_and_gradient(
            &self,
            _input:       &InputTensor,
            layer_id:     &str,
            target_class: usize,
        ) -> Result<(ActivationMap, FeatureMap)> {
            if !self.layer_names().iter().any(|l| l == layer_id) {
                return Err(DetectionError::layer_not_found(layer_id, &self.layer_names()));
            }
            self.last_class.store(target_class, Ordering::SeqCst);
            Ok((
                FeatureMap::filled(16, 16, 8, 1.0),
                FeatureMap::filled(16, 16, 8, self.gradient),
            ))
        }

        fn layer_names(&self) -> Vec<String> {
            vec!["conv1".to_string(), "conv2".to_string()]
        }
    }

    fn gray_png(dir: &Path, value: u8) -> PathBuf {
        let path = dir.join("gray.png");
        RgbImage::from_pixel(512, 512, Rgb([value; 3])).save(&path).unwrap();
        path
    }

    fn detector(stub: StubClassifier) -> PneumoniaDetector<StubClassifier> {
        PneumoniaDetector::new(stub, DetectorConfig::default()).unwrap()
    }

    #[test]
    fn test_end_to_end_with_stub() {
        let dir  = tempfile::tempdir().unwrap();
        let path = gray_png(dir.path(), 128);
        let det  = detector(StubClassifier::new([0.1, 0.7, 0.2], 1.0));

        let result = det.predict(&path).unwrap();
        assert_eq!(result.label(), Diagnosis::Normal);
        assert_eq!(result.label().as_str(), "normal");
        assert_eq!(result.probability_display(), "70.00");
        assert_eq!(result.explained_class(), Diagnosis::Normal);
        assert_eq!(result.heatmap().dimensions(), (512, 512));
        assert_eq!(result.original_image().dimensions(), (512, 512));

        // full saliency everywhere → red end of the colormap dominates
        let px = result.heatmap().pixels().get_pixel(256, 256).0;
        assert!(px[0] > px[2], "{px:?}");

        let again = det.predict(&path).unwrap();
        assert_eq!(result.heatmap(), again.heatmap());
    }

    #[test]
    fn test_default_layer_is_last() {
        let det = detector(StubClassifier::new([0.1, 0.7, 0.2], 1.0));
        assert_eq!(det.layer(), "conv2");
    }

    #[test]
    fn test_zero_gradient_still_gives_overlay() {
        let dir  = tempfile::tempdir().unwrap();
        let path = gray_png(dir.path(), 128);
        let det  = detector(StubClassifier::new([0.1, 0.7, 0.2], 0.0));

        let result = det.predict(&path).unwrap();
        // 0.6·128 + 0.4·(0, 0, 128)
        assert!(result.heatmap().pixels().pixels().all(|p| p.0 == [77, 77, 128]));
    }

    #[test]
    fn test_explicit_target_class() {
        let dir  = tempfile::tempdir().unwrap();
        let path = gray_png(dir.path(), 90);
        let det  = detector(StubClassifier::new([0.1, 0.7, 0.2], 1.0));

        let result = det.predict_for_class(&path, Some(Diagnosis::Viral)).unwrap();
        assert_eq!(result.label(), Diagnosis::Normal);
        assert_eq!(result.explained_class(), Diagnosis::Viral);
        assert_eq!(det.classifier.lock().last_class.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_invalid_probabilities_are_inference_errors() {
        let dir  = tempfile::tempdir().unwrap();
        let path = gray_png(dir.path(), 128);
        for probs in [[f32::NAN; 3], [0.6, 0.6, 0.6], [f32::INFINITY, 0.0, 0.0]] {
            let det = detector(StubClassifier::new(probs, 1.0));
            let err = det.predict(&path).unwrap_err();
            assert!(matches!(err, DetectionError::Inference(_)), "{probs:?}: {err}");
        }
    }

    #[test]
    fn test_unknown_layer_propagates() {
        let dir    = tempfile::tempdir().unwrap();
        let path   = gray_png(dir.path(), 128);
        let config = DetectorConfig { layer_name: Some("conv10".into()), ..Default::default() };
        let det    = PneumoniaDetector::new(StubClassifier::new([0.1, 0.7, 0.2], 1.0), config).unwrap();

        let err = det.predict(&path).unwrap_err();
        assert!(matches!(err, DetectionError::LayerNotFound { .. }));
    }

    #[test]
    fn test_missing_file_is_ingest_error() {
        let det = detector(StubClassifier::new([0.1, 0.7, 0.2], 1.0));
        let err = det.predict(Path::new("/definitely/not/here.png")).unwrap_err();
        assert!(matches!(err, DetectionError::Ingest { .. }));
    }

    #[test]
    fn test_shared_across_threads() {
        let dir  = tempfile::tempdir().unwrap();
        let path = gray_png(dir.path(), 128);
        let det  = Arc::new(detector(StubClassifier::new([0.1, 0.7, 0.2], 1.0)));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let det  = Arc::clone(&det);
                let path = path.clone();
                std::thread::spawn(move || det.predict(&path).unwrap())
            })
            .collect();

        let results: Vec<PredictionResult> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for r in &results {
            assert_eq!(r.label(), Diagnosis::Normal);
            assert_eq!(r.heatmap(), results[0].heatmap());
        }
    }

    #[test]
    fn test_load_from_missing_checkpoint() {
        let dir    = tempfile::tempdir().unwrap();
        let config = DetectorConfig {
            checkpoint_dir: dir.path().join("missing").display().to_string(),
            ..Default::default()
        };
        assert!(matches!(
            PneumoniaDetector::<DynClassifier>::load(config),
            Err(DetectionError::ModelLoad { .. })
        ));
    }
}
