// ============================================================
// Layer 5 — Burn Classifier
// ============================================================
// ClassifierPort implementation on top of PneumoniaCnn.
//
// Two passes are offered:
//   forward  — inner (non-autodiff) backend, softmax over logits
//   gradient — autodiff backend:
//       A     = forward_to(x, layer).detach().require_grad()
//       p     = softmax(forward_from(A, layer))
//       dp/dA = p[target].backward()
//     Detaching makes A a leaf, so the gradient lands on it and
//     nothing before the target layer is tracked.
//
// Burn tensors are NCHW; the domain expects HWC, so both maps
// are transposed on the way out.
//
// Reference: Burn Book §4 (Autodiff)

use burn::{
    module::AutodiffModule,
    prelude::*,
    tensor::{activation::softmax, backend::AutodiffBackend, TensorData},
};

use crate::domain::error::{DetectionError, Result};
use crate::domain::prediction::{ClassProbabilities, NUM_CLASSES};
use crate::domain::tensor::{ActivationMap, FeatureMap, InputTensor};
use crate::domain::traits::ClassifierPort;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::model::PneumoniaCnn;

pub struct BurnClassifier<B: AutodiffBackend> {
    /// Autodiff copy, used only for the gradient pass
    model:           PneumoniaCnn<B>,
    inference_model: PneumoniaCnn<B::InnerBackend>,
    device:          B::Device,
}

impl<B: AutodiffBackend> BurnClassifier<B> {
    pub fn new(model: PneumoniaCnn<B>, device: B::Device) -> Self {
        let inference_model = model.valid();
        Self { model, inference_model, device }
    }

    /// Rebuild the architecture from `model_config.json`, then load weights.
    pub fn from_checkpoint(ckpt_manager: &CheckpointManager, device: B::Device) -> Result<Self> {
        let cfg = ckpt_manager.load_config()?;
        cfg.validate(NUM_CLASSES)
            .map_err(|reason| DetectionError::model_load(ckpt_manager.dir_display(), reason))?;

        let model: PneumoniaCnn<B> = cfg.init(&device);
        let model = ckpt_manager.load_model(model, &device)?;
        tracing::info!(
            "Model loaded from checkpoint ({} conv blocks, base {} channels)",
            cfg.num_blocks,
            cfg.base_channels
        );
        Ok(Self::new(model, device))
    }
}

/// [1, H, W, 1] host tensor → [1, 1, H, W] device tensor
fn to_device<BB: Backend>(input: &InputTensor, device: &BB::Device) -> Tensor<BB, 4> {
    let data = TensorData::new(input.as_slice().to_vec(), [1, 1, input.height(), input.width()]);
    Tensor::from_data(data, device)
}

fn to_host<BB: Backend, const D: usize>(tensor: Tensor<BB, D>) -> Result<Vec<f32>> {
    tensor
        .into_data()
        .to_vec::<f32>()
        .map_err(|e| DetectionError::inference(format!("tensor readback failed: {e:?}")))
}

/// [1, C, H, W] device tensor → HWC FeatureMap
fn to_feature_map<BB: Backend>(tensor: Tensor<BB, 4>) -> Result<FeatureMap> {
    let [_, c, h, w] = tensor.dims();
    let chw = to_host(tensor)?;
    FeatureMap::from_chw(c, h, w, &chw)
}

impl<B: AutodiffBackend> ClassifierPort for BurnClassifier<B> {
    fn forward(&self, input: &InputTensor) -> Result<ClassProbabilities> {
        let x      = to_device::<B::InnerBackend>(input, &self.device);
        let logits = self.inference_model.forward(x);
        let probs  = to_host(softmax(logits, 1))?;

        let probs: [f32; NUM_CLASSES] = probs.as_slice().try_into().map_err(|_| {
            DetectionError::inference(format!(
                "model produced {} outputs, expected {NUM_CLASSES}",
                probs.len()
            ))
        })?;
        tracing::debug!("Class probabilities: {:?}", probs);
        Ok(ClassProbabilities(probs))
    }

    fn forward_with_activation_and_gradient(
        &self,
        input:        &InputTensor,
        layer_id:     &str,
        target_class: usize,
    ) -> Result<(ActivationMap, FeatureMap)> {
        let layer = self
            .model
            .layer_index(layer_id)
            .ok_or_else(|| DetectionError::layer_not_found(layer_id, &self.model.layer_names()))?;
        if target_class >= NUM_CLASSES {
            return Err(DetectionError::inference(format!(
                "target class {target_class} out of range (0..{NUM_CLASSES})"
            )));
        }

        // ── Step 1: activation at the target layer, as a fresh leaf ──────────
        let x          = to_device::<B>(input, &self.device);
        let activation = self.model.forward_to(x, layer).detach().require_grad();

        // ── Step 2: finish the forward pass from that activation ──────────────
        let logits = self.model.forward_from(activation.clone(), layer);
        let score  = softmax(logits, 1)
            .slice([0..1, target_class..target_class + 1])
            .sum();

        // ── Step 3: backpropagate the class score ─────────────────────────────
        let grads    = score.backward();
        let gradient = activation.grad(&grads).ok_or_else(|| {
            DetectionError::inference(format!("no gradient reached layer '{layer_id}'"))
        })?;

        let activation = to_feature_map(activation.inner())?;
        let gradient   = to_feature_map(gradient)?;
        tracing::debug!(
            "Grad-CAM pass on '{}' for class {}: shape {:?}",
            layer_id,
            target_class,
            activation.shape()
        );
        Ok((activation, gradient))
    }

    fn layer_names(&self) -> Vec<String> {
        self.model.layer_names()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::model::PneumoniaCnnConfig;
    use crate::ml::CpuBackend;

    fn tiny_classifier() -> BurnClassifier<CpuBackend> {
        let device = Default::default();
        let model = PneumoniaCnnConfig::new()
            .with_base_channels(2)
            .with_num_blocks(3)
            .with_dense_units(4)
            .init::<CpuBackend>(&device);
        BurnClassifier::new(model, device)
    }

    fn ramp_input(size: usize) -> InputTensor {
        let data = (0..size * size).map(|i| (i % size) as f32 / size as f32).collect();
        InputTensor::new(size, size, data).unwrap()
    }

    #[test]
    fn test_forward_gives_a_distribution() {
        let probs = tiny_classifier().forward(&ramp_input(32)).unwrap();
        assert!((probs.sum() - 1.0).abs() < 1e-4);
        assert!(probs.0.iter().all(|&p| (0.0..=1.0).contains(&p)));
    }

    #[test]
    fn test_forward_is_deterministic() {
        let clf   = tiny_classifier();
        let input = ramp_input(32);
        assert_eq!(clf.forward(&input).unwrap(), clf.forward(&input).unwrap());
    }

    #[test]
    fn test_gradient_pass_shapes() {
        let clf = tiny_classifier();
        let (act, grad) = clf
            .forward_with_activation_and_gradient(&ramp_input(32), "conv3", 1)
            .unwrap();
        // two 2x2 pools: 32 → 8, conv3 has 8 channels
        assert_eq!(act.shape(), (8, 8, 8));
        assert_eq!(grad.shape(), act.shape());
        assert!(act.as_slice().iter().all(|&a| a >= 0.0)); // post-ReLU
    }

    #[test]
    fn test_class_gradients_sum_to_zero() {
        // Softmax outputs always sum to 1, so their gradients cancel out.
        let clf   = tiny_classifier();
        let input = ramp_input(32);
        let grads: Vec<FeatureMap> = (0..NUM_CLASSES)
            .map(|c| clf.forward_with_activation_and_gradient(&input, "conv2", c).unwrap().1)
            .collect();

        for i in 0..grads[0].as_slice().len() {
            let total: f32 = grads.iter().map(|g| g.as_slice()[i]).sum();
            assert!(total.abs() < 1e-5, "index {i}: {total}");
        }
    }

    #[test]
    fn test_unknown_layer() {
        let err = tiny_classifier()
            .forward_with_activation_and_gradient(&ramp_input(16), "dense", 0)
            .unwrap_err();
        match err {
            DetectionError::LayerNotFound { layer, available } => {
                assert_eq!(layer, "dense");
                assert!(available.contains("conv3"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_target_class_out_of_range() {
        let err = tiny_classifier()
            .forward_with_activation_and_gradient(&ramp_input(16), "conv1", 3)
            .unwrap_err();
        assert!(matches!(err, DetectionError::Inference(_)));
    }
}
