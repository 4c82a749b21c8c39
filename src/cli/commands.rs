// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the subcommands, `predict`, `layers` and `init`, and
// all their configurable flags.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::application::predict_use_case::{ComputeBackend, DetectorConfig};
use crate::domain::prediction::Diagnosis;
use crate::explain::saliency::SaliencyConfig;
use crate::ml::model::PneumoniaCnnConfig;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Classify radiographs and write Grad-CAM overlays
    Predict(PredictArgs),

    /// List the layers a heatmap can be computed at
    Layers(LayersArgs),

    /// Write an untrained model checkpoint
    Init(InitArgs),
}

/// Where the model runs
#[derive(ValueEnum, Debug, Clone, Copy, Default)]
pub enum BackendKind {
    /// ndarray on the CPU
    #[default]
    Cpu,
    /// wgpu (Vulkan / Metal / DX12)
    Gpu,
}

impl From<BackendKind> for ComputeBackend {
    fn from(b: BackendKind) -> Self {
        match b {
            BackendKind::Cpu => ComputeBackend::Cpu,
            BackendKind::Gpu => ComputeBackend::Gpu,
        }
    }
}

#[derive(Args, Debug)]
pub struct PredictArgs {
    /// Radiograph files (.dcm, .png, .jpg, .jpeg)
    #[arg(long = "image", required = true, num_args = 1..)]
    pub images: Vec<PathBuf>,

    /// Directory holding model_config.json and the weights
    #[arg(long, default_value = "models")]
    pub checkpoint_dir: String,

    /// Grad-CAM target layer (defaults to the last conv layer)
    #[arg(long)]
    pub layer: Option<String>,

    /// Normalised saliency below this value is dropped
    #[arg(long, default_value_t = 0.10)]
    pub threshold: f32,

    /// Explain this class instead of the predicted one
    /// (bacterial, normal or viral)
    #[arg(long)]
    pub target_class: Option<Diagnosis>,

    #[arg(long, value_enum, default_value_t = BackendKind::Cpu)]
    pub backend: BackendKind,

    /// Where the _heatmap.png and _original.png files go
    #[arg(long, default_value = "output")]
    pub out_dir: String,
}

/// The application layer never sees clap types.
impl From<&PredictArgs> for DetectorConfig {
    fn from(a: &PredictArgs) -> Self {
        DetectorConfig {
            checkpoint_dir: a.checkpoint_dir.clone(),
            layer_name:     a.layer.clone(),
            backend:        a.backend.into(),
            saliency:       SaliencyConfig { threshold: a.threshold, ..Default::default() },
            ..Default::default()
        }
    }
}

#[derive(Args, Debug)]
pub struct LayersArgs {
    #[arg(long, default_value = "models")]
    pub checkpoint_dir: String,

    #[arg(long, value_enum, default_value_t = BackendKind::Cpu)]
    pub backend: BackendKind,
}

impl From<&LayersArgs> for DetectorConfig {
    fn from(a: &LayersArgs) -> Self {
        DetectorConfig {
            checkpoint_dir: a.checkpoint_dir.clone(),
            backend:        a.backend.into(),
            ..Default::default()
        }
    }
}

#[derive(Args, Debug)]
pub struct InitArgs {
    #[arg(long, default_value = "models")]
    pub checkpoint_dir: String,

    /// Output channels of the first conv block (doubled per block)
    #[arg(long, default_value_t = 16)]
    pub base_channels: usize,

    #[arg(long, default_value_t = 5)]
    pub num_blocks: usize,

    #[arg(long, default_value_t = 64)]
    pub dense_units: usize,

    /// Replace an existing checkpoint
    #[arg(long)]
    pub force: bool,
}

impl From<&InitArgs> for PneumoniaCnnConfig {
    fn from(a: &InitArgs) -> Self {
        PneumoniaCnnConfig::new()
            .with_base_channels(a.base_channels)
            .with_num_blocks(a.num_blocks)
            .with_dense_units(a.dense_units)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    #[test]
    fn test_predict_defaults() {
        let cli = Cli::try_parse_from(["pneumo-scan", "predict", "--image", "a.png"]).unwrap();
        let Commands::Predict(args) = cli.command else { panic!("expected predict") };

        let cfg = DetectorConfig::from(&args);
        assert_eq!(args.images, vec![PathBuf::from("a.png")]);
        assert_eq!(cfg.checkpoint_dir, "models");
        assert_eq!(cfg.layer_name, None);
        assert_eq!(cfg.backend, ComputeBackend::Cpu);
        assert_eq!(cfg.saliency.threshold, 0.10);
        assert_eq!(args.out_dir, "output");
    }

    #[test]
    fn test_predict_overrides() {
        let cli = Cli::try_parse_from([
            "pneumo-scan", "predict",
            "--image", "a.dcm", "b.jpg",
            "--layer", "conv3",
            "--threshold", "0.25",
            "--target-class", "viral",
            "--backend", "gpu",
        ])
        .unwrap();
        let Commands::Predict(args) = cli.command else { panic!("expected predict") };

        let cfg = DetectorConfig::from(&args);
        assert_eq!(args.images.len(), 2);
        assert_eq!(args.target_class, Some(Diagnosis::Viral));
        assert_eq!(cfg.layer_name.as_deref(), Some("conv3"));
        assert_eq!(cfg.saliency.threshold, 0.25);
        assert_eq!(cfg.backend, ComputeBackend::Gpu);
    }

    #[test]
    fn test_predict_requires_an_image() {
        assert!(Cli::try_parse_from(["pneumo-scan", "predict"]).is_err());
        assert!(Cli::try_parse_from(["pneumo-scan", "predict", "--image", "x.png", "--target-class", "flu"]).is_err());
    }

    #[test]
    fn test_init_defaults_match_model_config() {
        let cli = Cli::try_parse_from(["pneumo-scan", "init"]).unwrap();
        let Commands::Init(args) = cli.command else { panic!("expected init") };

        let cfg     = PneumoniaCnnConfig::from(&args);
        let default = PneumoniaCnnConfig::new();
        assert_eq!(args.checkpoint_dir, "models");
        assert!(!args.force);
        assert_eq!(cfg.base_channels, default.base_channels);
        assert_eq!(cfg.num_blocks, default.num_blocks);
        assert_eq!(cfg.dense_units, default.dense_units);
        assert_eq!(cfg.num_classes, default.num_classes);
    }
}
