// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Parses command line arguments with clap and delegates all
// work to Layer 2 (application).
//
//   1. `predict` — classify radiographs, write heatmap overlays
//   2. `layers`  — list the Grad-CAM target layers of a model
//   3. `init`    — write an untrained checkpoint to start from
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::{Context, Result};
use clap::Parser;
use commands::{Commands, InitArgs, LayersArgs, PredictArgs};

use crate::application::predict_use_case::{
    load_classifier, DetectorConfig, DynClassifier, PneumoniaDetector,
};
use crate::infra::artifacts::{unique_stems, ArtifactWriter};
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::model::PneumoniaCnnConfig;

#[derive(Parser, Debug)]
#[command(
    name = "pneumo-scan",
    version = "0.1.0",
    about = "Classify chest X-rays as bacterial / normal / viral and explain with Grad-CAM."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Route to the matching handler; nothing is computed here.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Predict(args) => run_predict(args),
            Commands::Layers(args)  => run_layers(args),
            Commands::Init(args)    => run_init(args),
        }
    }
}

/// Loads the model once, then predicts every image in turn.
/// A failing image (prediction or write) is reported and skipped;
/// the command fails at the end if any image did.
fn run_predict(args: PredictArgs) -> Result<()> {
    let config   = DetectorConfig::from(&args);
    let detector = PneumoniaDetector::<DynClassifier>::load(config)
        .with_context(|| format!("Cannot load model from '{}'", args.checkpoint_dir))?;
    let writer   = ArtifactWriter::new(&args.out_dir);

    let stems = unique_stems(&args.images);

    let mut failed = 0usize;
    for (path, stem) in args.images.iter().zip(&stems) {
        let result = match detector.predict_for_class(path, args.target_class) {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!("Skipping '{}': {}", path.display(), e);
                eprintln!("{}: error: {e}", path.display());
                failed += 1;
                continue;
            }
        };

        let saved = match writer.save(stem, &result) {
            Ok(saved) => saved,
            Err(e) => {
                tracing::warn!("Cannot save results for '{}': {:#}", path.display(), e);
                eprintln!("{}: error: {e:#}", path.display());
                failed += 1;
                continue;
            }
        };
        println!(
            "{}: {} ({}%)",
            path.display(),
            result.label(),
            result.probability_display()
        );
        println!("  heatmap:  {}", saved.heatmap.display());
        println!("  original: {}", saved.original.display());
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} image(s) failed", args.images.len());
    }
    Ok(())
}

fn run_layers(args: LayersArgs) -> Result<()> {
    let classifier = load_classifier(&DetectorConfig::from(&args))
        .with_context(|| format!("Cannot load model from '{}'", args.checkpoint_dir))?;

    let names = classifier.layer_names();
    let last  = names.len().saturating_sub(1);
    for (i, name) in names.iter().enumerate() {
        if i == last {
            println!("{name} (default)");
        } else {
            println!("{name}");
        }
    }
    Ok(())
}

/// Writes a freshly initialised model so `predict` and `layers`
/// have a checkpoint to load. The weights are random.
fn run_init(args: InitArgs) -> Result<()> {
    let cfg = PneumoniaCnnConfig::from(&args);
    let ckpt = CheckpointManager::new(&args.checkpoint_dir);
    ckpt.init_checkpoint(&cfg, args.force)
        .with_context(|| format!("Cannot initialise checkpoint in '{}'", args.checkpoint_dir))?;

    println!(
        "Wrote untrained model ({} conv blocks, base {} channels) to {}",
        cfg.num_blocks, cfg.base_channels, args.checkpoint_dir
    );
    Ok(())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::path::{Path, PathBuf};

    fn tiny_checkpoint(dir: &Path) -> String {
        let ckpt_dir = dir.join("models");
        let cfg = PneumoniaCnnConfig::new()
            .with_base_channels(2)
            .with_num_blocks(2)
            .with_dense_units(4);
        CheckpointManager::new(&ckpt_dir).init_checkpoint(&cfg, false).unwrap();
        ckpt_dir.display().to_string()
    }

    fn write_png(path: &Path) -> PathBuf {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        RgbImage::from_fn(64, 64, |x, y| Rgb([(x * 4) as u8, (y * 4) as u8, 128]))
            .save(path)
            .unwrap();
        path.to_path_buf()
    }

    fn predict_args(images: Vec<PathBuf>, checkpoint_dir: String, out_dir: &Path) -> PredictArgs {
        let cli = Cli::try_parse_from(["pneumo-scan", "predict", "--image", "placeholder.png"]).unwrap();
        let Commands::Predict(mut args) = cli.command else { panic!("expected predict") };
        args.images         = images;
        args.checkpoint_dir = checkpoint_dir;
        args.out_dir        = out_dir.display().to_string();
        args
    }

    #[test]
    fn test_same_stem_inputs_write_separate_outputs() {
        let dir    = tempfile::tempdir().unwrap();
        let ckpt   = tiny_checkpoint(dir.path());
        let images = vec![write_png(&dir.path().join("a/x.png")), write_png(&dir.path().join("b/x.png"))];
        let out    = dir.path().join("out");

        run_predict(predict_args(images, ckpt, &out)).unwrap();

        for stem in ["x", "x_2"] {
            assert!(out.join(format!("{stem}_heatmap.png")).exists(), "{stem}");
            assert!(out.join(format!("{stem}_original.png")).exists(), "{stem}");
        }
    }

    #[test]
    fn test_write_failures_are_counted_not_fatal() {
        let dir     = tempfile::tempdir().unwrap();
        let ckpt    = tiny_checkpoint(dir.path());
        let images  = vec![write_png(&dir.path().join("a.png")), write_png(&dir.path().join("b.png"))];
        let blocker = dir.path().join("out");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let err = run_predict(predict_args(images, ckpt, &blocker)).unwrap_err();
        assert_eq!(err.to_string(), "2 of 2 image(s) failed");
    }

    #[test]
    fn test_init_then_layers() {
        let dir  = tempfile::tempdir().unwrap();
        let ckpt = dir.path().join("models").display().to_string();

        let cli = Cli::try_parse_from([
            "pneumo-scan", "init", "--checkpoint-dir", &ckpt, "--base-channels", "2", "--num-blocks", "2",
        ])
        .unwrap();
        cli.run().unwrap();

        let layers = Cli::try_parse_from(["pneumo-scan", "layers", "--checkpoint-dir", &ckpt]).unwrap();
        layers.run().unwrap();
    }
}
