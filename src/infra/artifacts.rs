// ============================================================
// Layer 6 — Artifact Writer
// ============================================================
// Persists the images of a PredictionResult as PNG files:
//
//   {out_dir}/{stem}_heatmap.png   — Grad-CAM overlay (512×512)
//   {out_dir}/{stem}_original.png  — canonical RGB radiograph
//
// The output directory is created on first write. Inputs that share
// a file stem get `_2`, `_3`, ... suffixes so no output is overwritten.

use anyhow::{Context, Result};
use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
};

use crate::domain::prediction::PredictionResult;

/// Paths written for one prediction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedArtifacts {
    pub heatmap:  PathBuf,
    pub original: PathBuf,
}

pub struct ArtifactWriter {
    out_dir: PathBuf,
}

impl ArtifactWriter {
    pub fn new(out_dir: impl AsRef<Path>) -> Self {
        Self { out_dir: out_dir.as_ref().to_path_buf() }
    }

    /// Write both images as `{stem}_heatmap.png` and `{stem}_original.png`.
    pub fn save(&self, stem: &str, result: &PredictionResult) -> Result<SavedArtifacts> {
        fs::create_dir_all(&self.out_dir)
            .with_context(|| format!("Cannot create output directory '{}'", self.out_dir.display()))?;

        let heatmap  = self.out_dir.join(format!("{stem}_heatmap.png"));
        let original = self.out_dir.join(format!("{stem}_original.png"));

        result
            .heatmap()
            .pixels()
            .save(&heatmap)
            .with_context(|| format!("Cannot write '{}'", heatmap.display()))?;
        result
            .original_image()
            .pixels()
            .save(&original)
            .with_context(|| format!("Cannot write '{}'", original.display()))?;

        tracing::debug!("Wrote '{}' and '{}'", heatmap.display(), original.display());
        Ok(SavedArtifacts { heatmap, original })
    }
}

/// One output stem per source, in order, with no two alike.
pub fn unique_stems(sources: &[PathBuf]) -> Vec<String> {
    let mut used = HashSet::new();
    sources
        .iter()
        .map(|path| {
            let base = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "image".to_string());

            let mut stem = base.clone();
            let mut n = 2;
            while !used.insert(stem.clone()) {
                stem = format!("{base}_{n}");
                n += 1;
            }
            stem
        })
        .collect()
}
