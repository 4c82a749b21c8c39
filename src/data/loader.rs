// ============================================================
// Layer 4 — Image Ingestor
// ============================================================
// Decodes a radiograph file into a CanonicalImage.
//
// Two decoding paths:
//
//   DICOM (.dcm)   dicom-object reads the file, dicom-pixeldata
//                  decodes the first frame into f32 samples.
//                  Stored values are used as-is: no rescale
//                  slope/intercept, no VOI window.
//                  Samples are then "windowed" to 8 bits:
//                    1. clamp negatives to 0
//                    2. divide by the array maximum, scale to 255
//                    3. truncate to u8
//                  A maximum of 0 skips step 2 and yields an
//                  all-black image instead of dividing by zero.
//
//   Raster (.png,  the image crate decodes the file; grayscale
//   .jpg, .jpeg)   sources stay single-channel, everything
//                  else is converted to RGB.
//
// Single-channel results are expanded to RGB (R = G = B) for
// display; the preprocessor reduces them back to luma.
//
// Reference: DICOM PS3.5 (Data Structures and Encoding)
//            dicom-rs and image crate documentation

use std::{fs, path::Path};

use dicom_object::open_file;
use dicom_pixeldata::{ConvertOptions, ModalityLutOption, PixelDecoder};
use image::RgbImage;

use crate::domain::error::{DetectionError, Result};
use crate::domain::image::{CanonicalImage, FileKind, RawImage};

/// Reads DICOM and raster radiographs from disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageIngestor;

impl ImageIngestor {
    pub fn new() -> Self {
        Self
    }

    /// Ingest a file whose kind is inferred from its extension.
    pub fn ingest_path(&self, path: &Path) -> Result<CanonicalImage> {
        let kind = FileKind::from_path(path)?;
        self.ingest(path, kind)
    }

    /// Decode `path` as `kind` and window it into a CanonicalImage.
    pub fn ingest(&self, path: &Path, kind: FileKind) -> Result<CanonicalImage> {
        let raw       = self.decode(path, kind)?;
        let canonical = to_canonical(&raw)
            .map_err(|reason| DetectionError::ingest(path.display().to_string(), reason))?;

        tracing::debug!(
            "Ingested '{}' as {:?}: {}x{}, {} channel(s), {} bit",
            path.display(),
            kind,
            raw.width,
            raw.height,
            raw.channels,
            raw.bit_depth,
        );
        Ok(canonical)
    }

    /// Decode the file into raw samples without any windowing.
    pub fn decode(&self, path: &Path, kind: FileKind) -> Result<RawImage> {
        let display = path.display().to_string();

        // Missing and zero-byte files are reported before any decoder runs
        let meta = fs::metadata(path).map_err(|e| DetectionError::ingest(&display, e))?;
        if meta.len() == 0 {
            return Err(DetectionError::ingest(&display, "file is empty"));
        }

        let raw = match kind {
            FileKind::Dicom  => decode_dicom(path),
            FileKind::Raster => decode_raster(path),
        }
        .map_err(|reason| DetectionError::ingest(&display, reason))?;

        if raw.is_empty() {
            return Err(DetectionError::ingest(&display, "image has no pixels"));
        }
        Ok(raw)
    }
}

/// Decode the first frame of a DICOM file.
fn decode_dicom(path: &Path) -> std::result::Result<RawImage, String> {
    let obj   = open_file(path).map_err(|e| format!("DICOM parse error: {e}"))?;
    let pixel = obj
        .decode_pixel_data()
        .map_err(|e| format!("DICOM pixel data error: {e}"))?;

    let width    = pixel.columns();
    let height   = pixel.rows();
    let channels = pixel.samples_per_pixel();
    let options = ConvertOptions::new().with_modality_lut(ModalityLutOption::None);
    let samples: Vec<f32> = pixel
        .to_vec_frame_with_options(0, &options)
        .map_err(|e| format!("DICOM pixel conversion error: {e}"))?;

    let expected = width as usize * height as usize * channels as usize;
    if samples.len() != expected {
        return Err(format!(
            "DICOM frame holds {} samples, expected {expected}",
            samples.len()
        ));
    }

    Ok(RawImage {
        width,
        height,
        channels:  u8::try_from(channels).map_err(|_| format!("{channels} samples per pixel"))?,
        bit_depth: pixel.bits_allocated(),
        kind:      FileKind::Dicom,
        samples,
    })
}

/// Decode a PNG/JPEG file.
fn decode_raster(path: &Path) -> std::result::Result<RawImage, String> {
    let img = image::open(path).map_err(|e| format!("image decode error: {e}"))?;
    let (width, height) = (img.width(), img.height());

    // Luma and luma+alpha stay single-channel; everything else becomes RGB
    let (channels, bytes) = match img.color().channel_count() {
        1 | 2 => (1u8, img.to_luma8().into_raw()),
        _     => (3u8, img.to_rgb8().into_raw()),
    };

    Ok(RawImage {
        width,
        height,
        channels,
        bit_depth: 8,
        kind:      FileKind::Raster,
        samples:   bytes.into_iter().map(f32::from).collect(),
    })
}

/// Linearly rescale samples to 0–255 by the array maximum.
///
/// Negatives are clamped to 0. When the maximum is not positive the
/// result is all zeros.
pub fn window_to_u8(samples: &[f32]) -> Vec<u8> {
    let max = samples.iter().copied().fold(0.0f32, f32::max);
    if max <= 0.0 {
        return vec![0; samples.len()];
    }
    samples
        .iter()
        // `as u8` truncates toward zero and saturates
        .map(|&v| (v.max(0.0) / max * 255.0) as u8)
        .collect()
}

/// Convert raw samples to an RGB 8-bit image.
pub fn to_canonical(raw: &RawImage) -> std::result::Result<CanonicalImage, String> {
    let bytes: Vec<u8> = match raw.kind {
        FileKind::Dicom  => window_to_u8(&raw.samples),
        FileKind::Raster => raw.samples.iter().map(|&v| v.clamp(0.0, 255.0) as u8).collect(),
    };

    let rgb = match raw.channels {
        1 => bytes.iter().flat_map(|&v| [v, v, v]).collect(),
        3 => bytes,
        n => return Err(format!("unsupported channel count {n}")),
    };

    let pixels = RgbImage::from_raw(raw.width, raw.height, rgb)
        .ok_or_else(|| "pixel buffer does not match image dimensions".to_string())?;
    Ok(CanonicalImage::new(pixels, raw.kind))
}
