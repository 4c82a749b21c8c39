// ============================================================
// Layer 4 — CLAHE (Contrast-Limited Adaptive Histogram Equalization)
// ============================================================
// Local contrast enhancement for 8-bit grayscale images.
//
// The image is split into a grid of tiles. For every tile:
//   1. build a 256-bin histogram
//   2. clip each bin at the clip limit and spread the excess
//      evenly over all bins (the remainder goes to every
//      `step`-th bin starting at 0)
//   3. turn the clipped histogram into a lookup table via its
//      cumulative sum, scaled to 0–255
//
// Every output pixel then bilinearly interpolates the LUTs of
// the four tiles whose centres surround it, which avoids visible
// tile seams.
//
// Tiles at the right/bottom edge of images whose size is not a
// multiple of the grid are completed by mirroring the border
// (reflect-101: ...c b | a b c... without repeating the edge).
//
// Everything is integer or fixed-order float arithmetic, so the
// result is bit-for-bit reproducible.
//
// Reference: Zuiderveld (1994) Contrast Limited Adaptive
//            Histogram Equalization, Graphics Gems IV

use image::GrayImage;

const BINS: usize = 256;

/// Tile-based contrast-limited histogram equalizer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Clahe {
    clip_limit: f32,
    tiles_x:    usize,
    tiles_y:    usize,
}

impl Clahe {
    /// `clip_limit` is relative to a uniform histogram; 0 disables clipping.
    pub fn new(clip_limit: f32, tiles_x: usize, tiles_y: usize) -> Self {
        Self {
            clip_limit,
            tiles_x: tiles_x.max(1),
            tiles_y: tiles_y.max(1),
        }
    }

    pub fn apply(&self, img: &GrayImage) -> GrayImage {
        let (w, h) = (img.width() as usize, img.height() as usize);
        if w == 0 || h == 0 {
            return img.clone();
        }

        let tile_w    = w.div_ceil(self.tiles_x);
        let tile_h    = h.div_ceil(self.tiles_y);
        let tile_area = tile_w * tile_h;

        let clip = if self.clip_limit > 0.0 {
            ((self.clip_limit * tile_area as f32 / BINS as f32) as usize).max(1)
        } else {
            0
        };

        // ── Per-tile lookup tables ────────────────────────────────────────────
        let mut luts = Vec::with_capacity(self.tiles_x * self.tiles_y);
        for ty in 0..self.tiles_y {
            for tx in 0..self.tiles_x {
                let mut hist = tile_histogram(img, tx * tile_w, ty * tile_h, tile_w, tile_h);
                if clip > 0 {
                    clip_histogram(&mut hist, clip);
                }
                luts.push(build_lut(&hist, tile_area));
            }
        }

        // ── Bilinear blend of the four neighbouring LUTs ──────────────────────
        let inv_tw = 1.0 / tile_w as f32;
        let inv_th = 1.0 / tile_h as f32;
        let last_tx = self.tiles_x as isize - 1;
        let last_ty = self.tiles_y as isize - 1;

        let mut out = GrayImage::new(img.width(), img.height());
        for y in 0..h {
            let tyf = y as f32 * inv_th - 0.5;
            let ty1 = tyf.floor() as isize;
            let ya  = tyf - ty1 as f32;
            let ty2 = (ty1 + 1).min(last_ty) as usize;
            let ty1 = ty1.max(0) as usize;

            for x in 0..w {
                let txf = x as f32 * inv_tw - 0.5;
                let tx1 = txf.floor() as isize;
                let xa  = txf - tx1 as f32;
                let tx2 = (tx1 + 1).min(last_tx) as usize;
                let tx1 = tx1.max(0) as usize;

                let v = img.get_pixel(x as u32, y as u32).0[0] as usize;
                let lut = |ty: usize, tx: usize| luts[ty * self.tiles_x + tx][v] as f32;

                let top    = lut(ty1, tx1) * (1.0 - xa) + lut(ty1, tx2) * xa;
                let bottom = lut(ty2, tx1) * (1.0 - xa) + lut(ty2, tx2) * xa;
                let res    = top * (1.0 - ya) + bottom * ya;

                out.get_pixel_mut(x as u32, y as u32).0[0] = res.round().clamp(0.0, 255.0) as u8;
            }
        }
        out
    }
}

/// Histogram of one tile, mirroring coordinates past the image edge.
fn tile_histogram(img: &GrayImage, x0: usize, y0: usize, tw: usize, th: usize) -> [usize; BINS] {
    let (w, h) = (img.width() as usize, img.height() as usize);
    let mut hist = [0usize; BINS];
    for y in y0..y0 + th {
        let sy = reflect101(y, h) as u32;
        for x in x0..x0 + tw {
            let sx = reflect101(x, w) as u32;
            hist[img.get_pixel(sx, sy).0[0] as usize] += 1;
        }
    }
    hist
}

/// Clip bins at `clip` and redistribute the excess.
fn clip_histogram(hist: &mut [usize; BINS], clip: usize) {
    let mut excess = 0usize;
    for bin in hist.iter_mut() {
        if *bin > clip {
            excess += *bin - clip;
            *bin = clip;
        }
    }

    let batch    = excess / BINS;
    let residual = excess - batch * BINS;
    for bin in hist.iter_mut() {
        *bin += batch;
    }

    if residual > 0 {
        let step = (BINS / residual).max(1);
        for bin in hist.iter_mut().step_by(step).take(residual) {
            *bin += 1;
        }
    }
}

/// Cumulative histogram scaled to 0–255.
fn build_lut(hist: &[usize; BINS], tile_area: usize) -> [u8; BINS] {
    let scale = 255.0 / tile_area as f32;
    let mut lut = [0u8; BINS];
    let mut sum = 0usize;
    for (entry, &count) in lut.iter_mut().zip(hist.iter()) {
        sum += count;
        *entry = (sum as f32 * scale).round().clamp(0.0, 255.0) as u8;
    }
    lut
}

/// Mirror an index into `0..n` without repeating the edge sample.
fn reflect101(i: usize, n: usize) -> usize {
    if n == 1 {
        return 0;
    }
    let period = 2 * (n - 1);
    let i = i % period;
    if i < n { i } else { period - i }
}
