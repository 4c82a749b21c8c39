// ============================================================
// Layer 5b — Jet Colormap
// ============================================================
// 256-entry false-colour lookup: dark blue → cyan → yellow → red.
//
// Each channel is a clipped triangle over t ∈ [0, 1]:
//   r = clamp(1.5 − |4t − 3|)
//   g = clamp(1.5 − |4t − 2|)
//   b = clamp(1.5 − |4t − 1|)
//
// Zero intensity maps to (0, 0, 128), full intensity to (128, 0, 0).
// The table is RGB; no channel reordering happens anywhere.

use image::Rgb;

#[derive(Debug, Clone)]
pub struct JetColormap {
    lut: [Rgb<u8>; 256],
}

impl JetColormap {
    pub fn new() -> Self {
        let mut lut = [Rgb([0u8; 3]); 256];
        for (i, entry) in lut.iter_mut().enumerate() {
            let t = i as f32 / 255.0;
            *entry = Rgb([channel(t, 3.0), channel(t, 2.0), channel(t, 1.0)]);
        }
        Self { lut }
    }

    pub fn map(&self, intensity: u8) -> Rgb<u8> {
        self.lut[intensity as usize]
    }
}

impl Default for JetColormap {
    fn default() -> Self {
        Self::new()
    }
}

fn channel(t: f32, centre: f32) -> u8 {
    let v = (1.5 - (4.0 * t - centre).abs()).clamp(0.0, 1.0);
    (v * 255.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints() {
        let jet = JetColormap::new();
        assert_eq!(jet.map(0), Rgb([0, 0, 128]));
        assert_eq!(jet.map(255), Rgb([128, 0, 0]));
    }

    #[test]
    fn test_green_peaks_in_the_middle() {
        let jet = JetColormap::new();
        assert_eq!(jet.map(128).0[1], 255);
        assert_eq!(jet.map(0).0[1], 0);
        assert_eq!(jet.map(255).0[1], 0);
    }

    #[test]
    fn test_smooth_steps() {
        let jet = JetColormap::new();
        for i in 0..255u8 {
            let (a, b) = (jet.map(i).0, jet.map(i + 1).0);
            for c in 0..3 {
                assert!(a[c].abs_diff(b[c]) <= 5, "jump at {i}");
            }
        }
    }
}
