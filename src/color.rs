use serde_derive::{Deserialize, Serialize};

use crate::frame::{Frame, Roi};

/// HSV bounds for color matching, hue in [0,180], sat/val in [0,255].
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct ColorRange {
    pub h_min: f32,
    pub h_max: f32,
    pub s_min: f32,
    pub s_max: f32,
    pub v_min: f32,
    pub v_max: f32,
}

/// Preset ranges for common marker materials.
pub const WHITE: ColorRange = ColorRange {
    h_min: 0.0,
    h_max: 180.0,
    s_min: 0.0,
    s_max: 40.0,
    v_min: 180.0,
    v_max: 255.0,
};

pub const GREEN: ColorRange = ColorRange {
    h_min: 35.0,
    h_max: 85.0,
    s_min: 60.0,
    s_max: 255.0,
    v_min: 60.0,
    v_max: 255.0,
};

pub const ORANGE: ColorRange = ColorRange {
    h_min: 5.0,
    h_max: 25.0,
    s_min: 100.0,
    s_max: 255.0,
    v_min: 100.0,
    v_max: 255.0,
};

// Fixed calibration widening, clamped to valid HSV ranges. Empirical values
// tolerant of lighting variation without over-widening into false positives.
const H_TOLERANCE: f32 = 15.0;
const S_TOLERANCE: f32 = 60.0;
const V_TOLERANCE: f32 = 60.0;

impl ColorRange {
    #[inline]
    pub fn contains(&self, h: f32, s: f32, v: f32) -> bool {
        h >= self.h_min
            && h <= self.h_max
            && s >= self.s_min
            && s <= self.s_max
            && v >= self.v_min
            && v <= self.v_max
    }
}

/// RGB to HSV with hue scaled to [0,180] and sat/val to [0,255].
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> (f32, f32, f32) {
    let r = r as f32 / 255.0;
    let g = g as f32 / 255.0;
    let b = b as f32 / 255.0;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let s = if max == 0.0 { 0.0 } else { delta / max };
    let v = max;

    let mut h = 0.0;
    if delta != 0.0 {
        h = if max == r {
            ((g - b) / delta + if g < b { 6.0 } else { 0.0 }) / 6.0
        } else if max == g {
            ((b - r) / delta + 2.0) / 6.0
        } else {
            ((r - g) / delta + 4.0) / 6.0
        };
    }

    (h * 180.0, s * 255.0, v * 255.0)
}

/// Derives a matching range from the pixels in a `sample_radius` square
/// centered at (x, y): average HSV widened by the fixed tolerances.
pub fn calibrate_from_sample(frame: &Frame, x: u32, y: u32, sample_radius: u32) -> ColorRange {
    let x0 = x.saturating_sub(sample_radius);
    let y0 = y.saturating_sub(sample_radius);
    let roi = Roi::new(x0, y0, sample_radius * 2, sample_radius * 2).clamped(frame.width, frame.height);

    let mut sum = (0.0f32, 0.0f32, 0.0f32);
    let mut count = 0.0f32;

    for py in roi.y..roi.y + roi.h {
        for px in roi.x..roi.x + roi.w {
            let (r, g, b) = frame.rgb_at(px, py);
            let (h, s, v) = rgb_to_hsv(r, g, b);
            sum.0 += h;
            sum.1 += s;
            sum.2 += v;
            count += 1.0;
        }
    }

    if count == 0.0 {
        count = 1.0;
    }

    let (avg_h, avg_s, avg_v) = (sum.0 / count, sum.1 / count, sum.2 / count);

    ColorRange {
        h_min: (avg_h - H_TOLERANCE).max(0.0),
        h_max: (avg_h + H_TOLERANCE).min(180.0),
        s_min: (avg_s - S_TOLERANCE).max(0.0),
        s_max: (avg_s + S_TOLERANCE).min(255.0),
        v_min: (avg_v - V_TOLERANCE).max(0.0),
        v_max: (avg_v + V_TOLERANCE).min(255.0),
    }
}

/// Row-major boolean mask over the ROI, true where the pixel matches.
pub fn create_mask(frame: &Frame, roi: Roi, range: &ColorRange) -> Vec<bool> {
    let roi = roi.clamped(frame.width, frame.height);
    let mut mask = vec![false; roi.w as usize * roi.h as usize];

    for py in 0..roi.h {
        for px in 0..roi.w {
            let (r, g, b) = frame.rgb_at(roi.x + px, roi.y + py);
            let (h, s, v) = rgb_to_hsv(r, g, b);
            mask[(py * roi.w + px) as usize] = range.contains(h, s, v);
        }
    }

    mask
}
