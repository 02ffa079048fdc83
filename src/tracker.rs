use serde_derive::{Deserialize, Serialize};

use crate::color::{rgb_to_hsv, ColorRange};
use crate::frame::{Frame, Roi};
use crate::sample::TrackingSample;

/// Pixels skipped between samples when scanning an ROI. Deliberate
/// accuracy/speed tradeoff so a pass fits in one frame interval at 60 Hz.
pub const SAMPLE_STRIDE: usize = 4;

/// Channel the brightness strategy thresholds on.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub enum Channel {
    Red,
    Green,
    Blue,
    Brightness,
    /// Green channel, but only where green dominates red and blue by a
    /// margin. Suits reflective green tape under mixed lighting.
    GreenDominant,
}

impl Channel {
    #[inline]
    fn matches(self, r: u8, g: u8, b: u8, threshold: u8) -> bool {
        match self {
            Channel::Red => r > threshold,
            Channel::Green => g > threshold,
            Channel::Blue => b > threshold,
            Channel::Brightness => (r as u16 + g as u16 + b as u16) / 3 > threshold as u16,
            Channel::GreenDominant => {
                g > threshold && g as u16 > r as u16 + 20 && g as u16 > b as u16 + 20
            }
        }
    }
}

/// Per-frame marker detection strategy, selected by configuration.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub enum Strategy {
    /// HSV range match, centroid of matching pixels.
    Color { range: ColorRange, min_blob: usize },
    /// Channel threshold match, centroid of matching pixels.
    Brightness {
        channel: Channel,
        threshold: u8,
        min_count: usize,
    },
    /// Frame-difference motion blob centroid.
    Motion { threshold: f32, min_count: usize },
    /// Lowest image row with motion, for foot/silhouette takeoff tracking.
    LowestPoint {
        threshold: f32,
        min_row_count: usize,
    },
    /// Sobel gradient magnitude centroid.
    Edge { threshold: f32, min_count: usize },
}

impl Strategy {
    pub fn color(range: ColorRange) -> Self {
        Strategy::Color {
            range,
            min_blob: 50,
        }
    }

    pub fn brightness(channel: Channel, threshold: u8) -> Self {
        Strategy::Brightness {
            channel,
            threshold,
            min_count: 10,
        }
    }

    pub fn motion() -> Self {
        Strategy::Motion {
            threshold: 25.0,
            min_count: 30,
        }
    }

    pub fn lowest_point() -> Self {
        Strategy::LowestPoint {
            threshold: 20.0,
            min_row_count: 10,
        }
    }

    pub fn edge() -> Self {
        Strategy::Edge {
            threshold: 50.0,
            min_count: 30,
        }
    }
}

struct RoiBuffer {
    w: u32,
    h: u32,
    data: Vec<u8>,
}

/// Runs one strategy over a frame's ROI and returns the marker position
/// normalized to the full frame. Owns the previous-frame crop the diff
/// strategies need; the crop is replaced every frame, never accumulated.
pub struct Tracker {
    strategy: Strategy,
    stride: usize,
    prev: Option<RoiBuffer>,
    mask: Vec<bool>,
    gray: Vec<f32>,
}

impl Tracker {
    pub fn new(strategy: Strategy) -> Self {
        Self::with_stride(strategy, SAMPLE_STRIDE)
    }

    pub fn with_stride(strategy: Strategy, stride: usize) -> Self {
        Self {
            strategy,
            stride: stride.max(1),
            prev: None,
            mask: Vec::new(),
            gray: Vec::new(),
        }
    }

    #[inline]
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn track(&mut self, frame: &Frame, roi: Roi) -> Option<TrackingSample> {
        let roi = roi.clamped(frame.width, frame.height);
        if roi.is_empty() {
            return None;
        }

        match self.strategy {
            Strategy::Color { range, min_blob } => {
                centroid_scan(frame, roi, self.stride, min_blob, 500.0, |r, g, b| {
                    let (h, s, v) = rgb_to_hsv(r, g, b);
                    range.contains(h, s, v)
                })
            }
            Strategy::Brightness {
                channel,
                threshold,
                min_count,
            } => centroid_scan(frame, roi, self.stride, min_count, 200.0, |r, g, b| {
                channel.matches(r, g, b, threshold)
            }),
            Strategy::Motion {
                threshold,
                min_count,
            } => self.track_motion(frame, roi, threshold, min_count),
            Strategy::LowestPoint {
                threshold,
                min_row_count,
            } => self.track_lowest_point(frame, roi, threshold, min_row_count),
            Strategy::Edge {
                threshold,
                min_count,
            } => self.track_edge(frame, roi, threshold, min_count),
        }
    }

    /// Drops the previous-frame crop so the next diff pass starts cold.
    pub fn reset(&mut self) {
        self.prev = None;
    }

    fn track_motion(
        &mut self,
        frame: &Frame,
        roi: Roi,
        threshold: f32,
        min_count: usize,
    ) -> Option<TrackingSample> {
        let curr = crop(frame, roi);
        let prev = self.prev.replace(RoiBuffer {
            w: roi.w,
            h: roi.h,
            data: curr,
        });

        let prev = match prev {
            Some(p) if p.w == roi.w && p.h == roi.h => p,
            // No reference frame yet, or the ROI moved under us.
            _ => return None,
        };

        let curr = &self.prev.as_ref()?.data;
        let w = roi.w as usize;
        let total = w * roi.h as usize;

        let mut sum_x = 0.0f64;
        let mut sum_y = 0.0f64;
        let mut count = 0usize;

        for idx in (0..total).step_by(self.stride) {
            if pixel_diff(curr, &prev.data, idx) > threshold {
                sum_x += (idx % w) as f64;
                sum_y += (idx / w) as f64;
                count += 1;
            }
        }

        if count < min_count {
            return None;
        }

        Some(normalize(
            frame,
            roi,
            sum_x / count as f64,
            sum_y / count as f64,
            count as f32 / 300.0,
        ))
    }

    fn track_lowest_point(
        &mut self,
        frame: &Frame,
        roi: Roi,
        threshold: f32,
        min_row_count: usize,
    ) -> Option<TrackingSample> {
        let curr = crop(frame, roi);
        let prev = self.prev.replace(RoiBuffer {
            w: roi.w,
            h: roi.h,
            data: curr,
        });

        let prev = match prev {
            Some(p) if p.w == roi.w && p.h == roi.h => p,
            _ => return None,
        };

        let mut mask = std::mem::take(&mut self.mask);
        let curr = match self.prev.as_ref() {
            Some(b) => &b.data,
            None => return None,
        };
        let w = roi.w as usize;
        let h = roi.h as usize;

        // Coarser mask than the centroid variant: every 2nd pixel.
        mask.clear();
        mask.resize(w * h, false);
        for idx in (0..w * h).step_by(2) {
            if pixel_diff(curr, &prev.data, idx) > threshold {
                mask[idx] = true;
            }
        }

        // First qualifying row from the bottom is the tracked point.
        let mut found = None;
        for y in (0..h).rev() {
            let mut row_count = 0usize;
            let mut row_x = 0.0f64;

            for x in 0..w {
                if mask[y * w + x] {
                    row_count += 1;
                    row_x += x as f64;
                }
            }

            if row_count > min_row_count {
                found = Some(normalize(
                    frame,
                    roi,
                    row_x / row_count as f64,
                    y as f64,
                    row_count as f32 / 100.0,
                ));
                break;
            }
        }

        self.mask = mask;
        found
    }

    fn track_edge(
        &mut self,
        frame: &Frame,
        roi: Roi,
        threshold: f32,
        min_count: usize,
    ) -> Option<TrackingSample> {
        let w = roi.w as usize;
        let h = roi.h as usize;
        if w < 3 || h < 3 {
            return None;
        }

        self.gray.clear();
        self.gray.reserve(w * h);
        for y in 0..roi.h {
            for x in 0..roi.w {
                let (r, g, b) = frame.rgb_at(roi.x + x, roi.y + y);
                self.gray.push((r as f32 + g as f32 + b as f32) / 3.0);
            }
        }

        let gray = &self.gray;
        let mut sum_x = 0.0f64;
        let mut sum_y = 0.0f64;
        let mut count = 0usize;

        for y in 1..h - 1 {
            for x in 1..w - 1 {
                let idx = y * w + x;

                let gx = -gray[idx - w - 1] - 2.0 * gray[idx - 1] - gray[idx + w - 1]
                    + gray[idx - w + 1]
                    + 2.0 * gray[idx + 1]
                    + gray[idx + w + 1];
                let gy = -gray[idx - w - 1] - 2.0 * gray[idx - w] - gray[idx - w + 1]
                    + gray[idx + w - 1]
                    + 2.0 * gray[idx + w]
                    + gray[idx + w + 1];

                if (gx * gx + gy * gy).sqrt() > threshold {
                    sum_x += x as f64;
                    sum_y += y as f64;
                    count += 1;
                }
            }
        }

        if count < min_count {
            return None;
        }

        Some(normalize(
            frame,
            roi,
            sum_x / count as f64,
            sum_y / count as f64,
            count as f32 / 200.0,
        ))
    }
}

#[inline]
fn pixel_diff(curr: &[u8], prev: &[u8], idx: usize) -> f32 {
    let i = idx * 4;
    let dr = (curr[i] as i16 - prev[i] as i16).abs();
    let dg = (curr[i + 1] as i16 - prev[i + 1] as i16).abs();
    let db = (curr[i + 2] as i16 - prev[i + 2] as i16).abs();

    (dr + dg + db) as f32 / 3.0
}

fn crop(frame: &Frame, roi: Roi) -> Vec<u8> {
    let mut out = Vec::with_capacity(roi.w as usize * roi.h as usize * 4);
    let fw = frame.width as usize;

    for y in roi.y..roi.y + roi.h {
        let start = (y as usize * fw + roi.x as usize) * 4;
        let end = start + roi.w as usize * 4;
        out.extend_from_slice(&frame.data[start..end]);
    }

    out
}

#[inline]
fn normalize(frame: &Frame, roi: Roi, local_x: f64, local_y: f64, confidence: f32) -> TrackingSample {
    TrackingSample {
        x: ((roi.x as f64 + local_x) / frame.width as f64) as f32,
        y: ((roi.y as f64 + local_y) / frame.height as f64) as f32,
        confidence: confidence.min(1.0),
    }
}

fn centroid_scan<F: Fn(u8, u8, u8) -> bool>(
    frame: &Frame,
    roi: Roi,
    stride: usize,
    min_count: usize,
    confidence_scale: f32,
    matches: F,
) -> Option<TrackingSample> {
    let w = roi.w as usize;
    let total = w * roi.h as usize;

    let mut sum_x = 0.0f64;
    let mut sum_y = 0.0f64;
    let mut count = 0usize;

    for idx in (0..total).step_by(stride) {
        let x = (idx % w) as u32;
        let y = (idx / w) as u32;
        let (r, g, b) = frame.rgb_at(roi.x + x, roi.y + y);

        if matches(r, g, b) {
            sum_x += x as f64;
            sum_y += y as f64;
            count += 1;
        }
    }

    if count < min_count {
        return None;
    }

    Some(normalize(
        frame,
        roi,
        sum_x / count as f64,
        sum_y / count as f64,
        count as f32 / confidence_scale,
    ))
}
