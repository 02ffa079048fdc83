use serde_derive::{Deserialize, Serialize};

use crate::error::Error;

/// Single RGBA video frame handed to the tracker.
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// Row-major RGBA, 4 bytes per pixel.
    pub data: Vec<u8>,
    pub timestamp: f64, // in seconds
}

impl Frame {
    pub fn new(width: u32, height: u32, data: Vec<u8>, timestamp: f64) -> Result<Self, Error> {
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            return Err(Error::FrameSize {
                width,
                height,
                got: data.len(),
            });
        }

        Ok(Self {
            width,
            height,
            data,
            timestamp,
        })
    }

    #[inline]
    pub fn dims(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[inline]
    pub fn rgb_at(&self, x: u32, y: u32) -> (u8, u8, u8) {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        (self.data[i], self.data[i + 1], self.data[i + 2])
    }
}

/// Pixel rectangle within a frame analyzed for tracking.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Roi {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Roi {
    #[inline]
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    #[inline]
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            w: width,
            h: height,
        }
    }

    /// Centered square covering `fraction` of the smaller frame dimension,
    /// the region the VBT overlay box analyzes.
    pub fn center_box(width: u32, height: u32, fraction: f32) -> Self {
        let side = (width.min(height) as f32 * fraction) as u32;

        Self {
            x: (width - side) / 2,
            y: (height - side) / 2,
            w: side,
            h: side,
        }
    }

    /// Clips the rectangle to the frame so pixel access stays in bounds.
    pub fn clamped(&self, width: u32, height: u32) -> Self {
        let x = self.x.min(width);
        let y = self.y.min(height);

        Self {
            x,
            y,
            w: self.w.min(width - x),
            h: self.h.min(height - y),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.w == 0 || self.h == 0
    }
}
