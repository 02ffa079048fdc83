use serde_derive::{Deserialize, Serialize};

/// Consumers must treat anything below this as "no detection".
pub const MIN_CONFIDENCE: f32 = 0.3;

/// Normalized image-plane position of the tracked marker for one frame.
/// Coordinates are in [0,1] relative to the full frame, not the ROI.
#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
pub struct TrackingSample {
    pub x: f32,
    pub y: f32,
    #[serde(rename = "p")]
    pub confidence: f32,
}

impl TrackingSample {
    #[inline]
    pub fn is_reliable(&self) -> bool {
        self.confidence >= MIN_CONFIDENCE
    }
}
