pub mod color;
pub mod error;
pub mod frame;
pub mod kinematics;
pub mod math;
pub mod physics;
pub mod sample;
pub mod session;
pub mod threshold;
pub mod tracker;
pub mod vbt;

mod window;

pub use error::Error;
pub use frame::{Frame, Roi};
pub use physics::{JumpData, JumpDetector, JumpMode};
pub use sample::TrackingSample;
pub use session::{FrameSource, Session, SessionConfig, SessionEvent, SessionMode, SessionReport};
pub use threshold::{InputRow, TestResult, ThresholdMethod};
pub use tracker::{Strategy, Tracker};
pub use vbt::{RepData, RepDetector, VbtConfig};
