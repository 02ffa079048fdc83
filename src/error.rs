use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Camera Error: {0}")]
    Camera(String),

    #[error("Frame buffer size {got} does not match {width}x{height} RGBA")]
    FrameSize { width: u32, height: u32, got: usize },

    #[error("Insufficient data: at least {required} complete rows required, got {got}")]
    InsufficientData { required: usize, got: usize },
}
