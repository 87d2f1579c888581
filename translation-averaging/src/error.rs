use thiserror::Error;
use translation_recovery::RecoveryError;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AveragingError {
    #[error("expected {expected} {what}, got {actual}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("unsupported projection sampling method {0:?}")]
    UnsupportedSamplingMethod(String),
    #[error("scale factor must be non-negative, got {0}")]
    NegativeScaleFactor(f64),
    #[error("camera index {camera} is out of range for {num_images} images")]
    CameraOutOfRange { camera: usize, num_images: usize },
    #[error("camera {camera} is used by a selected track but has no {missing}")]
    MissingCameraData {
        camera: usize,
        missing: &'static str,
    },
    #[error("translation recovery failed: {0}")]
    Recovery(#[from] RecoveryError),
}
