use crate::ImagePoint;
use nalgebra::UnitVector3;

/// Converts pixel locations on an image into bearings out of the camera.
///
/// The bearing X axis points right, Y axis points down, and Z axis points forwards.
/// The image point uses the same coordinate frame, so its Y is down and its X is right.
pub trait CameraModel {
    /// Extracts a unit bearing in the camera frame from a pixel location in an image.
    fn calibrate<P>(&self, point: P) -> UnitVector3<f64>
    where
        P: ImagePoint;
}
