//! This crate plugs into `sfm-core` and provides pinhole camera models with and without radial distortion.
//! It converts image coordinates into unit bearings pointing towards where the light that hit that pixel
//! came from, which is all translation averaging needs from a camera model.

use sfm_core::nalgebra::{Matrix3, Point2, UnitVector3, Vector2};
use sfm_core::{CameraModel, ImagePoint};

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// This contains intrinsic camera parameters as per
/// [this Wikipedia page](https://en.wikipedia.org/wiki/Camera_resectioning#Intrinsic_parameters).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct CameraIntrinsics {
    pub focals: Vector2<f64>,
    pub principal_point: Point2<f64>,
    pub skew: f64,
}

impl CameraIntrinsics {
    /// Creates camera intrinsics that would create an identity intrinsic matrix.
    /// This would imply that the pixel positions have an origin at `0,0`,
    /// the pixel distance unit is the focal length, pixels are square,
    /// and there is no skew.
    pub fn identity() -> Self {
        Self {
            focals: Vector2::new(1.0, 1.0),
            skew: 0.0,
            principal_point: Point2::new(0.0, 0.0),
        }
    }

    #[must_use]
    pub fn focals(self, focals: Vector2<f64>) -> Self {
        Self { focals, ..self }
    }

    #[must_use]
    pub fn focal(self, focal: f64) -> Self {
        Self {
            focals: Vector2::new(focal, focal),
            ..self
        }
    }

    #[must_use]
    pub fn principal_point(self, principal_point: Point2<f64>) -> Self {
        Self {
            principal_point,
            ..self
        }
    }

    #[must_use]
    pub fn skew(self, skew: f64) -> Self {
        Self { skew, ..self }
    }

    #[rustfmt::skip]
    pub fn matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.focals.x,  self.skew,      self.principal_point.x,
            0.0,            self.focals.y,  self.principal_point.y,
            0.0,            0.0,            1.0,
        )
    }

    /// Converts a pixel location into normalized image coordinates on the virtual image plane at depth `1`.
    ///
    /// ```
    /// use sfm_core::KeyPoint;
    /// use sfm_core::nalgebra::{Point2, Vector2};
    /// use sfm_pinhole::CameraIntrinsics;
    /// let intrinsics = CameraIntrinsics {
    ///     focals: Vector2::new(800.0, 900.0),
    ///     principal_point: Point2::new(500.0, 600.0),
    ///     skew: 1.7,
    /// };
    /// let kp = KeyPoint::new(471.0, 322.0);
    /// let normalized = intrinsics.normalize(kp);
    /// let reprojected = intrinsics.matrix() * normalized.to_homogeneous();
    /// assert!((kp.0.coords - reprojected.xy()).norm() < 1e-9);
    /// ```
    pub fn normalize<P: ImagePoint>(&self, point: P) -> Point2<f64> {
        let centered = point.image_point() - self.principal_point;
        let y = centered.y / self.focals.y;
        let x = (centered.x - self.skew * y) / self.focals.x;
        Point2::new(x, y)
    }
}

impl CameraModel for CameraIntrinsics {
    fn calibrate<P>(&self, point: P) -> UnitVector3<f64>
    where
        P: ImagePoint,
    {
        bearing(self.normalize(point))
    }
}

/// This contains intrinsic camera parameters with one radial distortion coefficient (K1),
/// as used by Bundler-style reconstructions.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct CameraIntrinsicsK1Distortion {
    pub simple_intrinsics: CameraIntrinsics,
    pub k1: f64,
}

impl CameraIntrinsicsK1Distortion {
    /// Creates the camera intrinsics using simple intrinsics with no distortion and a K1 distortion coefficient.
    pub fn new(simple_intrinsics: CameraIntrinsics, k1: f64) -> Self {
        Self {
            simple_intrinsics,
            k1,
        }
    }

    /// Converts a pixel location into undistorted normalized image coordinates.
    pub fn normalize<P: ImagePoint>(&self, point: P) -> Point2<f64> {
        let distorted = self.simple_intrinsics.normalize(point);
        let r2 = distorted.coords.norm_squared();
        (distorted.coords / (1.0 + self.k1 * r2)).into()
    }
}

impl CameraModel for CameraIntrinsicsK1Distortion {
    fn calibrate<P>(&self, point: P) -> UnitVector3<f64>
    where
        P: ImagePoint,
    {
        bearing(self.normalize(point))
    }
}

/// The calibration of one camera.
///
/// Cameras in one reconstruction may use different models, so per-camera calibrations are stored as this
/// enum rather than as a generic parameter.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub enum Calibration {
    Pinhole(CameraIntrinsics),
    PinholeK1(CameraIntrinsicsK1Distortion),
}

impl CameraModel for Calibration {
    fn calibrate<P>(&self, point: P) -> UnitVector3<f64>
    where
        P: ImagePoint,
    {
        match self {
            Self::Pinhole(intrinsics) => intrinsics.calibrate(point),
            Self::PinholeK1(intrinsics) => intrinsics.calibrate(point),
        }
    }
}

impl From<CameraIntrinsics> for Calibration {
    fn from(intrinsics: CameraIntrinsics) -> Self {
        Self::Pinhole(intrinsics)
    }
}

impl From<CameraIntrinsicsK1Distortion> for Calibration {
    fn from(intrinsics: CameraIntrinsicsK1Distortion) -> Self {
        Self::PinholeK1(intrinsics)
    }
}

/// Lifts normalized image coordinates onto the virtual image plane and normalizes.
fn bearing(normalized: Point2<f64>) -> UnitVector3<f64> {
    UnitVector3::new_normalize(normalized.coords.push(1.0))
}
