use derive_more::{AsMut, AsRef, From, Into};
use nalgebra::{IsometryMatrix3, Rotation3, Translation3, UnitVector3, Vector3};

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// This trait is implemented by the poses in this library:
///
/// * [`CameraToWorld`] - the global pose `wTi` of a camera
/// * [`CameraToCamera`] - the relative pose `i2Ti1` between two cameras
pub trait Pose: From<IsometryMatrix3<f64>> + Clone + Copy {
    /// Retrieve the isometry.
    fn isometry(self) -> IsometryMatrix3<f64>;

    /// Create the pose from rotation and translation.
    fn from_parts(translation: Vector3<f64>, rotation: Rotation3<f64>) -> Self {
        IsometryMatrix3::from_parts(Translation3::from(translation), rotation).into()
    }

    /// Retrieve the rotation component.
    fn rotation(self) -> Rotation3<f64> {
        self.isometry().rotation
    }

    /// Retrieve the translation component.
    fn translation(self) -> Vector3<f64> {
        self.isometry().translation.vector
    }
}

/// The pose of a camera in the world frame, `wTi`.
///
/// This transforms points in the camera frame into the world frame, so its translation is the
/// position of the camera's optical center in the world.
#[derive(Debug, Clone, Copy, PartialEq, AsMut, AsRef, From, Into)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct CameraToWorld(pub IsometryMatrix3<f64>);

impl Pose for CameraToWorld {
    #[inline(always)]
    fn isometry(self) -> IsometryMatrix3<f64> {
        self.into()
    }
}

impl CameraToWorld {
    /// Computes `i2Ti1`, the pose of `self` (camera `i1`) in the frame of `other` (camera `i2`).
    ///
    /// ```
    /// use sfm_core::{CameraToWorld, Pose};
    /// use sfm_core::nalgebra::{Rotation3, Vector3};
    /// let w_t_i1 = CameraToWorld::from_parts(Vector3::new(1.0, 0.0, 0.0), Rotation3::identity());
    /// let w_t_i2 = CameraToWorld::from_parts(Vector3::new(0.0, 0.0, 0.0), Rotation3::identity());
    /// let i2_u_i1 = w_t_i1.relative_to(w_t_i2).unit_translation().unwrap();
    /// assert!((i2_u_i1.into_inner() - Vector3::x()).norm() < 1e-12);
    /// ```
    pub fn relative_to(self, other: CameraToWorld) -> CameraToCamera {
        CameraToCamera(other.isometry().inverse() * self.isometry())
    }
}

/// The pose of camera `i1` expressed in the frame of camera `i2`, `i2Ti1`.
///
/// Camera space for a given camera is defined as thus:
///
/// * Origin is the optical center
/// * Positive z axis is forwards
/// * Positive y axis is down
/// * Positive x axis is right
#[derive(Debug, Clone, Copy, PartialEq, AsMut, AsRef, From, Into)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct CameraToCamera(pub IsometryMatrix3<f64>);

impl Pose for CameraToCamera {
    #[inline(always)]
    fn isometry(self) -> IsometryMatrix3<f64> {
        self.into()
    }
}

impl CameraToCamera {
    /// The unit direction `i2Ui1` from camera `i2` towards camera `i1` in the frame of `i2`.
    ///
    /// Returns `None` if both optical centers coincide.
    pub fn unit_translation(self) -> Option<UnitVector3<f64>> {
        UnitVector3::try_new(self.translation(), f64::EPSILON)
    }
}
