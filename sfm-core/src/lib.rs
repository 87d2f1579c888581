//! # SfM Core
//!
//! Common abstractions shared by the translation averaging crates. Every crate in this workspace that
//! consumes poses, tracks, or pairwise measurements depends on this crate, so it stays small and only
//! pulls in `nalgebra`.
//!
//! ## Conventions
//!
//! Indices into the camera list are plain `usize` values. Directions are [`nalgebra::UnitVector3`].
//! Relative quantities carry both camera indices in their name, with the frame they are expressed in
//! written first:
//!
//! * `wRi` - the rotation of camera `i` in the world frame
//! * `wTi` - the pose of camera `i` in the world frame ([`CameraToWorld`])
//! * `i2Ti1` - the pose of camera `i1` expressed in the frame of camera `i2` ([`CameraToCamera`])
//! * `i2Ui1` - the unit direction from camera `i2` towards camera `i1`, expressed in the frame of camera `i2`
//!
//! ```text
//!            i1
//!           ^
//!          /  i2Ui1
//!         /
//!       i2
//! ```
//!
//! A landmark observed by a camera contributes a camera-to-landmark direction in exactly the same way,
//! which is why [`BinaryMeasurement`] does not care whether its keys are cameras or landmarks.

mod camera;
mod keypoint;
mod measurement;
mod pose;
mod prior;
mod track;

pub use camera::*;
pub use keypoint::*;
pub use measurement::*;
pub use nalgebra;
pub use pose::*;
pub use prior::*;
pub use track::*;
