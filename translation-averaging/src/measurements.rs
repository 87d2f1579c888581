use crate::AveragingError;
use sfm_core::{
    nalgebra::{Rotation3, UnitVector3},
    CameraModel, Track2d,
};
use sfm_pinhole::Calibration;
use std::collections::{BTreeMap, BTreeSet};

/// Unit directions keyed by `(i1, i2)`, each pointing from camera `i2` towards camera `i1`.
pub type RelativeDirections = BTreeMap<(usize, usize), UnitVector3<f64>>;

/// Unit directions keyed by `(track_id, camera_id)`, each pointing from the camera towards the landmark.
pub type LandmarkDirections = BTreeMap<(usize, usize), UnitVector3<f64>>;

/// Rotates every measurement `i2Ui1` into the world frame with `wRi2`.
///
/// Measurements that are missing, or that involve a camera without a rotation, are dropped. Also returns the
/// cameras that appear in at least one kept measurement.
///
/// ```
/// use sfm_core::nalgebra::{Rotation3, UnitVector3, Vector3};
/// use std::collections::BTreeMap;
/// use translation_averaging::get_valid_measurements_in_world_frame;
///
/// let mut i2_u_i1 = BTreeMap::new();
/// i2_u_i1.insert((0, 1), Some(UnitVector3::new_normalize(Vector3::x())));
/// i2_u_i1.insert((1, 2), Some(UnitVector3::new_normalize(Vector3::y())));
/// let w_r_i = vec![Some(Rotation3::identity()), Some(Rotation3::identity()), None];
/// let (w_i2_u_i1, valid_cameras) = get_valid_measurements_in_world_frame(&i2_u_i1, &w_r_i);
/// assert_eq!(w_i2_u_i1.len(), 1);
/// assert_eq!(valid_cameras.into_iter().collect::<Vec<_>>(), vec![0, 1]);
/// ```
pub fn get_valid_measurements_in_world_frame(
    i2_u_i1: &BTreeMap<(usize, usize), Option<UnitVector3<f64>>>,
    w_r_i: &[Option<Rotation3<f64>>],
) -> (RelativeDirections, BTreeSet<usize>) {
    let rotation = |ix: usize| w_r_i.get(ix).copied().flatten();
    let mut valid_cameras = BTreeSet::new();
    let w_i2_u_i1 = i2_u_i1
        .iter()
        .filter_map(|(&(i1, i2), &direction)| {
            let direction = direction?;
            rotation(i1)?;
            let w_r_i2 = rotation(i2)?;
            valid_cameras.insert(i1);
            valid_cameras.insert(i2);
            Some((
                (i1, i2),
                UnitVector3::new_normalize(w_r_i2 * direction.into_inner()),
            ))
        })
        .collect();
    (w_i2_u_i1, valid_cameras)
}

/// Computes the world frame direction from every observing camera towards the landmark of every track.
///
/// The `track_id` of a track is its position in `tracks`. Every camera observing a track must have both
/// intrinsics and a rotation.
pub fn get_landmark_directions(
    tracks: &[Track2d],
    intrinsics: &[Option<Calibration>],
    w_r_i: &[Option<Rotation3<f64>>],
) -> Result<LandmarkDirections, AveragingError> {
    let mut directions = LandmarkDirections::new();
    for (track_id, track) in tracks.iter().enumerate() {
        for observation in track.iter() {
            let camera = observation.camera;
            let calibration = intrinsics.get(camera).copied().flatten().ok_or(
                AveragingError::MissingCameraData {
                    camera,
                    missing: "intrinsics",
                },
            )?;
            let w_r_c = w_r_i.get(camera).copied().flatten().ok_or(
                AveragingError::MissingCameraData {
                    camera,
                    missing: "rotation",
                },
            )?;
            let bearing = calibration.calibrate(observation.keypoint);
            directions.insert(
                (track_id, camera),
                UnitVector3::new_normalize(w_r_c * bearing.into_inner()),
            );
        }
    }
    Ok(directions)
}
