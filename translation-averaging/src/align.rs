use sfm_core::{
    nalgebra::{Matrix3, Rotation3, Vector3},
    CameraToWorld, Pose,
};

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// A similarity transform `x -> scale * rotation * x + translation` mapping frame `b` into frame `a`.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Similarity3 {
    pub rotation: Rotation3<f64>,
    pub translation: Vector3<f64>,
    pub scale: f64,
}

impl Default for Similarity3 {
    fn default() -> Self {
        Self::identity()
    }
}

impl Similarity3 {
    pub fn identity() -> Self {
        Self {
            rotation: Rotation3::identity(),
            translation: Vector3::zeros(),
            scale: 1.0,
        }
    }

    pub fn transform_point(&self, point: &Vector3<f64>) -> Vector3<f64> {
        self.scale * (self.rotation * point) + self.translation
    }

    /// Maps a camera pose `bTi` to `aTi`.
    pub fn transform_pose(&self, pose: CameraToWorld) -> CameraToWorld {
        CameraToWorld::from_parts(
            self.transform_point(&pose.translation()),
            self.rotation * pose.rotation(),
        )
    }

    /// Estimates `aSb` from corresponding poses `(aTi, bTi)`.
    ///
    /// The rotation is the chordal mean of `aRi * bRi^T`. Scale and translation then align the camera centers in
    /// the least squares sense. A single pair fixes the scale at `1` and no pairs give the identity.
    pub fn align(pairs: &[(CameraToWorld, CameraToWorld)]) -> Self {
        if pairs.is_empty() {
            return Self::identity();
        }
        let rotation = chordal_mean(
            pairs
                .iter()
                .map(|(a, b)| a.rotation() * b.rotation().inverse()),
        );
        let count = pairs.len() as f64;
        let centroid_a = pairs.iter().map(|(a, _)| a.translation()).sum::<Vector3<f64>>() / count;
        let centroid_b = pairs.iter().map(|(_, b)| b.translation()).sum::<Vector3<f64>>() / count;

        let mut ab = 0.0;
        let mut bb = 0.0;
        for (a, b) in pairs {
            let da = a.translation() - centroid_a;
            let rotated_db = rotation * (b.translation() - centroid_b);
            ab += da.dot(&rotated_db);
            bb += rotated_db.norm_squared();
        }
        let scale = if pairs.len() > 1 && bb > f64::EPSILON {
            ab / bb
        } else {
            1.0
        };
        Self {
            rotation,
            translation: centroid_a - scale * (rotation * centroid_b),
            scale,
        }
    }
}

/// Projects the sum of the rotation matrices back onto SO(3).
fn chordal_mean(rotations: impl Iterator<Item = Rotation3<f64>>) -> Rotation3<f64> {
    let sum: Matrix3<f64> = rotations.map(|rotation| rotation.into_inner()).sum();
    let svd = sum.svd(true, true);
    match (svd.u, svd.v_t) {
        (Some(u), Some(v_t)) => {
            let mut correction = Matrix3::identity();
            correction[(2, 2)] = (u * v_t).determinant().signum();
            Rotation3::from_matrix_unchecked(u * correction * v_t)
        }
        _ => Rotation3::identity(),
    }
}

/// Aligns the poses in `b` to the poses in `a` with a similarity transform, ignoring indices missing from either.
///
/// Returns the aligned `b` poses, still `None` wherever `b` is, along with the transform `aSb`.
pub fn align_poses_sim3_ignore_missing(
    a: &[Option<CameraToWorld>],
    b: &[Option<CameraToWorld>],
) -> (Vec<Option<CameraToWorld>>, Similarity3) {
    let pairs: Vec<(CameraToWorld, CameraToWorld)> = a
        .iter()
        .zip(b)
        .filter_map(|(&a, &b)| Some((a?, b?)))
        .collect();
    let a_s_b = Similarity3::align(&pairs);
    let aligned = b
        .iter()
        .map(|pose| pose.map(|pose| a_s_b.transform_pose(pose)))
        .collect();
    (aligned, a_s_b)
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    fn poses() -> Vec<CameraToWorld> {
        (0..5)
            .map(|ix| {
                let ix = ix as f64;
                CameraToWorld::from_parts(
                    Vector3::new(ix, (ix * 0.7).sin(), 0.3 * ix * ix),
                    Rotation3::from_euler_angles(0.1 * ix, -0.2, 0.05 * ix),
                )
            })
            .collect()
    }

    #[test]
    fn recovers_known_similarity() {
        let b_s_a = Similarity3 {
            rotation: Rotation3::from_euler_angles(0.4, -0.2, 1.1),
            translation: Vector3::new(3.0, -1.0, 2.0),
            scale: 0.25,
        };
        let a: Vec<_> = poses().into_iter().map(Some).collect();
        let mut b: Vec<_> = poses().into_iter().map(|pose| Some(b_s_a.transform_pose(pose))).collect();
        b[2] = None;
        let (aligned, _) = align_poses_sim3_ignore_missing(&a, &b);
        assert!(aligned[2].is_none());
        for (aligned, expected) in aligned.iter().zip(&a) {
            if let (Some(aligned), Some(expected)) = (aligned, expected) {
                assert_relative_eq!(aligned.translation(), expected.translation(), epsilon = 1e-9);
                assert_relative_eq!(
                    aligned.rotation().into_inner(),
                    expected.rotation().into_inner(),
                    epsilon = 1e-9
                );
            }
        }
    }

    #[test]
    fn single_pair_keeps_scale() {
        let a = CameraToWorld::from_parts(Vector3::new(1.0, 2.0, 3.0), Rotation3::identity());
        let b = CameraToWorld::from_parts(Vector3::zeros(), Rotation3::from_euler_angles(0.0, 0.0, 0.5));
        let a_s_b = Similarity3::align(&[(a, b)]);
        assert_eq!(a_s_b.scale, 1.0);
        assert_relative_eq!(a_s_b.transform_pose(b).translation(), a.translation(), epsilon = 1e-12);
    }

    #[test]
    fn no_pairs_give_identity() {
        assert_eq!(Similarity3::align(&[]), Similarity3::identity());
    }
}
