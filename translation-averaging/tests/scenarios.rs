use approx::assert_relative_eq;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use sfm_core::{
    nalgebra::{Rotation3, UnitVector3, Vector3},
    CameraToCamera, CameraToWorld, KeyPoint, Pose, PosePrior, Track2d, TrackMeasurement,
};
use sfm_pinhole::{Calibration, CameraIntrinsics};
use std::collections::BTreeMap;
use translation_averaging::{AveragingError, AveragingInput, AveragingSettings, TranslationAveraging1dSfm};

fn square() -> Vec<CameraToWorld> {
    [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]
        .iter()
        .enumerate()
        .map(|(ix, &(x, y))| {
            CameraToWorld::from_parts(
                Vector3::new(x, y, 0.0),
                Rotation3::from_euler_angles(0.1 * ix as f64, -0.05, 0.2 * ix as f64),
            )
        })
        .collect()
}

fn grid() -> Vec<CameraToWorld> {
    (0..9)
        .map(|ix| {
            CameraToWorld::from_parts(
                Vector3::new((ix % 3) as f64, (ix / 3) as f64, 0.0),
                Rotation3::from_euler_angles(0.0, 0.0, 0.3 * ix as f64),
            )
        })
        .collect()
}

/// Measures `i2Ui1` between every pair of cameras, flipping the listed pairs.
fn input(poses: &[CameraToWorld], flipped: &[(usize, usize)]) -> AveragingInput {
    let mut directions = BTreeMap::new();
    for i1 in 0..poses.len() {
        for i2 in (i1 + 1)..poses.len() {
            let mut i2_u_i1 = poses[i1].relative_to(poses[i2]).unit_translation().unwrap();
            if flipped.contains(&(i1, i2)) {
                i2_u_i1 = -i2_u_i1;
            }
            directions.insert((i1, i2), Some(i2_u_i1));
        }
    }
    let rotations = poses.iter().map(|pose| Some(pose.rotation())).collect();
    AveragingInput::new(poses.len(), directions, rotations)
        .ground_truth(poses.iter().copied().map(Some).collect())
}

#[test]
fn exact_directions_are_recovered() {
    let poses = square();
    let result = TranslationAveraging1dSfm::default().run(&input(&poses, &[])).unwrap();
    let metrics = result.metrics.unwrap();
    assert_eq!(metrics.total_measurements, 6);
    assert_eq!(metrics.inlier_measurements, 6);
    assert_eq!(metrics.outlier_measurements, 0);
    assert_eq!(metrics.precision, Some(1.0));
    assert_eq!(metrics.recall, Some(1.0));
    assert_eq!(metrics.num_translations_estimated, 4);
    assert!(metrics.inlier_angular_errors_deg.max.unwrap() < 1e-6);
    assert!(metrics.relative_translation_angle_errors_deg.max.unwrap() < 1e-3);
    assert!(metrics.translation_distance_errors.max.unwrap() < 1e-4);

    // The first measured pair fixes the scale.
    let w_t_0 = result.poses[0].unwrap().translation();
    let w_t_1 = result.poses[1].unwrap().translation();
    assert_relative_eq!((w_t_0 - w_t_1).norm(), 1.0, epsilon = 1e-4);
    for (pose, expected) in result.poses.iter().zip(&poses) {
        assert_eq!(pose.unwrap().rotation(), expected.rotation());
    }
}

#[test]
fn flipped_direction_is_rejected_and_ignored() {
    let poses = grid();
    let result = TranslationAveraging1dSfm::default()
        .run(&input(&poses, &[(0, 8)]))
        .unwrap();
    assert!(!result.inliers.camera_directions.contains_key(&(0, 8)));
    let metrics = result.metrics.unwrap();
    assert_eq!(metrics.outlier_measurements, 1);
    assert_eq!(metrics.precision, Some(1.0));
    assert_eq!(metrics.recall, Some(1.0));
    assert_relative_eq!(metrics.outlier_angular_errors_deg.max.unwrap(), 180.0, epsilon = 1e-6);
    assert!(metrics.translation_distance_errors.max.unwrap() < 1e-3);
}

#[test]
fn disabled_rejection_keeps_flipped_direction() {
    let poses = grid();
    let settings = AveragingSettings::default().reject_outliers(false);
    let result = TranslationAveraging1dSfm::new(settings)
        .run(&input(&poses, &[(0, 8)]))
        .unwrap();
    let metrics = result.metrics.unwrap();
    assert_eq!(metrics.inlier_measurements, 36);
    assert_relative_eq!(metrics.precision.unwrap(), 35.0 / 36.0);
    assert_eq!(metrics.recall, Some(1.0));
    assert!(result.poses.iter().all(Option::is_some));
}

#[test]
fn camera_with_only_rejected_directions_has_no_pose() {
    let mut poses = grid();
    poses.push(CameraToWorld::from_parts(
        Vector3::new(3.0, 0.0, 0.0),
        Rotation3::from_euler_angles(0.2, -0.1, 0.7),
    ));
    let mut input = input(&poses[..9], &[]);
    input.num_images = 10;
    input.rotations.push(Some(poses[9].rotation()));
    input.ground_truth = Some(poses.iter().copied().map(Some).collect());
    // Camera 9 is claimed to be behind camera 0 and ahead of camera 8 along the grid diagonal, which contradicts
    // camera 8 lying ahead of camera 0. Every projection has to break one of the two.
    let diagonal = Vector3::new(1.0, 1.0, 0.0).normalize();
    let w_r_9 = poses[9].rotation();
    input
        .directions
        .insert((0, 9), Some(UnitVector3::new_normalize(w_r_9.inverse() * diagonal)));
    input
        .directions
        .insert((8, 9), Some(UnitVector3::new_normalize(w_r_9.inverse() * -diagonal)));

    let result = TranslationAveraging1dSfm::default().run(&input).unwrap();
    assert!(!result.inliers.camera_directions.contains_key(&(0, 9)));
    assert!(!result.inliers.camera_directions.contains_key(&(8, 9)));
    assert!(result.poses[9].is_none());
    assert!(result.poses[..9].iter().all(Option::is_some));

    let metrics = result.metrics.unwrap();
    assert_eq!(metrics.total_measurements, 38);
    assert_eq!(metrics.inlier_measurements, 36);
    // The rejected pairs entered rejection, so they count as outliers.
    assert_eq!(metrics.outlier_measurements, 2);
    assert_eq!(metrics.outlier_angular_errors_deg.len(), 2);
    assert_eq!(metrics.precision, Some(1.0));
    assert_eq!(metrics.recall, Some(1.0));
    assert_eq!(metrics.num_translations_estimated, 9);
    assert_eq!(metrics.translation_distance_errors.len(), 9);
    assert!(metrics.translation_distance_errors.max.unwrap() < 1e-3);
}

#[test]
fn camera_without_rotation_has_no_pose() {
    let poses = square();
    let mut input = input(&poses, &[]);
    input.rotations[3] = None;
    let result = TranslationAveraging1dSfm::default().run(&input).unwrap();
    assert!(result.poses[3].is_none());
    assert!(result.poses[..3].iter().all(Option::is_some));
    let metrics = result.metrics.unwrap();
    assert_eq!(metrics.total_measurements, 3);
    assert_eq!(metrics.num_translations_estimated, 3);
    assert!(metrics.translation_distance_errors.max.unwrap() < 1e-4);
}

#[test]
fn consistent_tracks_are_inliers() {
    let poses: Vec<_> = square()
        .iter()
        .map(|pose| CameraToWorld::from_parts(pose.translation(), Rotation3::identity()))
        .collect();
    let intrinsics = CameraIntrinsics::identity()
        .focal(500.0)
        .principal_point([320.0, 240.0].into());
    let landmarks = [
        Vector3::new(0.3, 0.2, 5.0),
        Vector3::new(-1.0, 0.5, 4.0),
        Vector3::new(2.0, -0.5, 6.0),
        Vector3::new(0.5, 2.0, 5.5),
    ];
    let tracks = landmarks
        .iter()
        .filter_map(|landmark| {
            let observations = poses
                .iter()
                .enumerate()
                .map(|(camera, pose)| {
                    let point = landmark - pose.translation();
                    let pixel = intrinsics.matrix() * (point / point.z);
                    TrackMeasurement {
                        camera,
                        keypoint: KeyPoint::new(pixel.x, pixel.y),
                    }
                })
                .collect();
            Track2d::new(observations)
        })
        .collect();
    let input = input(&poses, &[]).tracks(tracks, vec![Some(Calibration::from(intrinsics)); 4]);
    let result = TranslationAveraging1dSfm::default().run(&input).unwrap();
    assert_eq!(result.inliers.camera_directions.len(), 6);
    assert_eq!(result.inliers.landmark_directions.len(), 16);
    let metrics = result.metrics.unwrap();
    assert!(metrics.translation_distance_errors.max.unwrap() < 1e-3);
}

#[test]
fn hundred_cameras_with_tracks_are_recovered() {
    const CAMERAS: usize = 100;
    const LANDMARKS: usize = 300;

    let mut rng = Pcg64::seed_from_u64(3);
    let poses: Vec<_> = (0..CAMERAS)
        .map(|_| {
            CameraToWorld::from_parts(
                Vector3::new(rng.gen_range(-20.0..20.0), rng.gen_range(-20.0..20.0), rng.gen_range(-1.0..1.0)),
                Rotation3::from_euler_angles(0.0, 0.0, rng.gen_range(-3.0..3.0)),
            )
        })
        .collect();
    let landmarks: Vec<_> = (0..LANDMARKS)
        .map(|_| {
            Vector3::new(
                rng.gen_range(-25.0..25.0),
                rng.gen_range(-25.0..25.0),
                rng.gen_range(9.0..11.0),
            )
        })
        .collect();

    let mut directions = BTreeMap::new();
    for i1 in 0..CAMERAS {
        for i2 in (i1 + 1)..CAMERAS.min(i1 + 4) {
            directions.insert((i1, i2), poses[i1].relative_to(poses[i2]).unit_translation());
        }
    }
    let intrinsics = CameraIntrinsics::identity()
        .focal(500.0)
        .principal_point([320.0, 240.0].into());
    let tracks: Vec<_> = landmarks
        .iter()
        .filter_map(|landmark| {
            let first = rng.gen_range(0..CAMERAS);
            let observations = [0, 13, 37, 61]
                .iter()
                .map(|offset| {
                    let camera = (first + offset) % CAMERAS;
                    let point = poses[camera].rotation().inverse() * (landmark - poses[camera].translation());
                    let pixel = intrinsics.matrix() * (point / point.z);
                    TrackMeasurement {
                        camera,
                        keypoint: KeyPoint::new(pixel.x, pixel.y),
                    }
                })
                .collect();
            Track2d::new(observations)
        })
        .collect();
    assert_eq!(tracks.len(), LANDMARKS);

    let rotations = poses.iter().map(|pose| Some(pose.rotation())).collect();
    let input = AveragingInput::new(CAMERAS, directions, rotations)
        .tracks(tracks, vec![Some(Calibration::from(intrinsics)); CAMERAS])
        .ground_truth(poses.iter().copied().map(Some).collect());
    let settings = AveragingSettings::default().max_projection_directions(100);
    let result = TranslationAveraging1dSfm::new(settings).run(&input).unwrap();

    assert_eq!(result.inliers.camera_directions.len(), 3 * CAMERAS - 6);
    assert_eq!(result.inliers.landmark_directions.len(), 4 * LANDMARKS);
    assert!(result.poses.iter().all(Option::is_some));
    let metrics = result.metrics.unwrap();
    assert_eq!(metrics.num_translations_estimated, CAMERAS);
    assert!(metrics.translation_distance_errors.max.unwrap() < 1e-3);
}

#[test]
fn relative_prior_sets_scale() {
    let poses = square();
    let scaled: Vec<_> = poses
        .iter()
        .map(|pose| CameraToWorld::from_parts(pose.translation() * 3.0, pose.rotation()))
        .collect();
    let i2_t_i1: CameraToCamera = scaled[1].relative_to(scaled[2]);
    let mut relative_priors = BTreeMap::new();
    relative_priors.insert((1, 2), PosePrior::soft(i2_t_i1, 0.01));
    let input = input(&poses, &[]).relative_priors(relative_priors);
    let result = TranslationAveraging1dSfm::default().run(&input).unwrap();
    let w_t_1 = result.poses[1].unwrap().translation();
    let w_t_2 = result.poses[2].unwrap().translation();
    assert_relative_eq!((w_t_1 - w_t_2).norm(), 3.0, epsilon = 1e-3);
}

#[test]
fn zero_scale_collapses_translations() {
    let poses = square();
    let result = TranslationAveraging1dSfm::default()
        .run(&input(&poses, &[]).scale_factor(0.0))
        .unwrap();
    let w_t_0 = result.poses[0].unwrap().translation();
    for pose in &result.poses {
        assert_relative_eq!(pose.unwrap().translation(), w_t_0, epsilon = 1e-6);
    }
}

#[test]
fn invalid_inputs_are_rejected() {
    let poses = square();
    let averaging = TranslationAveraging1dSfm::default();

    let mut short = input(&poses, &[]);
    short.rotations.pop();
    assert!(matches!(
        averaging.run(&short),
        Err(AveragingError::LengthMismatch { what: "rotations", .. })
    ));

    assert_eq!(
        averaging.run(&input(&poses, &[]).scale_factor(-2.0)),
        Err(AveragingError::NegativeScaleFactor(-2.0))
    );

    let mut out_of_range = input(&poses, &[]);
    out_of_range
        .directions
        .insert((1, 7), Some(UnitVector3::new_normalize(Vector3::x())));
    assert_eq!(
        averaging.run(&out_of_range),
        Err(AveragingError::CameraOutOfRange {
            camera: 7,
            num_images: 4
        })
    );

    let mut wrong_ground_truth = input(&poses, &[]);
    wrong_ground_truth.ground_truth = Some(vec![None]);
    assert!(matches!(
        averaging.run(&wrong_ground_truth),
        Err(AveragingError::LengthMismatch { .. })
    ));
}
