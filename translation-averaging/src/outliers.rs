use crate::graph::{direction_measurements, Node, NodeIndex};
use crate::{sample_projection_directions, AveragingSettings, LandmarkDirections, RelativeDirections};
use log::*;
use mfas::Mfas;
use rand::Rng;
use sfm_core::nalgebra::UnitVector3;
use std::collections::BTreeSet;
use translation_recovery::DirectionMeasurement;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// The measurements that survived outlier rejection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Inliers {
    /// Inlier camera to camera directions, keyed like the input.
    pub camera_directions: RelativeDirections,
    /// Inlier camera to landmark directions, keyed like the input.
    pub landmark_directions: LandmarkDirections,
    /// Every camera with at least one inlier camera to camera direction.
    pub cameras: BTreeSet<usize>,
}

impl Inliers {
    /// Treats every measurement as an inlier.
    pub fn all(w_i2_u_i1: &RelativeDirections, w_c_u_l: &LandmarkDirections) -> Self {
        Self {
            camera_directions: w_i2_u_i1.clone(),
            landmark_directions: w_c_u_l.clone(),
            cameras: w_i2_u_i1.keys().flat_map(|&(i1, i2)| [i1, i2]).collect(),
        }
    }
}

/// Classifies camera to camera and camera to landmark directions as inliers or outliers with 1DSfM.
///
/// Every measurement is projected onto a set of sampled 1-D directions and scored by [`Mfas`] for each of them.
/// Measurements whose average outlier weight is below the threshold are inliers. A landmark direction is only
/// kept when its camera also has an inlier camera to camera direction.
pub fn compute_inliers<R: Rng + ?Sized>(
    settings: &AveragingSettings,
    w_i2_u_i1: &RelativeDirections,
    w_c_u_l: &LandmarkDirections,
    rng: &mut R,
) -> Inliers {
    if !settings.reject_outliers {
        debug!("outlier rejection is disabled, keeping every measurement");
        return Inliers::all(w_i2_u_i1, w_c_u_l);
    }

    let mut index = NodeIndex::default();
    let measurements = direction_measurements(&mut index, w_i2_u_i1, w_c_u_l);
    let combined: Vec<UnitVector3<f64>> = measurements.iter().map(|m| m.measured).collect();
    let directions = sample_projection_directions(
        settings.projection_sampling_method,
        &combined,
        settings.max_projection_directions,
        rng,
    );
    let weights = average_outlier_weights(&measurements, &directions);
    debug!(
        "computed outlier weights of {} measurements over {} projections",
        measurements.len(),
        directions.len()
    );

    let inliers = classify(
        &index,
        &measurements,
        &weights,
        settings.outlier_weight_threshold,
        w_i2_u_i1,
        w_c_u_l,
    );
    info!(
        "1DSfM kept {} of {} camera directions and {} of {} landmark directions",
        inliers.camera_directions.len(),
        w_i2_u_i1.len(),
        inliers.landmark_directions.len(),
        w_c_u_l.len()
    );
    inliers
}

/// Projection directions scored by one task before its sums are merged.
const DIRECTIONS_PER_CHUNK: usize = 32;

/// Averages the [`Mfas`] outlier weight of every measurement over every projection direction.
///
/// The weights are returned in the order of `measurements`. Without any projection direction every weight is `0`.
pub fn average_outlier_weights(
    measurements: &[DirectionMeasurement<usize>],
    directions: &[UnitVector3<f64>],
) -> Vec<f64> {
    let num_measurements = measurements.len();
    let weights = |direction: &UnitVector3<f64>| {
        Mfas::new(measurements, &direction.into_inner()).compute_outlier_weights()
    };
    let accumulate = |mut sums: Vec<f64>, weights: Vec<f64>| {
        for (sum, weight) in sums.iter_mut().zip(weights) {
            *sum += weight;
        }
        sums
    };

    // Chunks are summed in order, so the result does not depend on the number of threads.
    let chunk_sums = |chunk: &[UnitVector3<f64>]| {
        chunk
            .iter()
            .map(weights)
            .fold(vec![0.0; num_measurements], accumulate)
    };
    #[cfg(not(feature = "rayon"))]
    let partial: Vec<Vec<f64>> = directions.chunks(DIRECTIONS_PER_CHUNK).map(chunk_sums).collect();
    #[cfg(feature = "rayon")]
    let partial: Vec<Vec<f64>> = directions.par_chunks(DIRECTIONS_PER_CHUNK).map(chunk_sums).collect();
    let sums = partial
        .into_iter()
        .fold(vec![0.0; num_measurements], accumulate);

    if directions.is_empty() {
        return sums;
    }
    let num_directions = directions.len() as f64;
    sums.into_iter().map(|sum| sum / num_directions).collect()
}

/// Maps the inlier measurements back from solver keys to the input keys.
fn classify(
    index: &NodeIndex,
    measurements: &[DirectionMeasurement<usize>],
    weights: &[f64],
    threshold: f64,
    w_i2_u_i1: &RelativeDirections,
    w_c_u_l: &LandmarkDirections,
) -> Inliers {
    let inlier_keys: BTreeSet<(usize, usize)> = measurements
        .iter()
        .zip(weights)
        .filter(|&(_, &weight)| weight < threshold)
        .map(|(m, _)| (m.key1, m.key2))
        .collect();
    let is_inlier = |from: Node, to: Node| match (index.key(from), index.key(to)) {
        (Some(from), Some(to)) => inlier_keys.contains(&(from, to)),
        _ => false,
    };

    let mut inliers = Inliers::default();
    for (&(i1, i2), &direction) in w_i2_u_i1 {
        // The measurement runs from i2 to i1.
        if is_inlier(Node::Camera(i2), Node::Camera(i1)) {
            inliers.camera_directions.insert((i1, i2), direction);
            inliers.cameras.insert(i1);
            inliers.cameras.insert(i2);
        }
    }
    for (&(track_id, camera), &direction) in w_c_u_l {
        if inliers.cameras.contains(&camera) && is_inlier(Node::Camera(camera), Node::Landmark(track_id)) {
            inliers.landmark_directions.insert((track_id, camera), direction);
        }
    }
    inliers
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;
    use quickcheck_macros::quickcheck;
    use rand::SeedableRng;
    use rand_pcg::Pcg64;
    use sfm_core::nalgebra::Vector3;

    /// A 3x3 grid of cameras with every pair measured and the direction between the two corners flipped.
    fn flipped_grid() -> RelativeDirections {
        let position = |ix: usize| Vector3::new((ix % 3) as f64, (ix / 3) as f64, 0.0);
        let mut w_i2_u_i1 = RelativeDirections::new();
        for i1 in 0..9 {
            for i2 in (i1 + 1)..9 {
                let mut direction = position(i1) - position(i2);
                if (i1, i2) == (0, 8) {
                    direction = -direction;
                }
                w_i2_u_i1.insert((i1, i2), UnitVector3::new_normalize(direction));
            }
        }
        w_i2_u_i1
    }

    fn scored_grid() -> (NodeIndex, Vec<DirectionMeasurement<usize>>, Vec<f64>) {
        let mut index = NodeIndex::default();
        let measurements = direction_measurements(&mut index, &flipped_grid(), &LandmarkDirections::new());
        let mut rng = Pcg64::seed_from_u64(0);
        let directions = crate::sample_random_directions(200, &mut rng);
        let weights = average_outlier_weights(&measurements, &directions);
        (index, measurements, weights)
    }

    #[test]
    fn flipped_direction_is_rejected() {
        let mut rng = Pcg64::seed_from_u64(0);
        let w_i2_u_i1 = flipped_grid();
        let inliers = compute_inliers(
            &AveragingSettings::default(),
            &w_i2_u_i1,
            &LandmarkDirections::new(),
            &mut rng,
        );
        assert!(!inliers.camera_directions.contains_key(&(0, 8)));
        assert_eq!(inliers.camera_directions.len(), w_i2_u_i1.len() - 1);
        assert_eq!(inliers.cameras.len(), 9);
    }

    #[test]
    fn averaged_weights_are_reproducible() {
        let (_, measurements, weights) = scored_grid();
        let mut rng = Pcg64::seed_from_u64(0);
        let directions = crate::sample_random_directions(200, &mut rng);
        for _ in 0..4 {
            assert_eq!(average_outlier_weights(&measurements, &directions), weights);
        }
        let per_direction: Vec<Vec<f64>> = directions
            .iter()
            .map(|direction| Mfas::new(&measurements, &direction.into_inner()).compute_outlier_weights())
            .collect();
        for (ix, weight) in weights.iter().enumerate() {
            let mean = per_direction.iter().map(|weights| weights[ix]).sum::<f64>() / directions.len() as f64;
            assert_relative_eq!(*weight, mean, epsilon = 1e-12);
        }
    }

    #[test]
    fn disabled_rejection_keeps_everything() {
        let mut rng = Pcg64::seed_from_u64(0);
        let w_i2_u_i1 = flipped_grid();
        let inliers = compute_inliers(
            &AveragingSettings::default().reject_outliers(false),
            &w_i2_u_i1,
            &LandmarkDirections::new(),
            &mut rng,
        );
        assert_eq!(inliers.camera_directions, w_i2_u_i1);
    }

    #[test]
    fn landmarks_need_an_inlier_camera() {
        let direction = UnitVector3::new_normalize(Vector3::z());
        let mut w_i2_u_i1 = RelativeDirections::new();
        w_i2_u_i1.insert((0, 1), UnitVector3::new_normalize(Vector3::x()));
        let mut w_c_u_l = LandmarkDirections::new();
        for camera in 0..3 {
            w_c_u_l.insert((0, camera), direction);
        }
        let mut index = NodeIndex::default();
        let measurements = direction_measurements(&mut index, &w_i2_u_i1, &w_c_u_l);
        let weights = vec![0.0; measurements.len()];
        let inliers = classify(&index, &measurements, &weights, 0.125, &w_i2_u_i1, &w_c_u_l);
        assert_eq!(inliers.landmark_directions.len(), 2);
        assert!(!inliers.landmark_directions.contains_key(&(0, 2)));
        assert!(inliers
            .landmark_directions
            .keys()
            .all(|(_, camera)| inliers.cameras.contains(camera)));
    }

    #[test]
    fn no_measurements_have_no_inliers() {
        let mut rng = Pcg64::seed_from_u64(0);
        let inliers = compute_inliers(
            &AveragingSettings::default(),
            &RelativeDirections::new(),
            &LandmarkDirections::new(),
            &mut rng,
        );
        assert_eq!(inliers, Inliers::default());
    }

    #[quickcheck]
    fn raising_threshold_never_loses_inliers(a: u16, b: u16) -> bool {
        let (low, high) = (f64::from(a.min(b)) / 1000.0, f64::from(a.max(b)) / 1000.0);
        let (index, measurements, weights) = scored_grid();
        let w_i2_u_i1 = flipped_grid();
        let landmarks = LandmarkDirections::new();
        let count = |threshold| {
            classify(&index, &measurements, &weights, threshold, &w_i2_u_i1, &landmarks)
                .camera_directions
                .len()
        };
        count(low) <= count(high)
    }
}
