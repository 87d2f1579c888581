use crate::{align_poses_sim3_ignore_missing, Inliers, RelativeDirections};
use average::{Max, Mean, Min};
use float_ord::FloatOrd;
use itertools::Itertools;
use sfm_core::{
    nalgebra::{Rotation3, UnitVector3},
    CameraToWorld, Pose,
};

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// Summary statistics of a set of error values.
///
/// Every statistic is `None` when there are no values.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorDistribution {
    pub values: Vec<f64>,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl ErrorDistribution {
    pub fn new(values: Vec<f64>) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        let mean: Mean = values.iter().copied().collect();
        let min: Min = values.iter().copied().collect();
        let max: Max = values.iter().copied().collect();
        let sorted = values.iter().copied().sorted_by_key(|&v| FloatOrd(v)).collect_vec();
        let mid = sorted.len() / 2;
        let median = if sorted.len() % 2 == 0 {
            0.5 * (sorted[mid - 1] + sorted[mid])
        } else {
            sorted[mid]
        };
        Self {
            mean: Some(mean.mean()),
            median: Some(median),
            min: Some(min.min()),
            max: Some(max.max()),
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Quality of a translation averaging run measured against ground truth poses.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationAveragingMetrics {
    /// Camera to camera directions that had both rotations available.
    pub total_measurements: usize,
    pub inlier_measurements: usize,
    pub outlier_measurements: usize,
    /// Measurements with a larger angular error than this are considered true outliers.
    pub angular_error_threshold_deg: f64,
    /// Fraction of the inliers that are true inliers.
    pub precision: Option<f64>,
    /// Fraction of the true inliers that were kept as inliers.
    pub recall: Option<f64>,
    pub num_translations_estimated: usize,
    /// Angle between each inlier measurement and its ground truth direction.
    pub inlier_angular_errors_deg: ErrorDistribution,
    /// Angle between each outlier measurement and its ground truth direction.
    pub outlier_angular_errors_deg: ErrorDistribution,
    /// Angle between the estimated and ground truth relative directions on the measured pairs.
    pub relative_translation_angle_errors_deg: ErrorDistribution,
    /// Distance between each camera center after Sim(3) alignment and its ground truth.
    pub translation_distance_errors: ErrorDistribution,
}

/// Angle in degrees between two unit vectors.
///
/// ```
/// use translation_averaging::angle_between_deg;
/// use sfm_core::nalgebra::{UnitVector3, Vector3};
/// let angle = angle_between_deg(&Vector3::x_axis(), &Vector3::y_axis());
/// assert!((angle - 90.0).abs() < 1e-12);
/// ```
pub fn angle_between_deg(a: &UnitVector3<f64>, b: &UnitVector3<f64>) -> f64 {
    a.cross(b).norm().atan2(a.dot(b)).to_degrees()
}

fn ground_truth_direction(
    ground_truth: &[Option<CameraToWorld>],
    i1: usize,
    i2: usize,
) -> Option<UnitVector3<f64>> {
    let w_t_i1 = (*ground_truth.get(i1)?)?;
    let w_t_i2 = (*ground_truth.get(i2)?)?;
    w_t_i1.relative_to(w_t_i2).unit_translation()
}

/// Computes the metrics of an averaging run.
///
/// `w_i2_u_i1` are the world frame directions that entered outlier rejection. Anything in it that is not among
/// the `inliers` is an outlier. Measurements are compared with ground truth in the frame of camera `i2` using the
/// input rotations `w_r_i`, so the ground truth does not need to share a world frame with the estimate.
pub fn compute_metrics(
    w_i2_u_i1: &RelativeDirections,
    inliers: &Inliers,
    w_r_i: &[Option<Rotation3<f64>>],
    estimated: &[Option<CameraToWorld>],
    ground_truth: &[Option<CameraToWorld>],
    angular_error_threshold_deg: f64,
) -> TranslationAveragingMetrics {
    let mut inlier_errors = vec![];
    let mut outlier_errors = vec![];
    for (&(i1, i2), w_direction) in w_i2_u_i1 {
        let w_r_i2 = match w_r_i.get(i2) {
            Some(&Some(rotation)) => rotation,
            _ => continue,
        };
        let gt = match ground_truth_direction(ground_truth, i1, i2) {
            Some(gt) => gt,
            None => continue,
        };
        let measured = w_r_i2.inverse() * *w_direction;
        let error = angle_between_deg(&measured, &gt);
        if inliers.camera_directions.contains_key(&(i1, i2)) {
            inlier_errors.push(error);
        } else {
            outlier_errors.push(error);
        }
    }

    let true_positives = inlier_errors
        .iter()
        .filter(|&&error| error < angular_error_threshold_deg)
        .count();
    let false_positives = inlier_errors.len() - true_positives;
    let false_negatives = outlier_errors
        .iter()
        .filter(|&&error| error < angular_error_threshold_deg)
        .count();
    let ratio = |numerator: usize, denominator: usize| {
        (denominator > 0).then(|| numerator as f64 / denominator as f64)
    };

    let (aligned, _) = align_poses_sim3_ignore_missing(ground_truth, estimated);
    let relative_errors = w_i2_u_i1
        .keys()
        .filter_map(|&(i1, i2)| {
            let estimate = ground_truth_direction(&aligned, i1, i2)?;
            let gt = ground_truth_direction(ground_truth, i1, i2)?;
            Some(angle_between_deg(&estimate, &gt))
        })
        .collect();
    let distance_errors = aligned
        .iter()
        .zip(ground_truth)
        .filter_map(|(&estimate, &gt)| Some((estimate?.translation() - gt?.translation()).norm()))
        .collect();

    let total_measurements = w_i2_u_i1.len();
    let inlier_measurements = inliers
        .camera_directions
        .keys()
        .filter(|key| w_i2_u_i1.contains_key(key))
        .count();
    TranslationAveragingMetrics {
        total_measurements,
        inlier_measurements,
        outlier_measurements: total_measurements - inlier_measurements,
        angular_error_threshold_deg,
        precision: ratio(true_positives, true_positives + false_positives),
        recall: ratio(true_positives, true_positives + false_negatives),
        num_translations_estimated: estimated.iter().filter(|pose| pose.is_some()).count(),
        inlier_angular_errors_deg: ErrorDistribution::new(inlier_errors),
        outlier_angular_errors_deg: ErrorDistribution::new(outlier_errors),
        relative_translation_angle_errors_deg: ErrorDistribution::new(relative_errors),
        translation_distance_errors: ErrorDistribution::new(distance_errors),
    }
}
