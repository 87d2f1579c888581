use serde::{Deserialize, Serialize};
use sfm_core::{
    nalgebra::{Matrix3, Point2, Rotation3, UnitVector3, Vector2, Vector3},
    CameraToCamera, CameraToWorld, KeyPoint, Pose, PosePrior, Track2d, TrackMeasurement,
};
use sfm_pinhole::{Calibration, CameraIntrinsics, CameraIntrinsicsK1Distortion};
use std::collections::BTreeMap;
use thiserror::Error;
use translation_averaging::{AveragingInput, AveragingResult, TranslationAveragingMetrics};

#[derive(Debug, Error)]
pub enum ProblemError {
    #[error("direction between {i1} and {i2} has zero length")]
    ZeroDirection { i1: usize, i2: usize },
    #[error("track {0} has more than one observation from the same camera")]
    DuplicateCamera(usize),
}

/// A row-major rotation matrix and a translation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoseEntry {
    pub rotation: [f64; 9],
    pub translation: [f64; 3],
}

impl PoseEntry {
    pub fn to_pose<P: Pose>(self) -> P {
        P::from_parts(Vector3::from(self.translation), rotation(self.rotation))
    }

    pub fn from_pose<P: Pose>(pose: P) -> Self {
        let matrix = pose.rotation().into_inner();
        let mut rotation = [0.0; 9];
        for (ix, value) in rotation.iter_mut().enumerate() {
            *value = matrix[(ix / 3, ix % 3)];
        }
        Self {
            rotation,
            translation: pose.translation().into(),
        }
    }
}

/// The measured `i2Ui1`. A missing direction is `null`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DirectionEntry {
    pub i1: usize,
    pub i2: usize,
    pub direction: Option<[f64; 3]>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObservationEntry {
    pub camera: usize,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntrinsicsEntry {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
    #[serde(default)]
    pub skew: f64,
    /// Radial distortion. Zero means a plain pinhole camera.
    #[serde(default)]
    pub k1: f64,
}

impl From<IntrinsicsEntry> for Calibration {
    fn from(entry: IntrinsicsEntry) -> Self {
        let intrinsics = CameraIntrinsics {
            focals: Vector2::new(entry.fx, entry.fy),
            principal_point: Point2::new(entry.cx, entry.cy),
            skew: entry.skew,
        };
        if entry.k1 == 0.0 {
            intrinsics.into()
        } else {
            CameraIntrinsicsK1Distortion::new(intrinsics, entry.k1).into()
        }
    }
}

/// A pose prior. Without a `sigma` the prior is hard.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriorEntry {
    pub pose: PoseEntry,
    #[serde(default)]
    pub sigma: Option<f64>,
}

impl PriorEntry {
    fn to_prior<P: Pose>(self) -> PosePrior<P> {
        let value = self.pose.to_pose();
        match self.sigma {
            Some(sigma) => PosePrior::soft(value, sigma),
            None => PosePrior::hard(value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RelativePriorEntry {
    pub i1: usize,
    pub i2: usize,
    #[serde(flatten)]
    pub prior: PriorEntry,
}

/// A translation averaging problem as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Problem {
    pub num_images: usize,
    /// `wRi` for every camera, row-major.
    pub rotations: Vec<Option<[f64; 9]>>,
    pub directions: Vec<DirectionEntry>,
    #[serde(default)]
    pub tracks: Vec<Vec<ObservationEntry>>,
    #[serde(default)]
    pub intrinsics: Vec<Option<IntrinsicsEntry>>,
    #[serde(default)]
    pub relative_priors: Vec<RelativePriorEntry>,
    #[serde(default)]
    pub absolute_priors: Vec<Option<PriorEntry>>,
    #[serde(default = "default_scale_factor")]
    pub scale_factor: f64,
    #[serde(default)]
    pub ground_truth: Option<Vec<Option<PoseEntry>>>,
}

fn default_scale_factor() -> f64 {
    1.0
}

fn rotation(row_major: [f64; 9]) -> Rotation3<f64> {
    Rotation3::from_matrix(&Matrix3::from_row_slice(&row_major))
}

impl Problem {
    pub fn into_input(self) -> Result<AveragingInput, ProblemError> {
        let mut directions = BTreeMap::new();
        for entry in &self.directions {
            let direction = match entry.direction {
                Some(direction) => Some(
                    UnitVector3::try_new(Vector3::from(direction), f64::EPSILON).ok_or(
                        ProblemError::ZeroDirection {
                            i1: entry.i1,
                            i2: entry.i2,
                        },
                    )?,
                ),
                None => None,
            };
            directions.insert((entry.i1, entry.i2), direction);
        }
        let rotations = self.rotations.iter().map(|r| r.map(rotation)).collect();

        let tracks = self
            .tracks
            .iter()
            .enumerate()
            .map(|(track_id, observations)| {
                let observations = observations
                    .iter()
                    .map(|o| TrackMeasurement {
                        camera: o.camera,
                        keypoint: KeyPoint::new(o.x, o.y),
                    })
                    .collect();
                Track2d::new(observations).ok_or(ProblemError::DuplicateCamera(track_id))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let intrinsics = self.intrinsics.iter().map(|i| i.map(Calibration::from)).collect();

        let relative_priors: BTreeMap<(usize, usize), PosePrior<CameraToCamera>> = self
            .relative_priors
            .iter()
            .map(|entry| ((entry.i1, entry.i2), entry.prior.to_prior()))
            .collect();
        let absolute_priors: Vec<Option<PosePrior<CameraToWorld>>> = self
            .absolute_priors
            .iter()
            .map(|prior| prior.map(PriorEntry::to_prior))
            .collect();

        let mut input = AveragingInput::new(self.num_images, directions, rotations)
            .tracks(tracks, intrinsics)
            .relative_priors(relative_priors)
            .absolute_priors(absolute_priors)
            .scale_factor(self.scale_factor);
        if let Some(ground_truth) = &self.ground_truth {
            input = input.ground_truth(
                ground_truth
                    .iter()
                    .map(|pose| pose.map(PoseEntry::to_pose))
                    .collect(),
            );
        }
        Ok(input)
    }
}

/// What the sandbox writes out after a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    /// `wTi` for every camera, `null` where no translation was estimated.
    pub poses: Vec<Option<PoseEntry>>,
    /// The `(i1, i2)` pairs kept as inliers.
    pub inlier_directions: Vec<(usize, usize)>,
    pub metrics: Option<TranslationAveragingMetrics>,
}

impl From<AveragingResult> for Solution {
    fn from(result: AveragingResult) -> Self {
        Self {
            poses: result
                .poses
                .iter()
                .map(|pose| pose.map(PoseEntry::from_pose))
                .collect(),
            inlier_directions: result.inliers.camera_directions.keys().copied().collect(),
            metrics: result.metrics,
        }
    }
}
