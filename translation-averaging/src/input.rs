use crate::AveragingError;
use sfm_core::{
    nalgebra::{Rotation3, UnitVector3},
    CameraToCamera, CameraToWorld, PosePrior, Track2d,
};
use sfm_pinhole::Calibration;
use std::collections::BTreeMap;

/// Everything a single averaging run consumes.
///
/// Only the relative directions and the rotations are required. The rest default to empty, and the scale
/// factor defaults to `1`.
#[derive(Debug, Clone, PartialEq)]
pub struct AveragingInput {
    pub num_images: usize,
    /// `i2Ui1` for every camera pair `(i1, i2)`, in the frame of camera `i2`.
    pub directions: BTreeMap<(usize, usize), Option<UnitVector3<f64>>>,
    /// `wRi` for every camera.
    pub rotations: Vec<Option<Rotation3<f64>>>,
    pub tracks: Vec<Track2d>,
    /// Intrinsics for every camera. Required when tracks are used.
    pub intrinsics: Vec<Option<Calibration>>,
    /// Either empty or one entry per camera.
    pub absolute_priors: Vec<Option<PosePrior<CameraToWorld>>>,
    /// `i2Ti1` priors keyed by `(i1, i2)`.
    pub relative_priors: BTreeMap<(usize, usize), PosePrior<CameraToCamera>>,
    pub scale_factor: f64,
    /// Ground truth `wTi` for every camera, used only to compute metrics.
    pub ground_truth: Option<Vec<Option<CameraToWorld>>>,
}

impl AveragingInput {
    pub fn new(
        num_images: usize,
        directions: BTreeMap<(usize, usize), Option<UnitVector3<f64>>>,
        rotations: Vec<Option<Rotation3<f64>>>,
    ) -> Self {
        Self {
            num_images,
            directions,
            rotations,
            tracks: vec![],
            intrinsics: vec![],
            absolute_priors: vec![],
            relative_priors: BTreeMap::new(),
            scale_factor: 1.0,
            ground_truth: None,
        }
    }

    #[must_use]
    pub fn tracks(self, tracks: Vec<Track2d>, intrinsics: Vec<Option<Calibration>>) -> Self {
        Self {
            tracks,
            intrinsics,
            ..self
        }
    }

    #[must_use]
    pub fn absolute_priors(self, absolute_priors: Vec<Option<PosePrior<CameraToWorld>>>) -> Self {
        Self {
            absolute_priors,
            ..self
        }
    }

    #[must_use]
    pub fn relative_priors(
        self,
        relative_priors: BTreeMap<(usize, usize), PosePrior<CameraToCamera>>,
    ) -> Self {
        Self {
            relative_priors,
            ..self
        }
    }

    #[must_use]
    pub fn scale_factor(self, scale_factor: f64) -> Self {
        Self {
            scale_factor,
            ..self
        }
    }

    #[must_use]
    pub fn ground_truth(self, ground_truth: Vec<Option<CameraToWorld>>) -> Self {
        Self {
            ground_truth: Some(ground_truth),
            ..self
        }
    }

    /// Checks lengths, camera indices, and the scale factor.
    ///
    /// Intrinsics are only checked against the rotations when `use_tracks` is set and there are tracks.
    pub fn validate(&self, use_tracks: bool) -> Result<(), AveragingError> {
        let n = self.num_images;
        check_length("rotations", n, self.rotations.len())?;
        if use_tracks && !self.tracks.is_empty() {
            check_length("intrinsics", self.rotations.len(), self.intrinsics.len())?;
        }
        if !self.absolute_priors.is_empty() {
            check_length("absolute priors", n, self.absolute_priors.len())?;
        }
        if let Some(ground_truth) = &self.ground_truth {
            check_length("ground truth poses", n, ground_truth.len())?;
        }
        if self.scale_factor.is_nan() || self.scale_factor < 0.0 {
            return Err(AveragingError::NegativeScaleFactor(self.scale_factor));
        }

        let pairs = self.directions.keys().chain(self.relative_priors.keys());
        for &(i1, i2) in pairs {
            check_camera(i1, n)?;
            check_camera(i2, n)?;
        }
        if use_tracks {
            for track in &self.tracks {
                for camera in track.cameras() {
                    check_camera(camera, n)?;
                }
            }
        }
        Ok(())
    }
}

fn check_length(what: &'static str, expected: usize, actual: usize) -> Result<(), AveragingError> {
    if expected == actual {
        Ok(())
    } else {
        Err(AveragingError::LengthMismatch {
            what,
            expected,
            actual,
        })
    }
}

fn check_camera(camera: usize, num_images: usize) -> Result<(), AveragingError> {
    if camera < num_images {
        Ok(())
    } else {
        Err(AveragingError::CameraOutOfRange { camera, num_images })
    }
}
