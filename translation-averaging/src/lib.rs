//! # Translation Averaging
//!
//! Estimates the global position of every camera from pairwise translation directions and known global
//! rotations with 1DSfM.
//!
//! The pipeline has four stages:
//!
//! 1. Rotate every relative direction `i2Ui1` into the world frame. When tracks are used, the longest tracks
//!    also contribute a direction from each observing camera towards the landmark.
//! 2. Project every direction onto many sampled 1-D directions and order the nodes along each projection with
//!    [`mfas::Mfas`]. Directions that frequently disagree with the ordering are outliers.
//! 3. Solve for translations from the inliers with [`translation_recovery::TranslationRecovery`].
//! 4. Optionally compare the result against ground truth after a Sim(3) alignment.
//!
//! ```
//! use sfm_core::nalgebra::{Rotation3, UnitVector3, Vector3};
//! use std::collections::BTreeMap;
//! use translation_averaging::{AveragingInput, AveragingSettings, TranslationAveraging1dSfm};
//!
//! let centers = [
//!     Vector3::new(0.0, 0.0, 0.0),
//!     Vector3::new(1.0, 0.0, 0.0),
//!     Vector3::new(1.0, 1.0, 0.0),
//! ];
//! let mut directions = BTreeMap::new();
//! for &(i1, i2) in &[(0, 1), (1, 2), (0, 2)] {
//!     let w_i2_u_i1 = UnitVector3::new_normalize(centers[i1] - centers[i2]);
//!     directions.insert((i1, i2), Some(w_i2_u_i1));
//! }
//! let input = AveragingInput::new(3, directions, vec![Some(Rotation3::identity()); 3]);
//! let result = TranslationAveraging1dSfm::new(AveragingSettings::default())
//!     .run(&input)
//!     .unwrap();
//! assert!(result.poses.iter().all(Option::is_some));
//! ```

mod align;
mod error;
mod graph;
mod input;
mod measurements;
mod metrics;
mod outliers;
mod recovery;
mod sampling;
mod settings;
mod tracks;

pub use align::*;
pub use error::*;
pub use graph::Node;
pub use input::*;
pub use measurements::*;
pub use metrics::*;
pub use outliers::*;
pub use sampling::*;
pub use settings::*;
pub use tracks::*;

use log::*;
use rand::SeedableRng;
use rand_pcg::Pcg64;
use recovery::recover_translations;
use sfm_core::{CameraToWorld, Pose};

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// The outcome of [`TranslationAveraging1dSfm::run`].
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct AveragingResult {
    /// `wTi` for every camera that has a rotation and was connected to the solved component.
    pub poses: Vec<Option<CameraToWorld>>,
    /// The measurements that survived outlier rejection and were passed to translation recovery.
    #[cfg_attr(feature = "serde-serialize", serde(skip))]
    pub inliers: Inliers,
    /// Present when the input carries ground truth.
    pub metrics: Option<TranslationAveragingMetrics>,
}

/// Outlier-robust translation averaging.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TranslationAveraging1dSfm {
    /// Controls track selection, outlier rejection and the robust noise of translation recovery.
    pub settings: AveragingSettings,
}

impl TranslationAveraging1dSfm {
    pub fn new(settings: AveragingSettings) -> Self {
        Self { settings }
    }

    /// Estimates a global pose for every camera in `input`.
    ///
    /// Runs with the same settings and input always produce the same result, with or without the `rayon` feature.
    ///
    /// Fails with [`AveragingError::Recovery`] when the inlier measurements leave a translation unconstrained.
    pub fn run(&self, input: &AveragingInput) -> Result<AveragingResult, AveragingError> {
        let settings = &self.settings;
        input.validate(settings.use_tracks_for_averaging)?;

        let (w_i2_u_i1, valid_cameras) =
            get_valid_measurements_in_world_frame(&input.directions, &input.rotations);
        info!(
            "{} of {} relative directions have both rotations",
            w_i2_u_i1.len(),
            input.directions.len()
        );

        let w_c_u_l = if !settings.use_tracks_for_averaging {
            LandmarkDirections::new()
        } else if input.tracks.is_empty() {
            info!("no tracks were given, averaging with camera directions only");
            LandmarkDirections::new()
        } else {
            let tracks = select_tracks_for_averaging(
                &input.tracks,
                &valid_cameras,
                &input.intrinsics,
                settings.tracks_to_cameras_ratio,
            );
            debug!(
                "selected {} of {} tracks for averaging",
                tracks.len(),
                input.tracks.len()
            );
            get_landmark_directions(&tracks, &input.intrinsics, &input.rotations)?
        };

        let mut rng = Pcg64::seed_from_u64(settings.seed);
        let inliers = compute_inliers(settings, &w_i2_u_i1, &w_c_u_l, &mut rng);

        let w_t_i = recover_translations(
            settings,
            input.num_images,
            &inliers,
            &input.rotations,
            &input.relative_priors,
            &input.absolute_priors,
            input.scale_factor,
        )?;
        let poses: Vec<Option<CameraToWorld>> = w_t_i
            .iter()
            .zip(&input.rotations)
            .map(|(&translation, &rotation)| Some(CameraToWorld::from_parts(translation?, rotation?)))
            .collect();
        info!(
            "estimated translations for {} of {} cameras",
            poses.iter().filter(|pose| pose.is_some()).count(),
            input.num_images
        );

        let metrics = input.ground_truth.as_ref().map(|ground_truth| {
            compute_metrics(
                &w_i2_u_i1,
                &inliers,
                &input.rotations,
                &poses,
                ground_truth,
                settings.max_inlier_measurement_error_deg,
            )
        });

        Ok(AveragingResult {
            poses,
            inliers,
            metrics,
        })
    }
}
