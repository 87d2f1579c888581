use crate::AveragingError;
use std::{fmt, str::FromStr};

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// How the 1-D projection directions used for outlier rejection are chosen.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[cfg_attr(
    feature = "serde-serialize",
    serde(rename_all = "SCREAMING_SNAKE_CASE")
)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ProjectionSamplingMethod {
    /// Draw directions from the measurements themselves, without replacement.
    SampleInputMeasurements,
    /// Fit a kernel density to the measurements and sample from it.
    SampleWithInputDensity,
    /// Sample directions uniformly over the sphere.
    SampleWithUniformDensity,
}

impl ProjectionSamplingMethod {
    pub fn name(self) -> &'static str {
        match self {
            Self::SampleInputMeasurements => "SAMPLE_INPUT_MEASUREMENTS",
            Self::SampleWithInputDensity => "SAMPLE_WITH_INPUT_DENSITY",
            Self::SampleWithUniformDensity => "SAMPLE_WITH_UNIFORM_DENSITY",
        }
    }
}

impl fmt::Display for ProjectionSamplingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ProjectionSamplingMethod {
    type Err = AveragingError;

    /// ```
    /// use translation_averaging::ProjectionSamplingMethod;
    /// let method: ProjectionSamplingMethod = "SAMPLE_WITH_INPUT_DENSITY".parse().unwrap();
    /// assert_eq!(method, ProjectionSamplingMethod::SampleWithInputDensity);
    /// assert!("SAMPLE_NOTHING".parse::<ProjectionSamplingMethod>().is_err());
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            Self::SampleInputMeasurements,
            Self::SampleWithInputDensity,
            Self::SampleWithUniformDensity,
        ]
        .into_iter()
        .find(|method| method.name().eq_ignore_ascii_case(s))
        .ok_or_else(|| AveragingError::UnsupportedSamplingMethod(s.to_owned()))
    }
}

/// The settings for 1DSfM translation averaging.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct AveragingSettings {
    /// The maximum number of 1-D projections used to score measurements
    #[cfg_attr(
        feature = "serde-serialize",
        serde(default = "default_max_projection_directions")
    )]
    pub max_projection_directions: usize,
    /// Measurements whose average outlier weight is at or above this are rejected
    #[cfg_attr(
        feature = "serde-serialize",
        serde(default = "default_outlier_weight_threshold")
    )]
    pub outlier_weight_threshold: f64,
    /// The standard deviation of the chordal error of every direction measurement
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_noise_sigma"))]
    pub noise_sigma: f64,
    /// The Huber threshold, in standard deviations, of the robust direction noise
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_huber_k"))]
    pub huber_k: f64,
    /// Whether direction measurements use a Huber loss during translation recovery
    #[cfg_attr(
        feature = "serde-serialize",
        serde(default = "default_robust_measurement_noise")
    )]
    pub robust_measurement_noise: bool,
    /// Whether camera to landmark directions from feature tracks augment the measurement graph
    #[cfg_attr(
        feature = "serde-serialize",
        serde(default = "default_use_tracks_for_averaging")
    )]
    pub use_tracks_for_averaging: bool,
    /// Whether to run 1DSfM outlier rejection at all
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_reject_outliers"))]
    pub reject_outliers: bool,
    /// How projection directions are sampled
    #[cfg_attr(
        feature = "serde-serialize",
        serde(default = "default_projection_sampling_method")
    )]
    pub projection_sampling_method: ProjectionSamplingMethod,
    /// The number of tracks kept per camera with measurements
    #[cfg_attr(
        feature = "serde-serialize",
        serde(default = "default_tracks_to_cameras_ratio")
    )]
    pub tracks_to_cameras_ratio: f64,
    /// Measurements with a ground truth angular error below this are considered true inliers by the metrics
    #[cfg_attr(
        feature = "serde-serialize",
        serde(default = "default_max_inlier_measurement_error_deg")
    )]
    pub max_inlier_measurement_error_deg: f64,
    /// The standard deviation of translation priors and of the anchor
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_prior_sigma"))]
    pub prior_sigma: f64,
    /// The seed of the random number generator that samples projection directions
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_seed"))]
    pub seed: u64,
    /// The maximum number of Levenberg-Marquardt iterations during translation recovery
    #[cfg_attr(
        feature = "serde-serialize",
        serde(default = "default_recovery_patience")
    )]
    pub recovery_patience: usize,
}

impl Default for AveragingSettings {
    fn default() -> Self {
        Self {
            max_projection_directions: default_max_projection_directions(),
            outlier_weight_threshold: default_outlier_weight_threshold(),
            noise_sigma: default_noise_sigma(),
            huber_k: default_huber_k(),
            robust_measurement_noise: default_robust_measurement_noise(),
            use_tracks_for_averaging: default_use_tracks_for_averaging(),
            reject_outliers: default_reject_outliers(),
            projection_sampling_method: default_projection_sampling_method(),
            tracks_to_cameras_ratio: default_tracks_to_cameras_ratio(),
            max_inlier_measurement_error_deg: default_max_inlier_measurement_error_deg(),
            prior_sigma: default_prior_sigma(),
            seed: default_seed(),
            recovery_patience: default_recovery_patience(),
        }
    }
}

impl AveragingSettings {
    #[must_use]
    pub fn reject_outliers(self, reject_outliers: bool) -> Self {
        Self {
            reject_outliers,
            ..self
        }
    }

    #[must_use]
    pub fn use_tracks_for_averaging(self, use_tracks_for_averaging: bool) -> Self {
        Self {
            use_tracks_for_averaging,
            ..self
        }
    }

    #[must_use]
    pub fn robust_measurement_noise(self, robust_measurement_noise: bool) -> Self {
        Self {
            robust_measurement_noise,
            ..self
        }
    }

    #[must_use]
    pub fn projection_sampling_method(self, projection_sampling_method: ProjectionSamplingMethod) -> Self {
        Self {
            projection_sampling_method,
            ..self
        }
    }

    #[must_use]
    pub fn max_projection_directions(self, max_projection_directions: usize) -> Self {
        Self {
            max_projection_directions,
            ..self
        }
    }

    #[must_use]
    pub fn outlier_weight_threshold(self, outlier_weight_threshold: f64) -> Self {
        Self {
            outlier_weight_threshold,
            ..self
        }
    }

    #[must_use]
    pub fn seed(self, seed: u64) -> Self {
        Self { seed, ..self }
    }
}

fn default_max_projection_directions() -> usize {
    2000
}

fn default_outlier_weight_threshold() -> f64 {
    0.125
}

fn default_noise_sigma() -> f64 {
    0.01
}

fn default_huber_k() -> f64 {
    1.345
}

fn default_robust_measurement_noise() -> bool {
    true
}

fn default_use_tracks_for_averaging() -> bool {
    true
}

fn default_reject_outliers() -> bool {
    true
}

fn default_projection_sampling_method() -> ProjectionSamplingMethod {
    ProjectionSamplingMethod::SampleWithUniformDensity
}

fn default_tracks_to_cameras_ratio() -> f64 {
    20.0
}

fn default_max_inlier_measurement_error_deg() -> f64 {
    5.0
}

fn default_prior_sigma() -> f64 {
    0.01
}

fn default_seed() -> u64 {
    0
}

fn default_recovery_patience() -> usize {
    100
}
