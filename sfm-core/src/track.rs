use crate::KeyPoint;
use std::collections::BTreeSet;
use std::fmt;

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// A single observation of a landmark: the camera that saw it and where.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct TrackMeasurement {
    /// Index of the camera in the camera list.
    pub camera: usize,
    /// The pixel location of the observation.
    pub keypoint: KeyPoint,
}

/// The 2d observations of one 3d landmark across several cameras.
///
/// Other software sometimes calls this a "feature track". Each camera contributes at most one
/// observation to a track.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[cfg_attr(
    feature = "serde-serialize",
    serde(try_from = "Vec<TrackMeasurement>", into = "Vec<TrackMeasurement>")
)]
pub struct Track2d {
    measurements: Vec<TrackMeasurement>,
}

impl Track2d {
    /// Creates a track from its observations.
    ///
    /// Returns `None` if two observations come from the same camera.
    ///
    /// ```
    /// use sfm_core::{KeyPoint, Track2d, TrackMeasurement};
    /// let a = TrackMeasurement { camera: 0, keypoint: KeyPoint::new(1.0, 2.0) };
    /// let b = TrackMeasurement { camera: 3, keypoint: KeyPoint::new(4.0, 5.0) };
    /// assert_eq!(Track2d::new(vec![a, b]).unwrap().len(), 2);
    /// assert!(Track2d::new(vec![a, b, a]).is_none());
    /// ```
    pub fn new(measurements: Vec<TrackMeasurement>) -> Option<Self> {
        Self::try_from(measurements).ok()
    }

    /// The number of observations in the track.
    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }

    pub fn measurement(&self, ix: usize) -> TrackMeasurement {
        self.measurements[ix]
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackMeasurement> + '_ {
        self.measurements.iter()
    }

    /// The cameras that observe this track.
    pub fn cameras(&self) -> impl Iterator<Item = usize> + '_ {
        self.measurements.iter().map(|m| m.camera)
    }

    /// Keeps only the observations made by cameras in `cameras`, preserving their order.
    #[must_use]
    pub fn select_for_cameras(&self, cameras: &BTreeSet<usize>) -> Self {
        Self {
            measurements: self
                .measurements
                .iter()
                .filter(|m| cameras.contains(&m.camera))
                .copied()
                .collect(),
        }
    }
}

/// A track was given two observations from the same camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DuplicateCamera(pub usize);

impl fmt::Display for DuplicateCamera {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "camera {} observes the track more than once", self.0)
    }
}

impl std::error::Error for DuplicateCamera {}

impl TryFrom<Vec<TrackMeasurement>> for Track2d {
    type Error = DuplicateCamera;

    fn try_from(measurements: Vec<TrackMeasurement>) -> Result<Self, Self::Error> {
        let mut seen = BTreeSet::new();
        match measurements
            .iter()
            .map(|m| m.camera)
            .find(|&camera| !seen.insert(camera))
        {
            Some(camera) => Err(DuplicateCamera(camera)),
            None => Ok(Self { measurements }),
        }
    }
}

impl From<Track2d> for Vec<TrackMeasurement> {
    fn from(track: Track2d) -> Self {
        track.measurements
    }
}
