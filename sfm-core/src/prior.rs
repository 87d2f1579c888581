use crate::Pose;
use nalgebra::Matrix6;

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// How strongly a [`PosePrior`] should be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub enum PriorKind {
    /// A deterministic constraint, such as a rigidly mounted camera rig.
    Hard,
    /// A measurement with uncertainty, such as a GPS or IMU reading.
    Soft,
}

/// A prior on an absolute pose (`wTi`) or a relative pose (`i2Ti1`).
///
/// The covariance is over the se(3) tangent space with translation components before rotation components.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct PosePrior<P> {
    pub value: P,
    pub covariance: Matrix6<f64>,
    pub kind: PriorKind,
}

impl<P: Pose> PosePrior<P> {
    /// A soft prior with an isotropic standard deviation on every component.
    pub fn soft(value: P, sigma: f64) -> Self {
        Self {
            value,
            covariance: Matrix6::identity() * sigma * sigma,
            kind: PriorKind::Soft,
        }
    }

    /// A hard prior. The covariance is zero.
    pub fn hard(value: P) -> Self {
        Self {
            value,
            covariance: Matrix6::zeros(),
            kind: PriorKind::Hard,
        }
    }
}
