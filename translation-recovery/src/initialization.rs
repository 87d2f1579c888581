use crate::normal::Elimination;
use crate::problem::{linear_equations, Factor};
use crate::RecoveryError;
use sfm_core::nalgebra::Vector3;

/// Solves the linear surrogate of every factor in the least squares sense.
///
/// Each factor contributes its [linear form](Factor::linear_form), weighted by the inverse variance of its noise
/// model, to the normal equations. Direction factors only pin down the perpendicular offsets between
/// translations, so the anchor and the scale or prior factors are what make the system well-posed. A variable
/// whose position along some axis is left free by every factor makes the system singular, which is reported as
/// [`RecoveryError::SingularSystem`] instead of picking an arbitrary position.
pub(crate) fn linear_initialization(
    factors: &[Factor],
    num_variables: usize,
    elimination: &Elimination,
) -> Result<Vec<Vector3<f64>>, RecoveryError> {
    linear_equations(num_variables, factors).solve(elimination, 0.0)
}
