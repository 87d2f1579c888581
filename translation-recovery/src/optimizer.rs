use crate::normal::Elimination;
use crate::problem::{cost, gauss_newton_equations, Factor};
use crate::RecoveryError;
use log::*;
use sfm_core::nalgebra::Vector3;

const INITIAL_DAMPING: f64 = 1e-4;
const MIN_DAMPING: f64 = 1e-12;
const MAX_DAMPING: f64 = 1e12;
/// Stop once an accepted step lowers the cost by less than this fraction.
const RELATIVE_COST_TOLERANCE: f64 = 1e-12;
/// Stop once a step is smaller than this fraction of the parameters.
const STEP_TOLERANCE: f64 = 1e-10;
/// Stop once no gradient entry is larger than this.
const GRADIENT_TOLERANCE: f64 = 1e-10;

/// Why [`levenberg_marquardt`] stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Termination {
    Converged,
    /// Every damping up to the maximum increased the cost.
    NoImprovementPossible,
    MaxIterations,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Report {
    pub(crate) termination: Termination,
    pub(crate) iterations: usize,
    pub(crate) initial_cost: f64,
    pub(crate) cost: f64,
}

/// Minimizes the robust cost of `factors` starting from `params`.
///
/// Each iteration solves the damped Gauss-Newton equations with the variables in `elimination` eliminated. A step
/// that does not lower the cost is rolled back and retried with ten times the damping, an accepted one divides the
/// damping by ten.
pub(crate) fn levenberg_marquardt(
    factors: &[Factor],
    elimination: &Elimination,
    params: &mut [Vector3<f64>],
    max_iterations: usize,
) -> Result<Report, RecoveryError> {
    let initial_cost = cost(factors, params);
    let mut current = initial_cost;
    let mut damping = INITIAL_DAMPING;
    let mut candidate = params.to_vec();
    for iteration in 0..max_iterations {
        let equations = gauss_newton_equations(factors, params);
        if equations.rhs_max_norm() <= GRADIENT_TOLERANCE {
            return Ok(Report {
                termination: Termination::Converged,
                iterations: iteration,
                initial_cost,
                cost: current,
            });
        }

        let accepted = loop {
            // A damped system can still be singular if a whole block of the Hessian vanishes.
            let step = match equations.solve(elimination, damping) {
                Ok(step) => Some(step),
                Err(RecoveryError::SingularSystem) => None,
                Err(e) => return Err(e),
            };
            if let Some(step) = step {
                let step_norm = step.iter().map(|v| v.norm_squared()).sum::<f64>().sqrt();
                let param_norm = params.iter().map(|v| v.norm_squared()).sum::<f64>().sqrt();
                if step_norm <= STEP_TOLERANCE * (param_norm + STEP_TOLERANCE) {
                    return Ok(Report {
                        termination: Termination::Converged,
                        iterations: iteration,
                        initial_cost,
                        cost: current,
                    });
                }
                for ((candidate, param), delta) in candidate.iter_mut().zip(params.iter()).zip(&step) {
                    *candidate = param + delta;
                }
                let candidate_cost = cost(factors, &candidate);
                if candidate_cost.is_finite() && candidate_cost < current {
                    damping = (damping / 10.0).max(MIN_DAMPING);
                    break Some(candidate_cost);
                }
            }
            damping *= 10.0;
            if damping > MAX_DAMPING {
                break None;
            }
        };

        let accepted_cost = match accepted {
            Some(accepted_cost) => accepted_cost,
            None => {
                return Ok(Report {
                    termination: Termination::NoImprovementPossible,
                    iterations: iteration,
                    initial_cost,
                    cost: current,
                })
            }
        };
        params.copy_from_slice(&candidate);
        let decrease = current - accepted_cost;
        current = accepted_cost;
        trace!("iteration {} cost {} damping {}", iteration, current, damping);
        if decrease <= RELATIVE_COST_TOLERANCE * current {
            return Ok(Report {
                termination: Termination::Converged,
                iterations: iteration + 1,
                initial_cost,
                cost: current,
            });
        }
    }
    Ok(Report {
        termination: Termination::MaxIterations,
        iterations: max_iterations,
        initial_cost,
        cost: current,
    })
}
