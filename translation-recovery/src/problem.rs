use crate::normal::NormalEquations;
use crate::NoiseModel;
use sfm_core::nalgebra::{Matrix3, UnitVector3, Vector3};

/// Distances below this are treated as coincident translations.
const COINCIDENT_EPSILON: f64 = 1e-12;

/// The variables a factor touches, as indices of 3-vectors in the parameter vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Variables {
    Unary(usize),
    /// The error depends on `t_b - t_a`.
    Binary { a: usize, b: usize },
}

/// One term of the translation recovery objective.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Factor {
    /// `normalize(t_b - t_a) == measured`
    Direction {
        a: usize,
        b: usize,
        measured: UnitVector3<f64>,
        noise: NoiseModel,
    },
    /// `t_b - t_a == measured`
    Difference {
        a: usize,
        b: usize,
        measured: Vector3<f64>,
        noise: NoiseModel,
    },
    /// `t_a == 0`
    Anchor { a: usize, noise: NoiseModel },
}

impl Factor {
    pub(crate) fn variables(&self) -> Variables {
        match *self {
            Self::Direction { a, b, .. } | Self::Difference { a, b, .. } => Variables::Binary { a, b },
            Self::Anchor { a, .. } => Variables::Unary(a),
        }
    }

    pub(crate) fn noise(&self) -> NoiseModel {
        match *self {
            Self::Direction { noise, .. }
            | Self::Difference { noise, .. }
            | Self::Anchor { noise, .. } => noise,
        }
    }

    /// A linear surrogate `M x == c` of the factor, where `x` is `t_b - t_a` for binary factors and `t_a`
    /// for unary ones.
    ///
    /// Directions become `(I - u u^T) (t_b - t_a) == 0`, which only constrains the component perpendicular to the
    /// measured direction and ignores its sign.
    pub(crate) fn linear_form(&self) -> (Matrix3<f64>, Vector3<f64>) {
        match *self {
            Self::Direction { measured, .. } => (
                Matrix3::identity() - measured.into_inner() * measured.transpose(),
                Vector3::zeros(),
            ),
            Self::Difference { measured, .. } => (Matrix3::identity(), measured),
            Self::Anchor { .. } => (Matrix3::identity(), Vector3::zeros()),
        }
    }

    /// Computes the unwhitened error and its derivative with respect to `t_b` (or `t_a` for unary factors).
    /// The derivative with respect to `t_a` of a binary factor is the negation.
    fn error(&self, params: &[Vector3<f64>]) -> (Vector3<f64>, Matrix3<f64>) {
        match *self {
            Self::Direction { a, b, measured, .. } => {
                let delta = params[b] - params[a];
                let distance = delta.norm();
                if distance < COINCIDENT_EPSILON {
                    return (-measured.into_inner(), Matrix3::zeros());
                }
                let direction = delta / distance;
                (
                    direction - measured.into_inner(),
                    (Matrix3::identity() - direction * direction.transpose()) / distance,
                )
            }
            Self::Difference { a, b, measured, .. } => (params[b] - params[a] - measured, Matrix3::identity()),
            Self::Anchor { a, .. } => (params[a], Matrix3::identity()),
        }
    }

    /// The whitened residual and its derivative with respect to `t_b` (or `t_a` for unary factors).
    pub(crate) fn linearize(&self, params: &[Vector3<f64>]) -> (Vector3<f64>, Matrix3<f64>) {
        let (error, error_jacobian) = self.error(params);
        let (residual, whitening) = self.noise().whiten(&error);
        (residual, whitening * error_jacobian)
    }
}

/// The sum of the robust losses of every factor.
pub(crate) fn cost(factors: &[Factor], params: &[Vector3<f64>]) -> f64 {
    factors
        .iter()
        .map(|factor| factor.noise().loss(&factor.error(params).0))
        .sum()
}

/// Gauss-Newton normal equations `J^T J dx == -J^T r` of the factors linearized at `params`.
pub(crate) fn gauss_newton_equations(factors: &[Factor], params: &[Vector3<f64>]) -> NormalEquations {
    let mut equations = NormalEquations::new(params.len());
    for factor in factors {
        let (residual, jacobian) = factor.linearize(params);
        equations.add(
            factor.variables(),
            &(jacobian.transpose() * jacobian),
            &-(jacobian.transpose() * residual),
        );
    }
    equations
}

/// Normal equations of the [linear forms](Factor::linear_form) of the factors, each weighted by the inverse
/// variance of its noise model.
pub(crate) fn linear_equations(num_variables: usize, factors: &[Factor]) -> NormalEquations {
    let mut equations = NormalEquations::new(num_variables);
    for factor in factors {
        let (lhs, rhs) = factor.linear_form();
        let weight = factor.noise().sigma().powi(-2);
        equations.add(
            factor.variables(),
            &(lhs.transpose() * lhs * weight),
            &(lhs.transpose() * rhs * weight),
        );
    }
    equations
}
