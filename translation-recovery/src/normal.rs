use crate::problem::{Factor, Variables};
use crate::RecoveryError;
use log::*;
use sfm_core::nalgebra::{DMatrix, DVector, Matrix3, Vector3};
use std::collections::{BTreeMap, BTreeSet};

/// Eigenvalues of a block, or squared Cholesky pivots of the reduced system, at or below this fraction of the
/// largest diagonal entry count as zero.
const RANK_EPSILON: f64 = 1e-10;

/// Splits the variables into those kept in the dense reduced system and those eliminated with a Schur complement.
///
/// Only variables that are touched by nothing but direction factors are eliminated, and no two eliminated
/// variables share a factor. Every eliminated variable then couples only to kept ones, so its block of the normal
/// equations can be inverted on its own. Landmarks observed by a few cameras have the lowest degree and are taken
/// first, which leaves the cameras in the reduced system.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Elimination {
    /// Position of every kept variable in the reduced system.
    reduced: Vec<Option<usize>>,
    num_reduced: usize,
}

impl Elimination {
    pub(crate) fn new(num_variables: usize, factors: &[Factor]) -> Self {
        let mut neighbors = vec![BTreeSet::new(); num_variables];
        let mut eligible = vec![true; num_variables];
        for factor in factors {
            let variables = factor.variables();
            if let Variables::Binary { a, b } = variables {
                neighbors[a].insert(b);
                neighbors[b].insert(a);
            }
            if !matches!(factor, Factor::Direction { .. }) {
                match variables {
                    Variables::Unary(a) => eligible[a] = false,
                    Variables::Binary { a, b } => {
                        eligible[a] = false;
                        eligible[b] = false;
                    }
                }
            }
        }

        let mut candidates: Vec<usize> = (0..num_variables).filter(|&ix| eligible[ix]).collect();
        candidates.sort_by_key(|&ix| (neighbors[ix].len(), ix));
        let mut eliminated = vec![false; num_variables];
        for ix in candidates {
            if neighbors[ix].iter().all(|&neighbor| !eliminated[neighbor]) {
                eliminated[ix] = true;
            }
        }

        let mut num_reduced = 0;
        let reduced = eliminated
            .iter()
            .map(|&eliminated| {
                if eliminated {
                    None
                } else {
                    num_reduced += 1;
                    Some(num_reduced - 1)
                }
            })
            .collect();
        Self {
            reduced,
            num_reduced,
        }
    }

    #[cfg(test)]
    pub(crate) fn keep_all(num_variables: usize) -> Self {
        Self {
            reduced: (0..num_variables).map(Some).collect(),
            num_reduced: num_variables,
        }
    }

    pub(crate) fn num_eliminated(&self) -> usize {
        self.reduced.len() - self.num_reduced
    }

    pub(crate) fn num_reduced(&self) -> usize {
        self.num_reduced
    }
}

/// Block sparse normal equations `H x == g` over 3-vector variables.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct NormalEquations {
    diagonal: Vec<Matrix3<f64>>,
    /// `off_diagonal[i][j]` is the block `H_ij`; both `(i, j)` and `(j, i)` are stored.
    off_diagonal: Vec<BTreeMap<usize, Matrix3<f64>>>,
    rhs: Vec<Vector3<f64>>,
}

impl NormalEquations {
    pub(crate) fn new(num_variables: usize) -> Self {
        Self {
            diagonal: vec![Matrix3::zeros(); num_variables],
            off_diagonal: vec![BTreeMap::new(); num_variables],
            rhs: vec![Vector3::zeros(); num_variables],
        }
    }

    /// Adds the term `|J x - r|^2`, given as `information = J^T J` and `projected = J^T r`, where `x` is `t_a`
    /// for unary variables and `t_b - t_a` for binary ones.
    pub(crate) fn add(
        &mut self,
        variables: Variables,
        information: &Matrix3<f64>,
        projected: &Vector3<f64>,
    ) {
        match variables {
            Variables::Unary(a) => {
                self.diagonal[a] += information;
                self.rhs[a] += projected;
            }
            Variables::Binary { a, b } => {
                self.diagonal[a] += information;
                self.diagonal[b] += information;
                *self.off_diagonal[a].entry(b).or_insert_with(Matrix3::zeros) -= information;
                *self.off_diagonal[b].entry(a).or_insert_with(Matrix3::zeros) -= information.transpose();
                self.rhs[a] -= projected;
                self.rhs[b] += projected;
            }
        }
    }

    /// The largest absolute entry of `g`.
    pub(crate) fn rhs_max_norm(&self) -> f64 {
        self.rhs.iter().map(|v| v.amax()).fold(0.0, f64::max)
    }

    /// Solves `(H + damping * diag(H)) x == g` by eliminating the variables chosen by `elimination` and solving the
    /// dense reduced system by Cholesky.
    ///
    /// Returns [`RecoveryError::SingularSystem`] when an eliminated block or the reduced system is rank deficient.
    pub(crate) fn solve(
        &self,
        elimination: &Elimination,
        damping: f64,
    ) -> Result<Vec<Vector3<f64>>, RecoveryError> {
        let damped =
            |ix: usize| self.diagonal[ix] + Matrix3::from_diagonal(&self.diagonal[ix].diagonal()) * damping;

        let mut inverses = vec![None; self.diagonal.len()];
        for (ix, reduced) in elimination.reduced.iter().enumerate() {
            if reduced.is_none() {
                match invert_block(&damped(ix)) {
                    Some(inverse) => inverses[ix] = Some(inverse),
                    None => {
                        debug!("eliminated variable {} has a rank deficient block", ix);
                        return Err(RecoveryError::SingularSystem);
                    }
                }
            }
        }

        let dim = 3 * elimination.num_reduced;
        let mut reduced = DMatrix::zeros(dim, dim);
        let mut rhs = DVector::zeros(dim);
        for ix in 0..self.diagonal.len() {
            match (elimination.reduced[ix], &inverses[ix]) {
                (Some(row), _) => {
                    add_block(&mut reduced, row, row, &damped(ix));
                    add_rows(&mut rhs, row, &self.rhs[ix]);
                    for (&other, block) in &self.off_diagonal[ix] {
                        if let Some(column) = elimination.reduced[other] {
                            add_block(&mut reduced, row, column, block);
                        }
                    }
                }
                // S = H_rr - H_rl H_ll^-1 H_lr and g_r - H_rl H_ll^-1 g_l
                (None, Some(inverse)) => {
                    let neighbors = &self.off_diagonal[ix];
                    let projected = inverse * self.rhs[ix];
                    for (&i, h_li) in neighbors {
                        let row = match elimination.reduced[i] {
                            Some(row) => row,
                            None => continue,
                        };
                        let weighted = h_li.transpose() * inverse;
                        add_rows(&mut rhs, row, &-(h_li.transpose() * projected));
                        for (&j, h_lj) in neighbors {
                            if let Some(column) = elimination.reduced[j] {
                                add_block(&mut reduced, row, column, &-(weighted * h_lj));
                            }
                        }
                    }
                }
                (None, None) => {}
            }
        }

        let solution = solve_reduced(reduced, rhs)?;
        let mut steps: Vec<Vector3<f64>> = elimination
            .reduced
            .iter()
            .map(|reduced| match reduced {
                Some(row) => solution.fixed_rows::<3>(3 * row).into_owned(),
                None => Vector3::zeros(),
            })
            .collect();
        for (ix, inverse) in inverses.iter().enumerate() {
            if let Some(inverse) = inverse {
                let mut rhs = self.rhs[ix];
                for (&other, h_lo) in &self.off_diagonal[ix] {
                    rhs -= h_lo * steps[other];
                }
                steps[ix] = inverse * rhs;
            }
        }
        Ok(steps)
    }
}

/// Inverts a symmetric positive semi-definite block, or returns `None` if it is rank deficient.
fn invert_block(block: &Matrix3<f64>) -> Option<Matrix3<f64>> {
    let eigenvalues = block.symmetric_eigenvalues();
    if eigenvalues.min() <= RANK_EPSILON * eigenvalues.max().max(f64::MIN_POSITIVE) {
        return None;
    }
    block.try_inverse()
}

fn solve_reduced(reduced: DMatrix<f64>, rhs: DVector<f64>) -> Result<DVector<f64>, RecoveryError> {
    let dim = reduced.nrows();
    let largest = (0..dim).map(|i| reduced[(i, i)]).fold(0.0, f64::max);
    let cholesky = match reduced.cholesky() {
        Some(cholesky) => cholesky,
        None => {
            debug!("reduced system of dimension {} is not positive definite", dim);
            return Err(RecoveryError::SingularSystem);
        }
    };
    let factor = cholesky.l_dirty();
    let zero_pivots = (0..dim)
        .filter(|&i| factor[(i, i)].powi(2) <= RANK_EPSILON * largest)
        .count();
    if zero_pivots > 0 {
        debug!(
            "reduced system of dimension {} has {} vanishing pivots",
            dim, zero_pivots
        );
        return Err(RecoveryError::SingularSystem);
    }
    Ok(cholesky.solve(&rhs))
}

fn add_block(matrix: &mut DMatrix<f64>, row: usize, column: usize, block: &Matrix3<f64>) {
    let mut slice = matrix.fixed_slice_mut::<3, 3>(3 * row, 3 * column);
    slice += block;
}

fn add_rows(vector: &mut DVector<f64>, row: usize, rows: &Vector3<f64>) {
    let mut slice = vector.fixed_rows_mut::<3>(3 * row);
    slice += rows;
}
