//! # Translation Recovery
//!
//! Recovers a global translation for every variable of a graph whose edges measure the unit direction from one
//! variable towards another. Directions say nothing about distance, so the solution is only defined up to a
//! global translation and scale. Those are fixed by anchoring the first variable at the origin and either:
//!
//! * giving the first edge a length of `scale`, or
//! * adding translation priors (`t_b - t_a == m`) between variables, in which case `scale` is ignored.
//!
//! The objective is the chordal error `normalize(t_b - t_a) - u` of every direction, optionally made robust with a
//! Huber loss. It is initialized with a linear least squares solve and refined with Levenberg-Marquardt.
//!
//! Both solves work on block sparse normal equations. Variables that only appear in direction factors, such as
//! landmarks, are eliminated with a Schur complement so that the dense system only holds the remaining variables.
//! A system that leaves any translation unconstrained fails with [`RecoveryError::SingularSystem`].
//!
//! Variables that are not connected to the anchor cannot be located relative to it and are left out of the result.

mod initialization;
mod noise;
mod normal;
mod optimizer;
mod problem;

pub use noise::*;

use initialization::linear_initialization;
use log::*;
use normal::Elimination;
use optimizer::{levenberg_marquardt, Termination};
use problem::Factor;
use sfm_core::{
    nalgebra::{UnitVector3, Vector3},
    BinaryMeasurement,
};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// A measured unit direction from `key1` towards `key2`.
pub type DirectionMeasurement<K> = BinaryMeasurement<K, UnitVector3<f64>>;

/// A measured translation `t(key2) - t(key1)`.
pub type TranslationMeasurement<K> = BinaryMeasurement<K, Vector3<f64>>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecoveryError {
    #[error("scale factor must be non-negative, got {0}")]
    NegativeScale(f64),
    #[error("translations are not fully constrained by the measurements")]
    SingularSystem,
    #[error("translation recovery produced non-finite translations")]
    NonFinite,
}

/// Solves for global translations from relative directions.
///
/// ```
/// use sfm_core::{BinaryMeasurement, nalgebra::{UnitVector3, Vector3}};
/// use translation_recovery::TranslationRecovery;
///
/// let points = [Vector3::zeros(), Vector3::x(), Vector3::new(0.0, 1.0, 1.0)];
/// let relative: Vec<_> = [(0, 1), (1, 2), (0, 2)]
///     .iter()
///     .map(|&(a, b)| BinaryMeasurement::new(a, b, UnitVector3::new_normalize(points[b] - points[a])))
///     .collect();
/// let translations = TranslationRecovery::default()
///     .run(&relative, 1.0, &[], &Default::default())
///     .unwrap();
/// assert!((translations[&2] - points[2]).norm() < 1e-6);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TranslationRecovery {
    direction_noise: NoiseModel,
    between_noise: NoiseModel,
    anchor_noise: NoiseModel,
    patience: usize,
}

impl Default for TranslationRecovery {
    fn default() -> Self {
        Self {
            direction_noise: NoiseModel::isotropic(0.01),
            between_noise: NoiseModel::isotropic(0.01),
            anchor_noise: NoiseModel::isotropic(0.01),
            patience: 100,
        }
    }
}

impl TranslationRecovery {
    pub fn new(direction_noise: NoiseModel) -> Self {
        Self {
            direction_noise,
            ..Default::default()
        }
    }

    /// The noise model of the translation priors passed as `between` to [`TranslationRecovery::run`].
    #[must_use]
    pub fn between_noise(self, between_noise: NoiseModel) -> Self {
        Self {
            between_noise,
            ..self
        }
    }

    /// The standard deviation of the prior holding the anchor at the origin.
    #[must_use]
    pub fn anchor_sigma(self, sigma: f64) -> Self {
        Self {
            anchor_noise: NoiseModel::isotropic(sigma),
            ..self
        }
    }

    /// The maximum number of Levenberg-Marquardt iterations.
    #[must_use]
    pub fn patience(self, patience: usize) -> Self {
        Self { patience, ..self }
    }

    /// Recovers translations for every variable connected to the anchor.
    ///
    /// * `relative` - the direction measurements; the anchor is `key1` of the first one
    /// * `scale` - the length of the first direction when `between` is empty
    /// * `between` - translation priors between variables
    /// * `initial` - initial values that take precedence over the linear initialization
    pub fn run<K>(
        &self,
        relative: &[DirectionMeasurement<K>],
        scale: f64,
        between: &[TranslationMeasurement<K>],
        initial: &BTreeMap<K, Vector3<f64>>,
    ) -> Result<BTreeMap<K, Vector3<f64>>, RecoveryError>
    where
        K: Ord + Clone,
    {
        if !(scale >= 0.0) {
            return Err(RecoveryError::NegativeScale(scale));
        }
        let anchor = match relative
            .first()
            .map(|m| &m.key1)
            .or_else(|| between.first().map(|m| &m.key1))
        {
            Some(anchor) => anchor.clone(),
            None => {
                debug!("no measurements were provided, so no translations were recovered");
                return Ok(BTreeMap::new());
            }
        };

        let edges = relative
            .iter()
            .map(|m| (&m.key1, &m.key2))
            .chain(between.iter().map(|m| (&m.key1, &m.key2)));
        let component = connected_component(&anchor, edges);
        let num_keys = relative
            .iter()
            .flat_map(|m| [&m.key1, &m.key2])
            .chain(between.iter().flat_map(|m| [&m.key1, &m.key2]))
            .collect::<BTreeSet<_>>()
            .len();
        if component.len() < num_keys {
            warn!(
                "{} of {} variables are disconnected from the anchor and will not be recovered",
                num_keys - component.len(),
                num_keys
            );
        }
        let index: BTreeMap<K, usize> = component
            .into_iter()
            .enumerate()
            .map(|(ix, key)| (key, ix))
            .collect();

        if between.is_empty() && scale == 0.0 {
            debug!("scale factor is zero, collapsing all translations onto the anchor");
            return Ok(index.into_keys().map(|key| (key, Vector3::zeros())).collect());
        }

        let factors = self.factors(&index, &anchor, relative, scale, between);
        let elimination = Elimination::new(index.len(), &factors);
        debug!(
            "eliminating {} of {} variables, reduced system has {} variables",
            elimination.num_eliminated(),
            index.len(),
            elimination.num_reduced()
        );
        let mut params = linear_initialization(&factors, index.len(), &elimination)?;
        for (key, value) in initial {
            if let Some(&ix) = index.get(key) {
                params[ix] = *value;
            }
        }

        let report = levenberg_marquardt(&factors, &elimination, &mut params, self.patience)?;
        if report.termination != Termination::Converged {
            warn!(
                "Levenberg-Marquardt stopped early with reason {:?}",
                report.termination
            );
        }
        info!(
            "recovered {} translations, cost {} -> {} after {} iterations",
            index.len(),
            report.initial_cost,
            report.cost,
            report.iterations
        );

        if params.iter().any(|t| !t.iter().all(|n| n.is_finite())) {
            return Err(RecoveryError::NonFinite);
        }
        Ok(index.into_iter().map(|(key, ix)| (key, params[ix])).collect())
    }

    fn factors<K: Ord>(
        &self,
        index: &BTreeMap<K, usize>,
        anchor: &K,
        relative: &[DirectionMeasurement<K>],
        scale: f64,
        between: &[TranslationMeasurement<K>],
    ) -> Vec<Factor> {
        let variables = |a: &K, b: &K| match (index.get(a), index.get(b)) {
            (Some(&a), Some(&b)) if a != b => Some((a, b)),
            _ => None,
        };

        let mut factors = vec![Factor::Anchor {
            a: index[anchor],
            noise: self.anchor_noise,
        }];
        factors.extend(relative.iter().filter_map(|m| {
            let (a, b) = variables(&m.key1, &m.key2)?;
            Some(Factor::Direction {
                a,
                b,
                measured: m.measured,
                noise: self.direction_noise,
            })
        }));
        if between.is_empty() {
            let first = relative
                .first()
                .and_then(|m| Some((variables(&m.key1, &m.key2)?, m.measured)));
            if let Some(((a, b), measured)) = first {
                factors.push(Factor::Difference {
                    a,
                    b,
                    measured: measured.into_inner() * scale,
                    noise: self.direction_noise,
                });
            }
        } else {
            if scale != 1.0 {
                debug!("ignoring scale factor {} in favor of translation priors", scale);
            }
            factors.extend(between.iter().filter_map(|m| {
                let (a, b) = variables(&m.key1, &m.key2)?;
                Some(Factor::Difference {
                    a,
                    b,
                    measured: m.measured,
                    noise: self.between_noise,
                })
            }));
        }
        factors
    }
}

/// Finds every key reachable from `start` through `edges`, ignoring edge direction.
fn connected_component<'a, K>(start: &K, edges: impl Iterator<Item = (&'a K, &'a K)>) -> BTreeSet<K>
where
    K: Ord + Clone + 'a,
{
    let mut adjacency: BTreeMap<&K, Vec<&K>> = BTreeMap::new();
    for (a, b) in edges {
        adjacency.entry(a).or_default().push(b);
        adjacency.entry(b).or_default().push(a);
    }
    let mut component = BTreeSet::new();
    component.insert(start.clone());
    let mut stack = vec![start];
    while let Some(key) = stack.pop() {
        for &neighbor in adjacency.get(key).into_iter().flatten() {
            if component.insert(neighbor.clone()) {
                stack.push(neighbor);
            }
        }
    }
    component
}
