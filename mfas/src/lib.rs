//! # MFAS
//!
//! Scores direction measurements against a single 1-D projection by approximately solving the minimum feedback
//! arc set problem, as used by 1DSfM (Wilson and Snavely, "Robust Global Translations with 1DSfM").
//!
//! Every measurement `key1 -> key2` is projected onto the projection axis. The projected length becomes the
//! weight of a directed edge in a graph over the keys. A positive weight keeps the edge as `key1 -> key2`, and a
//! negative weight flips it to `key2 -> key1` with the absolute value as its weight. A greedy heuristic then
//! finds a total order of the keys that keeps as much edge weight as possible pointing forwards. Edges that
//! still point backwards in that order are inconsistent with the projection and receive their weight as the
//! outlier weight. All other edges receive zero.
//!
//! ```
//! use mfas::Mfas;
//!
//! // A chain a -> b -> c with a single contradicting edge c -> a.
//! let mfas = Mfas::from_edge_weights([('a', 'b', 1.0), ('b', 'c', 1.0), ('c', 'a', 0.2)]);
//! assert_eq!(mfas.compute_ordering(), vec!['a', 'b', 'c']);
//! assert_eq!(mfas.compute_outlier_weights(), vec![0.0, 0.0, 0.2]);
//! ```

use float_ord::FloatOrd;
use sfm_core::nalgebra::{UnitVector3, Vector3};
use sfm_core::BinaryMeasurement;
use std::cmp::Reverse;
use std::collections::BTreeSet;

/// Any node whose remaining incoming weight is below this is treated as having no incoming edges.
const ROOT_WEIGHT_TOLERANCE: f64 = 1e-8;

#[derive(Debug, Clone, Copy, PartialEq)]
struct OrientedEdge {
    source: usize,
    target: usize,
    weight: f64,
}

impl OrientedEdge {
    /// Orients the edge `source -> target` so that its weight is non-negative.
    fn new(source: usize, target: usize, weight: f64) -> Self {
        if weight > 0.0 {
            Self {
                source,
                target,
                weight,
            }
        } else {
            Self {
                source: target,
                target: source,
                weight: -weight,
            }
        }
    }

    fn is_loop(&self) -> bool {
        self.source == self.target
    }
}

/// A weighted directed graph built from one projection of a set of direction measurements.
#[derive(Debug, Clone)]
pub struct Mfas<K> {
    /// Sorted and deduplicated keys. Edges refer to keys by their position here.
    nodes: Vec<K>,
    /// One edge per input measurement, in input order.
    edges: Vec<OrientedEdge>,
}

impl<K> Mfas<K>
where
    K: Ord + Clone,
{
    /// Projects every measurement onto `projection` and builds the weighted graph.
    ///
    /// The outlier weights computed later are returned in the same order as `measurements`.
    pub fn new<'a, I>(measurements: I, projection: &Vector3<f64>) -> Self
    where
        I: IntoIterator<Item = &'a BinaryMeasurement<K, UnitVector3<f64>>>,
        K: 'a,
    {
        Self::from_edge_weights(measurements.into_iter().map(|measurement| {
            (
                measurement.key1.clone(),
                measurement.key2.clone(),
                measurement.measured.dot(projection),
            )
        }))
    }

    /// Builds the graph from already projected edge weights `(key1, key2, weight)`.
    pub fn from_edge_weights(edges: impl IntoIterator<Item = (K, K, f64)>) -> Self {
        let edges: Vec<(K, K, f64)> = edges.into_iter().collect();
        let mut nodes: Vec<K> = edges
            .iter()
            .flat_map(|(a, b, _)| [a.clone(), b.clone()])
            .collect();
        nodes.sort_unstable();
        nodes.dedup();
        let position = |key: &K| nodes.binary_search(key).unwrap_or_else(|ix| ix);
        let edges = edges
            .iter()
            .map(|(a, b, weight)| OrientedEdge::new(position(a), position(b), *weight))
            .collect();
        Self { nodes, edges }
    }

    /// The number of distinct keys in the graph.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Computes the order of the keys, from the most "upstream" along the projection to the most "downstream".
    pub fn compute_ordering(&self) -> Vec<K> {
        self.ordered_nodes()
            .into_iter()
            .map(|node| self.nodes[node].clone())
            .collect()
    }

    /// Computes the outlier weight of every measurement, in input order.
    ///
    /// A measurement whose oriented edge points backwards in the [ordering](Self::compute_ordering) gets its
    /// absolute projected weight. Every other measurement gets `0.0`.
    pub fn compute_outlier_weights(&self) -> Vec<f64> {
        let mut positions = vec![0; self.nodes.len()];
        for (position, node) in self.ordered_nodes().into_iter().enumerate() {
            positions[node] = position;
        }
        self.edges
            .iter()
            .map(|edge| {
                if positions[edge.source] > positions[edge.target] {
                    edge.weight
                } else {
                    0.0
                }
            })
            .collect()
    }

    /// Greedily removes nodes, always picking a source node if one exists and otherwise the node with the most
    /// outgoing weight relative to its incoming weight.
    fn ordered_nodes(&self) -> Vec<usize> {
        let num_nodes = self.nodes.len();
        let mut in_weights = vec![0.0; num_nodes];
        let mut out_weights = vec![0.0; num_nodes];
        let mut incident: Vec<Vec<usize>> = vec![vec![]; num_nodes];
        for (ix, edge) in self.edges.iter().enumerate().filter(|(_, e)| !e.is_loop()) {
            out_weights[edge.source] += edge.weight;
            in_weights[edge.target] += edge.weight;
            incident[edge.source].push(ix);
            incident[edge.target].push(ix);
        }

        let mut frontier = Frontier::default();
        for node in 0..num_nodes {
            frontier.insert(node, in_weights[node], out_weights[node]);
        }

        let mut removed = vec![false; num_nodes];
        let mut ordering = Vec::with_capacity(num_nodes);
        while let Some(node) = frontier.pop() {
            removed[node] = true;
            ordering.push(node);
            for edge in incident[node].iter().map(|&ix| self.edges[ix]) {
                let outgoing = edge.source == node;
                let neighbor = if outgoing { edge.target } else { edge.source };
                if removed[neighbor] {
                    continue;
                }
                frontier.remove(neighbor, in_weights[neighbor], out_weights[neighbor]);
                if outgoing {
                    in_weights[neighbor] -= edge.weight;
                } else {
                    out_weights[neighbor] -= edge.weight;
                }
                frontier.insert(neighbor, in_weights[neighbor], out_weights[neighbor]);
            }
        }
        ordering
    }
}

/// The nodes not yet placed in the ordering.
///
/// Roots are kept apart so that the smallest root always comes out first. The rest are ranked by
/// `(out + 1) / (in + 1)`, and equal scores resolve to the smallest node.
#[derive(Default)]
struct Frontier {
    roots: BTreeSet<usize>,
    ranked: BTreeSet<(FloatOrd<f64>, Reverse<usize>)>,
}

impl Frontier {
    fn score(in_weight: f64, out_weight: f64) -> FloatOrd<f64> {
        FloatOrd((out_weight + 1.0) / (in_weight + 1.0))
    }

    fn insert(&mut self, node: usize, in_weight: f64, out_weight: f64) {
        if in_weight < ROOT_WEIGHT_TOLERANCE {
            self.roots.insert(node);
        } else {
            self.ranked
                .insert((Self::score(in_weight, out_weight), Reverse(node)));
        }
    }

    /// Must be called with the same weights the node was inserted with.
    fn remove(&mut self, node: usize, in_weight: f64, out_weight: f64) {
        if in_weight < ROOT_WEIGHT_TOLERANCE {
            self.roots.remove(&node);
        } else {
            self.ranked
                .remove(&(Self::score(in_weight, out_weight), Reverse(node)));
        }
    }

    fn pop(&mut self) -> Option<usize> {
        if let Some(&root) = self.roots.iter().next() {
            self.roots.remove(&root);
            return Some(root);
        }
        let best = *self.ranked.iter().next_back()?;
        self.ranked.remove(&best);
        Some((best.1).0)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn direction(x: f64, y: f64, z: f64) -> UnitVector3<f64> {
        UnitVector3::new_normalize(Vector3::new(x, y, z))
    }

    #[test]
    fn consistent_chain_has_no_outliers() {
        let measurements = [
            BinaryMeasurement::new(0, 1, direction(1.0, 0.0, 0.0)),
            BinaryMeasurement::new(1, 2, direction(1.0, 0.1, 0.0)),
            BinaryMeasurement::new(0, 2, direction(1.0, 0.05, 0.0)),
            BinaryMeasurement::new(3, 2, direction(-1.0, 0.0, 0.3)),
        ];
        let mfas = Mfas::new(&measurements, &Vector3::x());
        assert_eq!(mfas.compute_ordering(), vec![0, 1, 2, 3]);
        assert!(mfas.compute_outlier_weights().iter().all(|&w| w == 0.0));
    }

    #[test]
    fn negative_projection_reverses_edge() {
        let measurements = [BinaryMeasurement::new(5, 9, direction(-1.0, 0.0, 0.0))];
        let mfas = Mfas::new(&measurements, &Vector3::x());
        assert_eq!(mfas.compute_ordering(), vec![9, 5]);
        assert_eq!(mfas.compute_outlier_weights(), vec![0.0]);
    }

    #[test]
    fn contradicting_edge_gets_its_weight() {
        let mfas = Mfas::from_edge_weights([(0, 1, 1.0), (1, 2, 1.0), (2, 0, 0.2)]);
        assert_eq!(mfas.compute_outlier_weights(), vec![0.0, 0.0, 0.2]);
    }

    #[test]
    fn ties_resolve_to_smallest_key() {
        // A 2-cycle of equal weights has no root and equal scores.
        let mfas = Mfas::from_edge_weights([(7, 3, 0.5), (3, 7, 0.5)]);
        assert_eq!(mfas.compute_ordering(), vec![3, 7]);
        assert_eq!(mfas.compute_outlier_weights(), vec![0.5, 0.0]);
    }

    #[test]
    fn perpendicular_measurement_scores_zero() {
        let measurements = [
            BinaryMeasurement::new("a", "b", direction(0.0, 1.0, 0.0)),
            BinaryMeasurement::new("b", "a", direction(0.0, 0.0, 1.0)),
        ];
        let mfas = Mfas::new(&measurements, &Vector3::x());
        assert_eq!(mfas.len(), 2);
        assert!(mfas.compute_outlier_weights().iter().all(|&w| w.abs() < 1e-12));
    }

    #[test]
    fn empty_graph() {
        let mfas = Mfas::<u32>::from_edge_weights([]);
        assert!(mfas.is_empty());
        assert!(mfas.compute_ordering().is_empty());
        assert!(mfas.compute_outlier_weights().is_empty());
    }
}
